//! Wire format for the Data Proxy RPC boundary (spec.md §4.1, §6).
//!
//! `{method, params, id}` request / `{result, error, id}` response JSON
//! envelopes, plus the typed params/results for each proxy method so the
//! proxy server and proxy client share one definition of the contract.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Note;

/// Every RPC the Data Proxy exposes (spec.md §4.1 table).
pub mod method {
    pub const LIST_NOTES: &str = "ListNotes";
    pub const GET_NOTE: &str = "GetNote";
    pub const CREATE_NOTE: &str = "CreateNote";
    pub const UPDATE_NOTE: &str = "UpdateNote";
    pub const DELETE_NOTE: &str = "DeleteNote";
    pub const COUNT_NOTES: &str = "CountNotes";
    pub const GET_TOTAL_NOTES: &str = "GetTotalNotes";
    pub const HEALTH_CHECK: &str = "HealthCheck";
    pub const READY: &str = "Ready";
    pub const EXPORT_SHARD_STATS: &str = "ExportShardStats";
}

/// `POST /` request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    pub params: serde_json::Value,
    pub id: u64,
}

/// `POST /` response envelope. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub id: u64,
}

impl RpcResponse {
    #[must_use]
    pub fn ok(id: u64, result: serde_json::Value) -> Self {
        Self { result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn err(id: u64, message: impl Into<String>) -> Self {
        Self { result: None, error: Some(message.into()), id }
    }
}

// ---------------------------------------------------------------------------
// Typed params / results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountScopedParams {
    pub account_id: Uuid,
    pub is_migrating: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetNoteParams {
    pub account_id: Uuid,
    pub note_id: Uuid,
    pub is_migrating: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteNoteParams {
    pub account_id: Uuid,
    pub note: Note,
    pub is_migrating: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListNotesResult {
    pub note_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetNoteResult {
    pub note: Option<Note>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResult {
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_absent_fields() {
        let resp = RpcResponse::ok(7, serde_json::json!({"count": 3}));
        let encoded = serde_json::to_string(&resp).unwrap();
        assert!(!encoded.contains("\"error\""));

        let err = RpcResponse::err(7, "boom");
        let encoded = serde_json::to_string(&err).unwrap();
        assert!(!encoded.contains("\"result\""));
    }

    #[test]
    fn request_roundtrips_through_json() {
        let req = RpcRequest {
            method: method::GET_NOTE.to_string(),
            params: serde_json::to_value(GetNoteParams {
                account_id: Uuid::nil(),
                note_id: Uuid::nil(),
                is_migrating: true,
            })
            .unwrap(),
            id: 1,
        };
        let bytes = serde_json::to_vec(&req).unwrap();
        let decoded: RpcRequest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.method, method::GET_NOTE);
        let params: GetNoteParams = serde_json::from_value(decoded.params).unwrap();
        assert!(params.is_migrating);
    }
}
