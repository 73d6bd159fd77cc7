//! The two persisted entities: `Account` and `Note`. See spec.md §3.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timestamp::Timestamp;

/// `{id, name, isMigrating}`. Created by the API on signup, mutated only via
/// `UpdateAccount`. `is_migrating` is the authoritative routing directive
/// read by the controller before every data-plane dispatch; no ordering
/// guarantee is made about when a flip becomes visible to in-flight ops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub is_migrating: bool,
}

impl Account {
    /// name length 1-100, not all-whitespace (spec.md §6).
    #[must_use]
    pub fn validate_name(name: &str) -> bool {
        let len = name.chars().count();
        (1..=100).contains(&len) && !name.trim().is_empty()
    }
}

/// `{id, creator, createdAt, updatedAt, content}`. `updated_at` is the
/// logical revision clock: updates only apply when the incoming value is
/// strictly greater than the stored one (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub creator: Uuid,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub content: String,
}

impl Note {
    /// content length 1-10000 (spec.md §6).
    #[must_use]
    pub fn validate_content(content: &str) -> bool {
        (1..=10_000).contains(&content.chars().count())
    }

    /// `true` if `incoming` is a legal successor of `self` under the
    /// revision-monotonicity rule (spec.md §3): strictly greater `updated_at`.
    #[must_use]
    pub fn accepts_update(&self, incoming_updated_at: Timestamp) -> bool {
        incoming_updated_at > self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation_rejects_empty_and_whitespace() {
        assert!(!Account::validate_name(""));
        assert!(!Account::validate_name("   "));
        assert!(Account::validate_name("a"));
        assert!(Account::validate_name(&"x".repeat(100)));
        assert!(!Account::validate_name(&"x".repeat(101)));
    }

    #[test]
    fn content_validation_bounds() {
        assert!(!Note::validate_content(""));
        assert!(Note::validate_content("hello"));
        assert!(Note::validate_content(&"x".repeat(10_000)));
        assert!(!Note::validate_content(&"x".repeat(10_001)));
    }

    #[test]
    fn accepts_update_is_strict() {
        let note = Note {
            id: Uuid::nil(),
            creator: Uuid::nil(),
            created_at: Timestamp(100),
            updated_at: Timestamp(100),
            content: "v1".to_string(),
        };
        assert!(!note.accepts_update(Timestamp(100)));
        assert!(!note.accepts_update(Timestamp(99)));
        assert!(note.accepts_update(Timestamp(101)));
    }
}
