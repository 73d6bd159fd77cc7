//! Unix-millisecond revision clock used as the sole concurrency control for
//! note updates: a write only applies if its `Timestamp` is strictly greater
//! than the stored one.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
///
/// Notes carry two of these (`created_at`, `updated_at`); only `updated_at`
/// is ever compared for the monotonicity rule in spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Reads the wall clock. Never used for ordering decisions by itself --
    /// callers compare two `Timestamp`s, not a `Timestamp` against "now".
    #[must_use]
    pub fn now() -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_millis() as u64;
        Self(millis)
    }

    #[must_use]
    pub fn millis(self) -> u64 {
        self.0
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Self(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_plausible() {
        let ts = Timestamp::now();
        // Anything before 2020-01-01 or comically far in the future means
        // the clock (or this test) is broken.
        assert!(ts.0 > 1_577_836_800_000);
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(Timestamp(100) < Timestamp(200));
        assert!(Timestamp(200) > Timestamp(100));
        assert_eq!(Timestamp(100), Timestamp(100));
    }
}
