//! Content hashing used by the load generator to detect a consistency-miss
//! (spec.md §4.6): the local SHA-256 of a note's content compared against
//! the server's returned content.

use sha2::{Digest, Sha256};

#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_hash() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(content_hash("hello"), content_hash("world"));
    }

    #[test]
    fn known_vector() {
        // sha256("") -- standard empty-string test vector.
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }
}
