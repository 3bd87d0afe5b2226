//! UUID v7 utilities for time-ordered identifiers.
//!
//! UUIDv7 embeds a Unix timestamp (milliseconds) in its first 48 bits, so
//! ids generated later sort after ids generated earlier.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use daybook_core::uuid_utils::new_v7;
///
/// let id = new_v7();
/// assert_eq!(id.get_version_num(), 7);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_is_version_7() {
        assert_eq!(new_v7().get_version_num(), 7);
    }

    #[test]
    fn test_new_v7_sorts_by_creation_time() {
        let first = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(new_v7() > first);
    }
}
