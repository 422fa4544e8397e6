//! Store Entry Module
//!
//! Defines a single key-space slot with optional expiration.

use std::time::{Duration, Instant};

// == Store Entry ==
/// A value held by the in-memory store, with its expiry instant.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    /// The stored value
    pub value: String,
    /// Expiration instant, None = persistent
    pub expires_at: Option<Instant>,
}

impl StoreEntry {
    // == Constructors ==
    /// Creates an entry that expires after `ttl`.
    pub fn expiring(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Some(Instant::now() + ttl),
        }
    }

    /// Creates an entry that never expires.
    pub fn persistent(value: String) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current instant reaches its expiry,
    /// so a fully elapsed TTL is never served.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires| Instant::now() >= expires)
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None for persistent entries.
    ///
    /// Saturates at zero once the entry has expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_persistent_entry_never_expires() {
        let entry = StoreEntry::persistent("1".to_string());

        assert_eq!(entry.value, "1");
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_expiring_entry_lifecycle() {
        let entry = StoreEntry::expiring("<html>".to_string(), Duration::from_millis(50));
        assert!(!entry.is_expired());

        sleep(Duration::from_millis(80));

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_ttl_remaining_bounded_by_ttl() {
        let entry = StoreEntry::expiring("v".to_string(), Duration::from_secs(10));

        let remaining = entry.ttl_remaining().unwrap();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining >= Duration::from_secs(9));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = StoreEntry {
            value: "test".to_string(),
            expires_at: Some(Instant::now()),
        };

        assert!(entry.is_expired(), "Entry should be expired at boundary");
    }
}
