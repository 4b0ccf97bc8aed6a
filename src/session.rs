//! In-memory session store: opaque cookie token → authenticated user.
//!
//! The store is the single piece of in-process state in vestibule. It is
//! constructed once at startup and handed to the gateway behind an `Arc`,
//! never reached through a global, so tests can build isolated instances
//! and the locking discipline is visible at the construction site.
//!
//! Entries carry a per-entry deadline. An expired entry reads as absent,
//! and writes piggyback a periodic sweep that drops dead entries so the
//! map does not grow for the lifetime of the process.

use crate::users::UserRecord;
use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Session id byte length before hex encoding (17 bytes = 136 bits).
const SESSION_ID_BYTES: usize = 17;

/// Default session lifetime: 30 days (seconds).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 24 * 3600;

/// How often writes sweep expired entries from the map.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300; // 5 minutes

struct Entry {
    user: UserRecord,
    expires_at: Instant,
}

/// Process-local mapping from session identifier to user record.
///
/// Lookups that find nothing are a normal outcome, not an error; all
/// failure behavior (redirect to login, cookie clearing) belongs to the
/// caller.
pub struct SessionStore {
    /// Map plus the instant of the last expiry sweep.
    entries: RwLock<(HashMap<String, Entry>, Instant)>,
    ttl: Duration,
    sweep_interval: Duration,
}

impl SessionStore {
    /// Create a store with the given TTL and sweep interval (seconds),
    /// falling back to the defaults when `None`.
    pub fn new(ttl_secs: Option<u64>, sweep_interval_secs: Option<u64>) -> Self {
        Self {
            entries: RwLock::new((HashMap::new(), Instant::now())),
            ttl: Duration::from_secs(ttl_secs.unwrap_or(DEFAULT_SESSION_TTL_SECS)),
            sweep_interval: Duration::from_secs(
                sweep_interval_secs.unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            ),
        }
    }

    /// Associate `id` with `user`, overwriting any prior association.
    ///
    /// Ids are expected to be freshly generated ([`generate_session_id`]),
    /// so overwrites only happen if a caller reuses one deliberately.
    pub fn insert(&self, id: &str, user: UserRecord) {
        let now = Instant::now();
        let mut guard = self.entries.write();
        let (entries, last_sweep) = &mut *guard;

        // Periodic sweep: drop entries past their deadline
        if last_sweep.elapsed() >= self.sweep_interval {
            entries.retain(|_, e| e.expires_at > now);
            *last_sweep = now;
        }

        entries.insert(
            id.to_owned(),
            Entry {
                user,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Look up the user for `id`. Expired entries read as absent.
    pub fn get(&self, id: &str) -> Option<UserRecord> {
        let guard = self.entries.read();
        let (entries, _) = &*guard;
        let entry = entries.get(id)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.user.clone())
    }

    /// Remove the entry for `id`. Returns whether a live entry was removed.
    ///
    /// Backs logout: the server-side record goes away, not just the cookie.
    pub fn remove(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut guard = self.entries.write();
        guard
            .0
            .remove(id)
            .is_some_and(|entry| entry.expires_at > now)
    }

    /// Number of entries currently held, expired ones included until the
    /// next sweep.
    pub fn len(&self) -> usize {
        self.entries.read().0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generate a fresh session identifier: 136 random bits from the CSPRNG,
/// hex-encoded. Unguessable, generated server-side only.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, email: &str) -> UserRecord {
        UserRecord {
            id: format!("id-{name}"),
            name: name.to_string(),
            email: email.to_string(),
            created_at: 0,
        }
    }

    fn store() -> SessionStore {
        SessionStore::new(Some(3600), None)
    }

    #[test]
    fn get_unknown_id_is_absent() {
        let store = store();
        assert!(store.get("zzz999").is_none());
    }

    #[test]
    fn insert_then_get_returns_same_record() {
        let store = store();
        store.insert("abc123", user("Alice", "a@x.com"));

        let got = store.get("abc123").unwrap();
        assert_eq!(got.name, "Alice");
        assert_eq!(got.email, "a@x.com");
        assert!(store.get("zzz999").is_none());
    }

    #[test]
    fn later_insert_for_same_id_wins() {
        let store = store();
        store.insert("k", user("Alice", "a@x.com"));
        store.insert("k", user("Bob", "b@x.com"));

        assert_eq!(store.get("k").unwrap().name, "Bob");
    }

    #[test]
    fn get_is_idempotent() {
        let store = store();
        store.insert("k", user("Alice", "a@x.com"));

        let first = store.get("k").unwrap();
        let second = store.get("k").unwrap();
        assert_eq!(first.email, second.email);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn remove_deletes_entry() {
        let store = store();
        store.insert("k", user("Alice", "a@x.com"));

        assert!(store.remove("k"));
        assert!(store.get("k").is_none());
        assert!(!store.remove("k"));
    }

    #[test]
    fn expired_entry_reads_as_absent() {
        let store = SessionStore::new(Some(0), None);
        store.insert("k", user("Alice", "a@x.com"));
        assert!(store.get("k").is_none());
    }

    #[test]
    fn removing_expired_entry_reports_false() {
        let store = SessionStore::new(Some(0), None);
        store.insert("k", user("Alice", "a@x.com"));
        assert!(!store.remove("k"));
    }

    #[test]
    fn write_sweep_drops_expired_entries() {
        let store = SessionStore::new(Some(0), Some(0));
        store.insert("dead", user("Alice", "a@x.com"));
        assert_eq!(store.len(), 1);

        // Next write sweeps the expired entry before inserting.
        store.insert("dead2", user("Bob", "b@x.com"));
        assert_eq!(store.len(), 1);
        assert!(store.get("dead").is_none());
    }

    #[test]
    fn one_account_may_hold_multiple_sessions() {
        let store = store();
        store.insert("s1", user("Alice", "a@x.com"));
        store.insert("s2", user("Alice", "a@x.com"));

        assert_eq!(store.get("s1").unwrap().email, "a@x.com");
        assert_eq!(store.get("s2").unwrap().email, "a@x.com");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn concurrent_inserts_on_distinct_keys_lose_nothing() {
        let store = std::sync::Arc::new(store());
        let n = 32;

        let handles: Vec<_> = (0..n)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.insert(&format!("key-{i}"), user(&format!("u{i}"), "u@x.com"));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let readers: Vec<_> = (0..n)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.get(&format!("key-{i}")).unwrap().name)
            })
            .collect();
        for (i, h) in readers.into_iter().enumerate() {
            assert_eq!(h.join().unwrap(), format!("u{i}"));
        }
    }

    #[test]
    fn generated_ids_are_136_bit_hex() {
        let id = generate_session_id();
        assert_eq!(id.len(), SESSION_ID_BYTES * 2);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
    }
}
