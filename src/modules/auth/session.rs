use std::io;
use std::rc::Rc;

use super::identity::Identity;
use crate::modules::storage::{set_json, KeyValueStore};

pub const CURRENT_USER_KEY: &str = "currentUser";
pub const LOGGED_IN_KEY: &str = "isLoggedIn";
pub const LOGIN_TIME_KEY: &str = "loginTime";

/// Time-bounded authenticated state for one login
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Session {
    pub active: bool,
    pub started_at_ms: i64,
    pub timeout_ms: i64,
}

impl Session {
    /// Valid iff active and strictly less than `timeout_ms` has elapsed since
    /// the start. A start in the future is garbage and never valid.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.active
            && self.started_at_ms <= now_ms
            && now_ms.saturating_sub(self.started_at_ms) < self.timeout_ms
    }

    pub fn deadline_ms(&self) -> i64 {
        self.started_at_ms.saturating_add(self.timeout_ms)
    }

    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        self.deadline_ms().saturating_sub(now_ms)
    }

    /// Active flag still set but the timeout has run out
    pub fn has_lapsed(&self, now_ms: i64) -> bool {
        self.active && !self.is_valid_at(now_ms)
    }
}

/// Durable home of the session flags and the identity record
pub struct SessionStore {
    durable: Rc<dyn KeyValueStore>,
    timeout_ms: i64,
}

impl SessionStore {
    pub fn new(durable: Rc<dyn KeyValueStore>, timeout_ms: i64) -> Self {
        Self {
            durable,
            timeout_ms,
        }
    }

    pub fn timeout_ms(&self) -> i64 {
        self.timeout_ms
    }

    /// Read the session flags. A missing or garbled login time counts as epoch zero.
    pub fn load(&self) -> Session {
        let active = self.durable.get(LOGGED_IN_KEY).as_deref() == Some("true");
        let started_at_ms = self
            .durable
            .get(LOGIN_TIME_KEY)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0);

        Session {
            active,
            started_at_ms,
            timeout_ms: self.timeout_ms,
        }
    }

    /// Mark the session active starting at `now_ms`
    pub fn start(&self, now_ms: i64) -> io::Result<()> {
        self.durable.set(LOGGED_IN_KEY, "true")?;
        self.touch(now_ms)
    }

    /// Reset the session start time
    pub fn touch(&self, now_ms: i64) -> io::Result<()> {
        self.durable.set(LOGIN_TIME_KEY, &now_ms.to_string())
    }

    /// Raw identity value, `None` when absent or empty
    pub fn load_identity_raw(&self) -> Option<String> {
        self.durable
            .get(CURRENT_USER_KEY)
            .filter(|raw| !raw.is_empty())
    }

    pub fn save_identity(&self, identity: &Identity) -> io::Result<()> {
        set_json(self.durable.as_ref(), CURRENT_USER_KEY, identity)
    }

    /// Drop the identity and the session flags
    pub fn clear(&self) -> io::Result<()> {
        self.durable.remove(CURRENT_USER_KEY)?;
        self.durable.remove(LOGGED_IN_KEY)?;
        self.durable.remove(LOGIN_TIME_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::MemoryStore;

    const TIMEOUT: i64 = 15 * 60 * 1000;

    #[test]
    fn test_session_validity_window() {
        let session = Session {
            active: true,
            started_at_ms: 1_000,
            timeout_ms: TIMEOUT,
        };
        assert!(session.is_valid_at(1_000));
        assert!(session.is_valid_at(1_000 + TIMEOUT - 1));
        // The boundary itself is already expired
        assert!(!session.is_valid_at(1_000 + TIMEOUT));
        assert!(session.has_lapsed(1_000 + TIMEOUT));
        assert_eq!(session.remaining_ms(1_000), TIMEOUT);

        let inactive = Session {
            active: false,
            ..session
        };
        assert!(!inactive.is_valid_at(1_000));
        assert!(!inactive.has_lapsed(1_000 + TIMEOUT));
    }

    #[test]
    fn test_session_store_roundtrip() {
        let durable: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());
        let store = SessionStore::new(Rc::clone(&durable), TIMEOUT);

        let empty = store.load();
        assert!(!empty.active);
        assert_eq!(empty.started_at_ms, 0);

        store.start(5_000).unwrap();
        let started = store.load();
        assert!(started.active);
        assert_eq!(started.started_at_ms, 5_000);
        assert_eq!(durable.get(LOGIN_TIME_KEY).as_deref(), Some("5000"));

        store.touch(9_000).unwrap();
        assert_eq!(store.load().started_at_ms, 9_000);

        store.clear().unwrap();
        assert!(!store.load().active);
        assert!(store.load_identity_raw().is_none());
    }

    #[test]
    fn test_garbled_login_time_reads_as_zero() {
        let durable: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());
        durable.set(LOGGED_IN_KEY, "true").unwrap();
        durable.set(LOGIN_TIME_KEY, "yesterday").unwrap();

        let store = SessionStore::new(durable, TIMEOUT);
        let session = store.load();
        assert!(session.active);
        assert_eq!(session.started_at_ms, 0);
        assert!(!session.is_valid_at(TIMEOUT + 1));
    }

    #[test]
    fn test_out_of_range_login_time_is_never_valid() {
        let durable: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());
        durable.set(LOGGED_IN_KEY, "true").unwrap();
        let store = SessionStore::new(Rc::clone(&durable), TIMEOUT);

        durable.set(LOGIN_TIME_KEY, &i64::MAX.to_string()).unwrap();
        let session = store.load();
        assert_eq!(session.deadline_ms(), i64::MAX);
        assert_eq!(session.remaining_ms(i64::MIN), i64::MAX);
        assert!(!session.is_valid_at(1_700_000_000_000));
        assert!(session.has_lapsed(1_700_000_000_000));

        durable.set(LOGIN_TIME_KEY, &i64::MIN.to_string()).unwrap();
        let session = store.load();
        assert!(!session.is_valid_at(1_700_000_000_000));
        assert_eq!(session.remaining_ms(i64::MAX), i64::MIN);
    }

    #[test]
    fn test_empty_identity_reads_as_missing() {
        let durable: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());
        durable.set(CURRENT_USER_KEY, "").unwrap();
        let store = SessionStore::new(durable, TIMEOUT);
        assert!(store.load_identity_raw().is_none());
    }
}
