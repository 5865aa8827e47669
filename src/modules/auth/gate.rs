use chrono::{DateTime, Utc};
use std::rc::Rc;

use super::credentials::Credential;
use super::expiry::{ExpiryOutcome, ExpirySchedule, ExpiryTimer};
use super::hooks::{LoggingHooks, SessionHooks};
use super::identity::{Identity, StoredIdentity};
use super::session::{Session, SessionStore};
use crate::modules::errors::GateError;
use crate::modules::storage::Storage;
use crate::modules::utils::clock::Clock;
use crate::modules::utils::logging::{log_auth_event, log_data_operation};
use crate::modules::utils::time::datetime_from_millis;
use crate::UNKNOWN_IDENTITY;

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please login again.";

/// Login, logout and session lifetime for one browsing context.
///
/// Owns the cached identity and the expiry timers. Durable state goes
/// through the shared `Storage`, so a second gate built over the same
/// durable store sees the same login.
pub struct AuthGate {
    storage: Storage,
    sessions: SessionStore,
    clock: Rc<dyn Clock>,
    credentials: Vec<Credential>,
    current: Option<Identity>,
    expiry: ExpirySchedule,
    hooks: Box<dyn SessionHooks>,
}

impl AuthGate {
    pub fn new(
        storage: Storage,
        clock: Rc<dyn Clock>,
        credentials: Vec<Credential>,
        timeout_ms: i64,
    ) -> Self {
        let sessions = SessionStore::new(Rc::clone(&storage.durable), timeout_ms);
        Self {
            storage,
            sessions,
            clock,
            credentials,
            current: None,
            expiry: ExpirySchedule::new(),
            hooks: Box::new(LoggingHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Box<dyn SessionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn timeout_ms(&self) -> i64 {
        self.sessions.timeout_ms()
    }

    /// Start-up sequence: repair the stored identity, check the session and
    /// arm the expiry timer. Returns whether a valid session was found.
    pub fn restore(&mut self) -> bool {
        self.repair_persisted_identity();
        let valid = self.check_session();
        if valid {
            self.schedule_expiry();
        }
        valid
    }

    /// Log in with an exact credential match. Any previous login is replaced.
    pub fn authenticate(&mut self, username: &str, password: &str) -> Result<Identity, GateError> {
        let credential = match self
            .credentials
            .iter()
            .find(|credential| credential.matches(username, password))
        {
            Some(credential) => credential,
            None => {
                log_auth_event("login", username, false, Some("Invalid credentials"));
                return Err(GateError::InvalidCredentials);
            }
        };

        let now = self.clock.now_ms();
        let mut identity = credential.to_identity();
        identity.last_login = Some(datetime_from_millis(now));

        self.persist_identity(&identity);
        if let Err(e) = self.sessions.start(now) {
            log_data_operation(
                "start_session",
                &identity.username,
                "session",
                false,
                Some(&e.to_string()),
            );
        }
        self.current = Some(identity.clone());
        self.schedule_expiry();

        log_auth_event("login", &identity.username, true, None);
        Ok(identity)
    }

    /// Clear the identity, the session flags and all session-scoped state.
    /// Safe to call when nobody is logged in.
    pub fn deauthenticate(&mut self) {
        let username = self
            .current
            .take()
            .map(|identity| identity.username)
            .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string());

        if let Err(e) = self.sessions.clear() {
            log_data_operation("clear_session", &username, "session", false, Some(&e.to_string()));
        }
        // Session scope also holds the token activation flag
        if let Err(e) = self.storage.session.clear() {
            log_data_operation(
                "clear_session_scope",
                &username,
                "session_storage",
                false,
                Some(&e.to_string()),
            );
        }
        self.expiry.invalidate();

        log_auth_event("logout", &username, true, None);
    }

    /// Current session flags as stored
    pub fn session(&self) -> Session {
        self.sessions.load()
    }

    /// Pure validity check, never changes state
    pub fn is_session_valid(&self) -> bool {
        self.sessions.load().is_valid_at(self.clock.now_ms())
    }

    /// End a session whose timeout has run out. Returns true if it did.
    pub fn expire_if_needed(&mut self) -> bool {
        let session = self.sessions.load();
        if !session.has_lapsed(self.clock.now_ms()) {
            return false;
        }

        log_auth_event(
            "session_expired",
            self.current
                .as_ref()
                .map(|identity| identity.username.as_str())
                .unwrap_or(UNKNOWN_IDENTITY),
            false,
            Some(&GateError::SessionExpired.to_string()),
        );
        self.deauthenticate();
        true
    }

    /// Lazy expiry followed by the validity check. Sends the user to the
    /// login surface when no valid session remains.
    pub fn check_session(&mut self) -> bool {
        self.expire_if_needed();
        let valid = self.is_session_valid();
        if !valid {
            self.hooks.redirect_to_login();
        }
        valid
    }

    /// The cached identity, or one rebuilt from durable storage
    pub fn current_identity(&mut self) -> Option<Identity> {
        if let Some(identity) = &self.current {
            return Some(identity.clone());
        }

        let raw = self.sessions.load_identity_raw()?;
        let identity = self.reconstruct_identity(&raw)?;
        self.current = Some(identity.clone());
        Some(identity)
    }

    /// Rewrite a stored identity that is not a structured record.
    /// Returns true if a repair was written.
    pub fn repair_persisted_identity(&mut self) -> bool {
        let raw = match self.sessions.load_identity_raw() {
            Some(raw) => raw,
            None => return false,
        };
        if StoredIdentity::parse(&raw).is_record() {
            return false;
        }

        match self.reconstruct_identity(&raw) {
            Some(identity) => {
                self.current = Some(identity);
                true
            }
            None => false,
        }
    }

    // Bare usernames are looked up; unknown names and unreadable values fall
    // back to the first provisioned credential.
    fn reconstruct_identity(&self, raw: &str) -> Option<Identity> {
        let identity = match StoredIdentity::parse(raw) {
            StoredIdentity::Record(identity) => return Some(identity),
            StoredIdentity::BareIdentifier(username) => {
                let credential = self
                    .credentials
                    .iter()
                    .find(|credential| credential.username == username)
                    .or_else(|| self.credentials.first())?;
                log_auth_event(
                    "repair_identity",
                    &username,
                    true,
                    Some("Rebuilt identity from bare username"),
                );
                credential.to_identity()
            }
            StoredIdentity::Unparseable(value) => {
                let credential = self.credentials.first()?;
                let error = GateError::MalformedPersistedState(format!(
                    "unreadable identity of {} bytes",
                    value.len()
                ));
                log_auth_event(
                    "repair_identity",
                    &credential.username,
                    false,
                    Some(&format!("{}, using default identity", error)),
                );
                credential.to_identity()
            }
        };

        self.persist_identity(&identity);
        Some(identity)
    }

    /// Add `delta` to the balance and persist. `None` without an identity.
    pub fn adjust_balance(&mut self, delta: f64) -> Option<f64> {
        let mut identity = self.current_identity()?;
        identity.balance += delta;
        self.persist_identity(&identity);

        let balance = identity.balance;
        self.current = Some(identity);
        Some(balance)
    }

    /// Current balance, zero when nobody is logged in
    pub fn balance(&mut self) -> f64 {
        self.current_identity()
            .map(|identity| identity.balance)
            .unwrap_or(0.0)
    }

    pub fn last_login(&mut self) -> Option<DateTime<Utc>> {
        self.current_identity()
            .and_then(|identity| identity.last_login)
    }

    /// Arm a one-shot check at the session deadline. Nothing is armed when
    /// the session is not valid or has no time left.
    pub fn schedule_expiry(&mut self) -> Option<ExpiryTimer> {
        let now = self.clock.now_ms();
        let session = self.sessions.load();
        if !session.is_valid_at(now) {
            return None;
        }

        let remaining = session.remaining_ms(now);
        if remaining <= 0 {
            return None;
        }
        Some(self.expiry.arm(session.deadline_ms()))
    }

    /// Push the deadline out after user activity. Only a valid session is refreshed.
    pub fn refresh_activity(&mut self) -> bool {
        if self.expire_if_needed() || !self.is_session_valid() {
            return false;
        }

        if let Err(e) = self.sessions.touch(self.clock.now_ms()) {
            log_data_operation(
                "refresh_session",
                self.current
                    .as_ref()
                    .map(|identity| identity.username.as_str())
                    .unwrap_or(UNKNOWN_IDENTITY),
                "session",
                false,
                Some(&e.to_string()),
            );
            return false;
        }
        self.schedule_expiry();
        true
    }

    /// Fire every timer that is due. Stale timers do nothing and a live one
    /// re-checks the session before ending it.
    pub fn run_due_timers(&mut self) -> Vec<ExpiryOutcome> {
        let now = self.clock.now_ms();
        let due = self.expiry.take_due(now);

        due.into_iter()
            .map(|timer| self.fire(timer))
            .collect()
    }

    fn fire(&mut self, timer: ExpiryTimer) -> ExpiryOutcome {
        if !self.expiry.is_current(&timer) {
            return ExpiryOutcome::Superseded;
        }

        let session = self.sessions.load();
        let now = self.clock.now_ms();
        if session.is_valid_at(now) {
            return ExpiryOutcome::StillValid;
        }
        if !session.active {
            return ExpiryOutcome::NoSession;
        }

        self.deauthenticate();
        self.hooks.notify(SESSION_EXPIRED_MESSAGE);
        self.hooks.redirect_to_login();
        ExpiryOutcome::Expired
    }

    /// Number of timers still waiting to fire
    pub fn pending_timers(&self) -> usize {
        self.expiry.pending()
    }

    /// Milliseconds left in a valid session
    pub fn remaining_ms(&self) -> Option<i64> {
        let now = self.clock.now_ms();
        let session = self.sessions.load();
        if session.is_valid_at(now) {
            Some(session.remaining_ms(now))
        } else {
            None
        }
    }

    fn persist_identity(&self, identity: &Identity) {
        if let Err(e) = self.sessions.save_identity(identity) {
            log_data_operation(
                "save_identity",
                &identity.username,
                "current_user",
                false,
                Some(&e.to_string()),
            );
        }
    }
}
