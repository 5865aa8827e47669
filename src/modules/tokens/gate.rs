use std::rc::Rc;

use super::model::{normalize_token, AccessToken};
use super::store::TokenStore;
use crate::modules::auth::AuthGate;
use crate::modules::errors::GateError;
use crate::modules::storage::Storage;
use crate::modules::utils::clock::Clock;
use crate::modules::utils::logging::{log_data_operation, log_token_event};
use crate::modules::utils::time::datetime_from_millis;
use crate::UNKNOWN_IDENTITY;

pub const CURRENT_TOKEN_KEY: &str = "currentToken";
pub const TOKEN_USED_TIME_KEY: &str = "tokenUsedTime";
pub const TOKEN_ACTIVE_KEY: &str = "tokenActive";

/// Single-use token verification and the session-scoped grant it unlocks.
///
/// Consumption state is durable and shared by every context; the activation
/// flag lives in session storage and vanishes with the context or on logout.
pub struct TokenGate {
    storage: Storage,
    clock: Rc<dyn Clock>,
    store: TokenStore,
}

impl TokenGate {
    pub fn new(storage: Storage, clock: Rc<dyn Clock>, provisioned: &[AccessToken]) -> Self {
        let store = TokenStore::new(Rc::clone(&storage.durable), provisioned);
        Self {
            storage,
            clock,
            store,
        }
    }

    /// Consume a token for the current identity. Unknown and already used
    /// tokens both answer false.
    pub fn verify_token(&mut self, auth: &mut AuthGate, raw: &str) -> bool {
        self.verify_token_detailed(auth, raw).is_ok()
    }

    /// Same as `verify_token` but says why a token was refused
    pub fn verify_token_detailed(
        &mut self,
        auth: &mut AuthGate,
        raw: &str,
    ) -> Result<AccessToken, GateError> {
        let normalized = normalize_token(raw);
        let issued_to = auth
            .current_identity()
            .map(|identity| identity.username)
            .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string());
        let now = self.clock.now_ms();

        // Read-modify-write against the stored set, never a cached copy
        let mut tokens = self.store.tokens();
        let entry = match tokens
            .iter_mut()
            .find(|token| token.matches_normalized(&normalized))
        {
            Some(entry) => entry,
            None => {
                log_token_event("verify", &normalized, false, Some("Token not found"));
                return Err(GateError::TokenNotFound);
            }
        };
        if entry.used {
            log_token_event(
                "verify",
                &normalized,
                false,
                Some(&format!(
                    "Token already used by {}",
                    entry.issued_to.as_deref().unwrap_or(UNKNOWN_IDENTITY)
                )),
            );
            return Err(GateError::TokenAlreadyUsed);
        }

        entry.mark_used(&issued_to, datetime_from_millis(now));
        let consumed = entry.clone();

        if let Err(e) = self.store.save(&tokens) {
            log_data_operation("save_tokens", &issued_to, "tokens", false, Some(&e.to_string()));
        }
        // Remember which token this device consumed, in its stored spelling
        let pointers = self
            .storage
            .durable
            .set(CURRENT_TOKEN_KEY, &consumed.token)
            .and_then(|_| {
                self.storage
                    .durable
                    .set(TOKEN_USED_TIME_KEY, &now.to_string())
            });
        if let Err(e) = pointers {
            log_data_operation(
                "save_current_token",
                &issued_to,
                CURRENT_TOKEN_KEY,
                false,
                Some(&e.to_string()),
            );
        }

        log_token_event(
            "verify",
            &consumed.token,
            true,
            Some(&format!("Issued to {}", issued_to)),
        );
        Ok(consumed)
    }

    /// Whether this context currently holds a token grant
    pub fn has_valid_access(&self, auth: &mut AuthGate) -> bool {
        self.access_check(auth).is_ok()
    }

    /// The grant needs a consumed-token pointer naming a used token, issued
    /// to the current identity when there is one, and an activation in this
    /// context. A missing activation is reported as `SessionExpired`.
    pub fn access_check(&self, auth: &mut AuthGate) -> Result<(), GateError> {
        let current = self
            .storage
            .durable
            .get(CURRENT_TOKEN_KEY)
            .filter(|token| !token.is_empty())
            .ok_or(GateError::TokenNotFound)?;

        let entry = self
            .store
            .find_exact(&current)
            .filter(|entry| entry.used)
            .ok_or(GateError::TokenNotFound)?;

        if let Some(identity) = auth.current_identity() {
            if entry.issued_to.as_deref() != Some(identity.username.as_str()) {
                return Err(GateError::TokenIdentityMismatch {
                    issued_to: entry
                        .issued_to
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string()),
                    current: identity.username,
                });
            }
        }

        if !self.is_active() {
            return Err(GateError::SessionExpired);
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.storage.session.get(TOKEN_ACTIVE_KEY).as_deref() == Some("true")
    }

    /// Turn the grant on for this context
    pub fn activate(&self) {
        if let Err(e) = self.storage.session.set(TOKEN_ACTIVE_KEY, "true") {
            log_data_operation(
                "activate_token",
                "session",
                TOKEN_ACTIVE_KEY,
                false,
                Some(&e.to_string()),
            );
        }
    }

    pub fn deactivate(&self) {
        if let Err(e) = self.storage.session.remove(TOKEN_ACTIVE_KEY) {
            log_data_operation(
                "deactivate_token",
                "session",
                TOKEN_ACTIVE_KEY,
                false,
                Some(&e.to_string()),
            );
        }
    }

    pub fn list_available(&self) -> Vec<AccessToken> {
        self.store.available()
    }

    pub fn list_consumed(&self) -> Vec<AccessToken> {
        self.store.consumed()
    }

    /// Administrative reset of every token, the consumed-token pointer and
    /// this context's grant. Not for production use.
    pub fn reset_all(&self) {
        if let Err(e) = self.store.reset_all() {
            log_data_operation("reset_tokens", "admin", "tokens", false, Some(&e.to_string()));
        }

        let pointers = self
            .storage
            .durable
            .remove(CURRENT_TOKEN_KEY)
            .and_then(|_| self.storage.durable.remove(TOKEN_USED_TIME_KEY));
        if let Err(e) = pointers {
            log_data_operation(
                "reset_tokens",
                "admin",
                CURRENT_TOKEN_KEY,
                false,
                Some(&e.to_string()),
            );
        }
        self.deactivate();

        log_data_operation("reset_tokens", "admin", "tokens", true, None);
    }
}
