use std::io;
use std::rc::Rc;

use super::model::{normalize_token, AccessToken};
use crate::modules::errors::GateError;
use crate::modules::storage::{set_json, KeyValueStore};
use crate::modules::utils::logging::log_data_operation;

pub const TOKENS_STATE_KEY: &str = "irsTokensState";

/// The fixed set of access tokens and their consumption state.
///
/// Holds no copy of the set: every read goes to durable storage, so all
/// contexts over the same store see one consumption state.
pub struct TokenStore {
    durable: Rc<dyn KeyValueStore>,
    provisioned: Vec<AccessToken>,
}

impl TokenStore {
    /// `provisioned` is the set used until something usable has been stored
    pub fn new(durable: Rc<dyn KeyValueStore>, provisioned: &[AccessToken]) -> Self {
        Self {
            durable,
            provisioned: provisioned.to_vec(),
        }
    }

    /// Current persisted set, or the provisioned one when nothing usable is stored
    pub fn tokens(&self) -> Vec<AccessToken> {
        let raw = match self.durable.get(TOKENS_STATE_KEY) {
            Some(raw) => raw,
            None => return self.provisioned.clone(),
        };

        match serde_json::from_str::<Vec<AccessToken>>(&raw) {
            Ok(tokens) => tokens,
            Err(e) => {
                let error = GateError::MalformedPersistedState(e.to_string());
                log_data_operation(
                    "load_tokens",
                    "system",
                    TOKENS_STATE_KEY,
                    false,
                    Some(&format!("{}, using provisioned tokens", error)),
                );
                self.provisioned.clone()
            }
        }
    }

    pub fn save(&self, tokens: &[AccessToken]) -> io::Result<()> {
        set_json(self.durable.as_ref(), TOKENS_STATE_KEY, tokens)
    }

    /// Case-insensitive lookup on the normalized form of `raw`
    pub fn find_normalized(&self, raw: &str) -> Option<AccessToken> {
        let normalized = normalize_token(raw);
        self.tokens()
            .into_iter()
            .find(|token| token.matches_normalized(&normalized))
    }

    /// Exact lookup on the stored token string
    pub fn find_exact(&self, token: &str) -> Option<AccessToken> {
        self.tokens().into_iter().find(|entry| entry.token == token)
    }

    pub fn available(&self) -> Vec<AccessToken> {
        self.tokens().into_iter().filter(|token| !token.used).collect()
    }

    pub fn consumed(&self) -> Vec<AccessToken> {
        self.tokens().into_iter().filter(|token| token.used).collect()
    }

    /// Clear the consumption state of every token and store the result
    pub fn reset_all(&self) -> io::Result<()> {
        let mut tokens = self.tokens();
        tokens.iter_mut().for_each(AccessToken::reset);
        self.save(&tokens)
    }
}
