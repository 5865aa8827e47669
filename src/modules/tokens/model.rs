use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Pre-provisioned single-use access token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub token: String,
    pub used: bool,
    pub issued_to: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            used: false,
            issued_to: None,
            used_at: None,
        }
    }

    /// Case-insensitive match against an already normalized value
    pub fn matches_normalized(&self, normalized: &str) -> bool {
        self.token.to_uppercase() == normalized
    }

    pub fn mark_used(&mut self, issued_to: &str, used_at: DateTime<Utc>) {
        self.used = true;
        self.issued_to = Some(issued_to.to_string());
        self.used_at = Some(used_at);
    }

    pub fn reset(&mut self) {
        self.used = false;
        self.issued_to = None;
        self.used_at = None;
    }
}

/// Trim surrounding whitespace and uppercase
pub fn normalize_token(raw: &str) -> String {
    raw.trim().to_uppercase()
}

lazy_static! {
    /// Tokens shipped with the portal
    pub static ref PROVISIONED_TOKENS: Vec<AccessToken> = [
        "IRSINH2026478192",
        "IRSINH2026008967",
        "IRSINH2026458756",
        "IRSINH2026774321",
        "IRSINH2026987342",
    ]
    .iter()
    .map(|token| AccessToken::new(token))
    .collect();
}
