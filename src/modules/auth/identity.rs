use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Live working copy of the authenticated user's data
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// Shape of whatever was found under the persisted identity key
#[derive(Debug, Clone, PartialEq)]
pub enum StoredIdentity {
    /// A structured record carrying a username
    Record(Identity),
    /// Just a username, left behind by older versions of the portal, or
    /// recovered from a record whose other fields are damaged
    BareIdentifier(String),
    /// Anything else
    Unparseable(String),
}

impl StoredIdentity {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => {
                let username = match map.get("username").and_then(Value::as_str) {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => return StoredIdentity::Unparseable(raw.to_string()),
                };
                // A record with damaged fields still names its user
                match serde_json::from_value(Value::Object(map)) {
                    Ok(identity) => StoredIdentity::Record(identity),
                    Err(_) => StoredIdentity::BareIdentifier(username),
                }
            }
            Ok(Value::String(name)) if looks_like_identifier(&name) => {
                StoredIdentity::BareIdentifier(name)
            }
            Ok(_) => StoredIdentity::Unparseable(raw.to_string()),
            Err(_) if looks_like_identifier(raw.trim()) => {
                StoredIdentity::BareIdentifier(raw.trim().to_string())
            }
            Err(_) => StoredIdentity::Unparseable(raw.to_string()),
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self, StoredIdentity::Record(_))
    }
}

// Usernames are single words; anything with braces or whitespace is treated as damage
fn looks_like_identifier(text: &str) -> bool {
    !text.is_empty()
        && !text.starts_with('{')
        && !text.starts_with('[')
        && !text
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '"')
}
