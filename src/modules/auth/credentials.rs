use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// Static login record provisioned with the portal
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
    pub balance: f64,
}

impl Credential {
    pub fn new(username: &str, password: &str, email: &str, full_name: &str, balance: f64) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            balance,
        }
    }

    /// Exact, case-sensitive match on both fields
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }

    /// Build a fresh working copy. Later balance changes on the identity
    /// never reach back into the credential list.
    pub fn to_identity(&self) -> Identity {
        Identity {
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            balance: self.balance,
            last_login: None,
        }
    }
}

lazy_static! {
    /// The demo account shipped with the portal
    pub static ref DEMO_CREDENTIALS: Vec<Credential> = vec![Credential::new(
        "MaryJane",
        "Godisgood",
        "mj@petrotrade.com",
        "Mary Jane",
        42_300_000.00,
    )];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_matching_is_exact() {
        let credential = &DEMO_CREDENTIALS[0];
        assert!(credential.matches("MaryJane", "Godisgood"));
        assert!(!credential.matches("maryjane", "Godisgood"));
        assert!(!credential.matches("MaryJane", "godisgood"));
        assert!(!credential.matches("MaryJane ", "Godisgood"));
    }

    #[test]
    fn test_identity_is_a_copy() {
        let credential = Credential::new("alice", "secret", "a@example.com", "Alice", 100.0);
        let mut identity = credential.to_identity();
        identity.balance -= 40.0;

        assert_eq!(identity.balance, 60.0);
        assert_eq!(credential.balance, 100.0);
        assert_eq!(identity.username, "alice");
        assert!(identity.last_login.is_none());
    }
}
