use std::fmt;

/// Reasons an authentication or token check can fail.
///
/// Gate operations never hand these to callers directly; they resolve to a
/// `bool` or `Option` and the variant is only used for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum GateError {
    InvalidCredentials,
    TokenNotFound,
    TokenAlreadyUsed,
    TokenIdentityMismatch { issued_to: String, current: String },
    SessionExpired,
    MalformedPersistedState(String),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::InvalidCredentials => write!(f, "Invalid username or password"),
            GateError::TokenNotFound => write!(f, "Token not found"),
            GateError::TokenAlreadyUsed => write!(f, "Token has already been used"),
            GateError::TokenIdentityMismatch { issued_to, current } => write!(
                f,
                "Token was used by a different user (issued to {}, current {})",
                issued_to, current
            ),
            GateError::SessionExpired => write!(f, "Session expired"),
            GateError::MalformedPersistedState(msg) => {
                write!(f, "Malformed persisted state: {}", msg)
            }
        }
    }
}

impl std::error::Error for GateError {}

/// Errors from the withdrawal ledger
#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawalError {
    AccessDenied,
    NoIdentity,
    InvalidAmount(f64),
    DailyLimitExceeded { limit: f64 },
}

impl fmt::Display for WithdrawalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use crate::modules::utils::format::format_currency;

        match self {
            WithdrawalError::AccessDenied => {
                write!(f, "A verified access token is required for withdrawals")
            }
            WithdrawalError::NoIdentity => write!(f, "No user is logged in"),
            WithdrawalError::InvalidAmount(amount) => {
                write!(f, "Invalid withdrawal amount: {}", format_currency(*amount))
            }
            WithdrawalError::DailyLimitExceeded { limit } => write!(
                f,
                "Daily withdrawal limit exceeded. Limit: {}",
                format_currency(*limit)
            ),
        }
    }
}

impl std::error::Error for WithdrawalError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(GateError::TokenNotFound.to_string(), "Token not found");
        let mismatch = GateError::TokenIdentityMismatch {
            issued_to: "alice".to_string(),
            current: "bob".to_string(),
        };
        assert!(mismatch.to_string().contains("issued to alice"));

        let limit = WithdrawalError::DailyLimitExceeded { limit: 10_000.0 };
        assert_eq!(
            limit.to_string(),
            "Daily withdrawal limit exceeded. Limit: $10,000.00"
        );
    }
}
