pub mod credentials;
pub mod expiry;
pub mod gate;
pub mod hooks;
pub mod identity;
pub mod session;

// Re-export the main types
pub use credentials::{Credential, DEMO_CREDENTIALS};
pub use expiry::{ExpiryOutcome, ExpiryTimer};
pub use gate::AuthGate;
pub use hooks::{LoggingHooks, SessionHooks};
pub use identity::{Identity, StoredIdentity};
pub use session::{Session, SessionStore};
