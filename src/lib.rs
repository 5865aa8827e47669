// First, declare the modules folder itself
mod modules;

// Re-export everything from modules for easier access
pub use modules::{auth, config, errors, portal, storage, tokens, utils};

// Re-export commonly used types
pub use modules::auth::{AuthGate, Identity};
pub use modules::config::PortalConfig;
pub use modules::portal::Portal;
pub use modules::storage::{FileStore, KeyValueStore, MemoryStore, Storage};
pub use modules::tokens::{AccessToken, TokenGate};

// Constants
pub const CONFIG_FILE: &str = "portal.json";
pub const DEFAULT_DATA_FILE: &str = "portal_state.json";
pub const DEFAULT_LOG_FILE: &str = "portal.log";
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 15 * 60;
/// Recorded as the consumer of a token verified without a logged-in identity
pub const UNKNOWN_IDENTITY: &str = "unknown";
