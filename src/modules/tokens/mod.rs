pub mod gate;
pub mod model;
pub mod store;

pub use gate::TokenGate;
pub use model::{normalize_token, AccessToken, PROVISIONED_TOKENS};
pub use store::TokenStore;
