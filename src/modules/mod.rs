// Declare all modules
pub mod auth;
pub mod config;
pub mod errors;
pub mod portal;
pub mod storage;
pub mod tokens;
pub mod utils;

// No re-exports here as they're handled in lib.rs
