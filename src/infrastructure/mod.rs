pub mod encryption;
pub mod log_redact;
pub mod logging;
pub mod pbkdf2;
pub mod upstream;
pub mod wallet_store;
