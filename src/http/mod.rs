pub mod client;
pub mod redact;
