pub mod openai;
pub mod provider;

use std::time::Duration;

/// Fallback system instruction, used when the store holds no prompt yet and
/// as the seed content for an empty store.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Bound on every outbound provider call, chat and image alike.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);
