//! Configuration types for Pobo client construction.

use std::time::Duration;

/// Origin of the hosted Pobo service.
pub const DEFAULT_BASE_URL: &str = "https://api.pobo.space";

/// Request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for Pobo client construction.
///
/// Fixed at construction; the client holds no other state across calls.
#[derive(Debug, Clone)]
pub struct PoboClientConfig {
    /// Bearer token used to authenticate every request.
    pub api_token: String,
    /// Base URL for the Pobo API.
    pub base_url: String,
    /// Overall request timeout.
    pub timeout: Duration,
}

impl PoboClientConfig {
    /// Configuration pointing at the hosted service with default timeouts.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
