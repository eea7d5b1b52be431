//! Webhook signature verification and payload decoding.
//!
//! Verification is pure: no network calls, no side effects. The signature is
//! a hex-encoded HMAC-SHA256 of the exact raw body bytes that were signed,
//! never a re-serialized form.

use std::fmt::Debug;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::error::WebhookError;
use crate::types::WebhookPayload;

type HmacSha256 = Hmac<Sha256>;

/// Name of the request header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Verifies inbound webhook notifications against a shared secret.
pub struct WebhookHandler {
    webhook_secret: String,
}

impl Debug for WebhookHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookHandler").finish_non_exhaustive()
    }
}

impl WebhookHandler {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Verify a signature against the raw request body and decode the
    /// payload.
    ///
    /// `signature` is the value of the [`SIGNATURE_HEADER`] header; pass
    /// `None` when the header is absent.
    pub fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookPayload, WebhookError> {
        let signature = match signature {
            Some(signature) if !signature.is_empty() => signature,
            _ => return Err(WebhookError::MissingSignature),
        };

        if !self.valid_signature(payload, signature) {
            return Err(WebhookError::InvalidSignature);
        }

        let decoded: WebhookPayload =
            serde_json::from_slice(payload).map_err(|_| WebhookError::InvalidPayload)?;
        debug!(event = %decoded.event, eshop_id = decoded.eshop_id, "verified webhook");
        Ok(decoded)
    }

    fn valid_signature(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(mut mac) = HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) else {
            return false;
        };
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }
}

/// Constant-time byte comparison to prevent timing attacks.
///
/// Length is checked first; the byte walk never exits early.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
