//! Error handling for Pobo API operations.

use serde_json::Value;
use thiserror::Error;

/// Top-level error type wrapping the failure vocabulary shared by the API
/// client and the webhook handler.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

/// Failures surfaced by the HTTP request pipeline.
///
/// Transport-level failures (connection refused, timeout) are carried
/// through as [`ApiError::Transport`] without reclassification.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API returned 401, regardless of body content.
    #[error("Authorization token required")]
    Unauthorized,

    /// Any other non-2xx response with a JSON body.
    #[error("{message}")]
    Response {
        message: String,
        http_code: u16,
        response_body: Value,
    },

    /// A response body that is not valid JSON, on any status.
    #[error("Invalid JSON response")]
    InvalidJson {
        http_code: u16,
        response_body: String,
    },

    /// A 2xx body that does not match the expected envelope shape.
    #[error("Invalid response payload: {0}")]
    InvalidResponsePayload(#[source] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Builds the error for a non-2xx response, taking the message from the
    /// body's `error` field, else its `message` field, else a generic
    /// fallback.
    pub(crate) fn from_response(http_code: u16, body: Value) -> Self {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .or_else(|| body.get("message").and_then(Value::as_str))
            .unwrap_or("API error")
            .to_string();
        ApiError::Response {
            message,
            http_code,
            response_body: body,
        }
    }

    /// The HTTP status carried by this error, when one exists.
    pub fn http_code(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Response { http_code, .. } | ApiError::InvalidJson { http_code, .. } => {
                Some(*http_code)
            },
            ApiError::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

/// Caller-side precondition violations, detected before any network I/O.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Payload cannot be empty")]
    EmptyPayload,

    #[error("Too many items: {count} provided, maximum is {max}")]
    TooManyItems { count: usize, max: usize },
}

/// Failures raised while verifying and decoding an inbound webhook.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Missing webhook signature")]
    MissingSignature,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid webhook payload")]
    InvalidPayload,
}
