//! Client for the Pobo catalog API.
//!
//! This crate provides:
//! - Bulk import of products, categories, parameters, and blogs
//! - Paginated export with lazy page-by-page streaming
//! - Webhook signature verification (HMAC-SHA256) and payload decoding
//! - A shared typed error vocabulary for all operations
//!
//! ## Usage
//!
//! ```ignore
//! use pobo_client::{ExportFilter, PoboClient, PoboClientConfig, Product};
//!
//! let client = PoboClient::new(PoboClientConfig::new(api_token))?;
//!
//! let result = client.import_products(&products).await?;
//!
//! use futures::TryStreamExt;
//! let all: Vec<Product> = client
//!     .stream_products(ExportFilter::default())
//!     .try_collect()
//!     .await?;
//! ```
//!
//! Webhooks are verified against the raw request body bytes:
//!
//! ```ignore
//! use pobo_client::{WebhookHandler, SIGNATURE_HEADER};
//!
//! let handler = WebhookHandler::new(webhook_secret);
//! let payload = handler.handle(&body_bytes, headers.get(SIGNATURE_HEADER))?;
//! ```

mod client;
mod config;
mod error;
mod types;
mod webhook;

pub use client::{ExportFilter, ListQuery, PoboClient, MAX_BULK_ITEMS};
pub use config::{PoboClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::{ApiError, Error, ValidationError, WebhookError};
pub use types::{
    Blog,
    Category,
    Content,
    ImportResult,
    Language,
    LocalizedString,
    PaginatedResponse,
    Parameter,
    ParameterValue,
    Product,
    UnknownLanguage,
    UnknownWebhookEvent,
    WebhookEvent,
    WebhookPayload,
};
pub use webhook::{WebhookHandler, SIGNATURE_HEADER};
