//! Domain types for the Pobo catalog API.
//!
//! Entities are plain value objects: constructed by the caller for imports,
//! or decoded from a server response for exports, and owned exclusively by
//! the caller once returned. Outbound wire shape follows struct declaration
//! order; optional fields are omitted when absent or empty.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Localized values
// ---------------------------------------------------------------------------

/// A language-keyed string with a distinguished `"default"` translation.
///
/// Serializes as the flat `language code -> text` mapping itself. Updates are
/// copy-on-write: [`LocalizedString::with_translation`] returns a new value
/// and never mutates the receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedString {
    translations: BTreeMap<String, String>,
}

impl LocalizedString {
    /// Reserved key holding the default translation.
    pub const DEFAULT_KEY: &'static str = "default";

    /// A localized string with only the default translation set.
    pub fn new(default_value: impl Into<String>) -> Self {
        let mut translations = BTreeMap::new();
        translations.insert(Self::DEFAULT_KEY.to_string(), default_value.into());
        Self { translations }
    }

    pub fn from_translations(translations: BTreeMap<String, String>) -> Self {
        Self { translations }
    }

    /// Returns a new value with the given translation added or replaced.
    pub fn with_translation(&self, language: impl AsRef<str>, value: impl Into<String>) -> Self {
        let mut translations = self.translations.clone();
        translations.insert(language.as_ref().to_string(), value.into());
        Self { translations }
    }

    /// The default translation, if the `"default"` key is present.
    pub fn default_value(&self) -> Option<&str> {
        self.get(Self::DEFAULT_KEY)
    }

    pub fn get(&self, language: impl AsRef<str>) -> Option<&str> {
        self.translations
            .get(language.as_ref())
            .map(String::as_str)
    }

    pub fn translations(&self) -> &BTreeMap<String, String> {
        &self.translations
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }
}

/// Rendered content block attached to an exported entity.
///
/// Both mappings are language-keyed like [`LocalizedString`], but carry no
/// default-key rule of their own beyond plain lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub html: BTreeMap<String, String>,
    #[serde(default)]
    pub marketplace: BTreeMap<String, String>,
}

impl Content {
    pub fn get_html(&self, language: impl AsRef<str>) -> Option<&str> {
        self.html.get(language.as_ref()).map(String::as_str)
    }

    pub fn get_marketplace(&self, language: impl AsRef<str>) -> Option<&str> {
        self.marketplace.get(language.as_ref()).map(String::as_str)
    }

    pub fn html_default(&self) -> Option<&str> {
        self.get_html(LocalizedString::DEFAULT_KEY)
    }

    pub fn marketplace_default(&self) -> Option<&str> {
        self.get_marketplace(LocalizedString::DEFAULT_KEY)
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Parses the ISO-8601-like timestamp formats the API emits.
fn parse_wire_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Decodes an entity timestamp, resolving absent or unparsable values to
/// `None` rather than failing the whole entity.
fn deserialize_lenient_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .and_then(parse_wire_timestamp))
}

/// Decodes a webhook timestamp from either epoch seconds or an ISO-8601
/// string. Unlike entity timestamps this is required, so a bad value is a
/// decode failure.
fn deserialize_webhook_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireTimestamp {
        Seconds(i64),
        Text(String),
    }

    match WireTimestamp::deserialize(deserializer)? {
        WireTimestamp::Seconds(seconds) => DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| serde::de::Error::custom("timestamp out of range")),
        WireTimestamp::Text(text) => parse_wire_timestamp(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("unparsable timestamp: {text}"))),
    }
}

// ---------------------------------------------------------------------------
// Catalog entities
// ---------------------------------------------------------------------------

/// A product in the Pobo catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub name: LocalizedString,
    #[serde(default)]
    pub url: LocalizedString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<LocalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo_title: Option<LocalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo_description: Option<LocalizedString>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters_ids: Vec<String>,

    // Export-only fields, never serialized back on import.
    #[serde(default, skip_serializing)]
    pub content: Option<Content>,
    #[serde(default, skip_serializing)]
    pub guid: Option<String>,
    #[serde(default, skip_serializing)]
    pub is_loaded: Option<bool>,
    /// Embedded category payloads as returned by export; their shape is not
    /// part of the import contract.
    #[serde(default, skip_serializing)]
    pub categories: Vec<Value>,
    #[serde(
        default,
        skip_serializing,
        deserialize_with = "deserialize_lenient_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing,
        deserialize_with = "deserialize_lenient_timestamp"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A category in the Pobo catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub name: LocalizedString,
    #[serde(default)]
    pub url: LocalizedString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo_title: Option<LocalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo_description: Option<LocalizedString>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Identifiers of related categories (parents or children).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories_ids: Vec<String>,

    #[serde(default, skip_serializing)]
    pub content: Option<Content>,
    #[serde(default, skip_serializing)]
    pub is_loaded: Option<bool>,
    #[serde(
        default,
        skip_serializing,
        deserialize_with = "deserialize_lenient_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing,
        deserialize_with = "deserialize_lenient_timestamp"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A blog article in the Pobo catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blog {
    pub id: String,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub name: LocalizedString,
    #[serde(default)]
    pub url: LocalizedString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo_title: Option<LocalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo_description: Option<LocalizedString>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    #[serde(default, skip_serializing)]
    pub content: Option<Content>,
    #[serde(default, skip_serializing)]
    pub is_loaded: Option<bool>,
    #[serde(
        default,
        skip_serializing,
        deserialize_with = "deserialize_lenient_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing,
        deserialize_with = "deserialize_lenient_timestamp"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single value of a [`Parameter`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub id: String,
    #[serde(default)]
    pub value: LocalizedString,
}

/// A product parameter and its values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: String,
    #[serde(default)]
    pub name: LocalizedString,
    #[serde(default)]
    pub values: Vec<ParameterValue>,
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Outcome of a bulk import call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportResult {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub imported: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub skipped: u64,
    /// Per-item error descriptors, in server-reported shape.
    #[serde(default)]
    pub errors: Vec<Value>,
    /// Parameter-value counts, present only for parameter imports.
    #[serde(default)]
    pub values_imported: Option<u64>,
    #[serde(default)]
    pub values_updated: Option<u64>,
}

impl ImportResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

fn default_current_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default = "default_current_page")]
    current_page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
    #[serde(default)]
    total: u64,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct PageEnvelope<T> {
    #[serde(default)]
    data: Vec<T>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

/// One page of a list response, decoded from the
/// `{"data": [...], "meta": {...}}` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(
    from = "PageEnvelope<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub struct PaginatedResponse<T> {
    /// Entities in server-page order.
    pub data: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> From<PageEnvelope<T>> for PaginatedResponse<T> {
    fn from(envelope: PageEnvelope<T>) -> Self {
        let meta = envelope.meta.unwrap_or(PageMeta {
            current_page: default_current_page(),
            per_page: default_per_page(),
            total: 0,
        });
        Self {
            data: envelope.data,
            current_page: meta.current_page,
            per_page: meta.per_page,
            total: meta.total,
        }
    }
}

impl<T> PaginatedResponse<T> {
    /// Total number of pages implied by `total` and `per_page`; zero when
    /// `per_page` is zero.
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page as u64)
    }

    pub fn more_pages(&self) -> bool {
        (self.current_page as u64) < self.total_pages()
    }
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// A verified and decoded webhook notification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookPayload {
    /// Event name as sent on the wire, e.g. `products.update`.
    pub event: String,
    #[serde(deserialize_with = "deserialize_webhook_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub eshop_id: i64,
}

impl WebhookPayload {
    /// The known event kind, if the event name is one this crate recognizes.
    pub fn event_kind(&self) -> Option<WebhookEvent> {
        self.event.parse().ok()
    }
}

/// Webhook event kinds emitted by the Pobo service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookEvent {
    ProductsUpdate,
    CategoriesUpdate,
    BlogsUpdate,
}

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 3] = [
        WebhookEvent::ProductsUpdate,
        WebhookEvent::CategoriesUpdate,
        WebhookEvent::BlogsUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::ProductsUpdate => "products.update",
            WebhookEvent::CategoriesUpdate => "categories.update",
            WebhookEvent::BlogsUpdate => "blogs.update",
        }
    }
}

impl Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown webhook event: {0}")]
pub struct UnknownWebhookEvent(String);

impl FromStr for WebhookEvent {
    type Err = UnknownWebhookEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WebhookEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownWebhookEvent(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Languages
// ---------------------------------------------------------------------------

/// Language codes recognized by the Pobo API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Default,
    Cs,
    Sk,
    En,
    De,
    Pl,
    Hu,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Default,
        Language::Cs,
        Language::Sk,
        Language::En,
        Language::De,
        Language::Pl,
        Language::Hu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Default => "default",
            Language::Cs => "cs",
            Language::Sk => "sk",
            Language::En => "en",
            Language::De => "de",
            Language::Pl => "pl",
            Language::Hu => "hu",
        }
    }
}

impl AsRef<str> for Language {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown language code: {0}")]
pub struct UnknownLanguage(String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|language| language.as_str() == s)
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}
