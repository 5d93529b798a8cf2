//! Sitemap entry types and their field-by-field merge.
//!
//! Entries are merged with [`EntryFields::overlay`]: the overlaying side wins
//! every scalar field, list fields are concatenated (overlaying side first)
//! and de-duplicated by their natural key, and extra fields merge recursively.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::sitemap::date::{format_date, parse_date};

/// Value of a `lastmod` field before normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LastMod {
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl LastMod {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            LastMod::Timestamp(date) => Some(*date),
            LastMod::Text(text) => parse_date(text),
        }
    }

    /// Canonical `YYYY-MM-DDTHH:MM:SS+00:00` form, `None` if unparseable.
    pub fn normalised(&self) -> Option<String> {
        self.to_datetime().map(|date| format_date(&date))
    }
}

impl From<DateTime<Utc>> for LastMod {
    fn from(date: DateTime<Utc>) -> Self {
        LastMod::Timestamp(date)
    }
}

impl From<&str> for LastMod {
    fn from(text: &str) -> Self {
        LastMod::Text(text.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFreq::Always => "always",
            ChangeFreq::Hourly => "hourly",
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
            ChangeFreq::Never => "never",
        }
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alternate-language version of a page (`<xhtml:link rel="alternate">`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub hreflang: String,
    pub href: String,
}

/// `<image:image>` child of an entry. Field names are the element names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub loc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, alias = "geoLocation", skip_serializing_if = "Option::is_none")]
    pub geo_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

impl ImageEntry {
    pub fn new(loc: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            ..Default::default()
        }
    }
}

/// `<video:video>` child of an entry. Field names are the element names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub thumbnail_loc: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_loc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_loc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_friendly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_subscription: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<bool>,
}

impl VideoEntry {
    fn merge_key(&self) -> &str {
        self.content_loc
            .as_deref()
            .or(self.player_loc.as_deref())
            .unwrap_or(&self.thumbnail_loc)
    }
}

/// Every entry field except the location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<LastMod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<ChangeFreq>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Alternative>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<VideoEntry>,
    /// Any other field, rendered as a child element of `<url>`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn concat_unique<T, K: PartialEq>(winner: Vec<T>, base: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut merged: Vec<T> = Vec::with_capacity(winner.len() + base.len());
    for item in winner.into_iter().chain(base) {
        if !merged.iter().any(|seen| key(seen) == key(&item)) {
            merged.push(item);
        }
    }
    merged
}

/// Recursively merges `base` under `winner`. Objects merge key by key,
/// arrays concatenate, anything else keeps the winner.
fn overlay_values(winner: Value, base: Value) -> Value {
    match (winner, base) {
        (Value::Object(winner), Value::Object(base)) => Value::Object(overlay_maps(winner, base)),
        (Value::Array(mut winner), Value::Array(base)) => {
            winner.extend(base);
            Value::Array(winner)
        }
        (Value::Null, base) => base,
        (winner, _) => winner,
    }
}

fn overlay_maps(mut winner: Map<String, Value>, base: Map<String, Value>) -> Map<String, Value> {
    for (key, base_value) in base {
        let merged = match winner.remove(&key) {
            Some(value) => overlay_values(value, base_value),
            None => base_value,
        };
        winner.insert(key, merged);
    }
    winner
}

impl EntryFields {
    /// Merges `base` underneath `self`.
    pub fn overlay(self, base: EntryFields) -> EntryFields {
        EntryFields {
            lastmod: self.lastmod.or(base.lastmod),
            changefreq: self.changefreq.or(base.changefreq),
            priority: self.priority.or(base.priority),
            alternatives: concat_unique(self.alternatives, base.alternatives, |a| a.hreflang.clone()),
            images: concat_unique(self.images, base.images, |i| i.loc.clone()),
            videos: concat_unique(self.videos, base.videos, |v| v.merge_key().to_string()),
            extra: overlay_maps(self.extra, base.extra),
        }
    }
}

/// An entry as handed over by a source, location not yet normalised.
///
/// `url` is accepted as an alternative spelling of `loc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub fields: EntryFields,
}

impl PartialEntry {
    pub fn new(loc: impl Into<String>) -> Self {
        Self {
            loc: Some(loc.into()),
            ..Default::default()
        }
    }

    /// `loc`, falling back to `url`.
    pub fn location(&self) -> Option<&str> {
        self.loc.as_deref().or(self.url.as_deref())
    }

    /// Merges `base` underneath `self`.
    pub fn overlay(self, base: PartialEntry) -> PartialEntry {
        PartialEntry {
            loc: self.loc.or(base.loc),
            url: self.url.or(base.url),
            fields: self.fields.overlay(base.fields),
        }
    }
}

/// A URL as supplied by a source: a bare location or a detailed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawUrlInput {
    Literal(String),
    Detailed(PartialEntry),
}

impl RawUrlInput {
    pub fn location(&self) -> Option<&str> {
        match self {
            RawUrlInput::Literal(loc) => Some(loc),
            RawUrlInput::Detailed(entry) => entry.location(),
        }
    }

    pub fn into_partial(self) -> PartialEntry {
        match self {
            RawUrlInput::Literal(loc) => PartialEntry::new(loc),
            RawUrlInput::Detailed(entry) => entry,
        }
    }
}

impl From<&str> for RawUrlInput {
    fn from(loc: &str) -> Self {
        RawUrlInput::Literal(loc.to_string())
    }
}

impl From<String> for RawUrlInput {
    fn from(loc: String) -> Self {
        RawUrlInput::Literal(loc)
    }
}

impl From<PartialEntry> for RawUrlInput {
    fn from(entry: PartialEntry) -> Self {
        RawUrlInput::Detailed(entry)
    }
}

/// A normalised sitemap entry; `loc` is the de-duplication key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub loc: String,
    #[serde(flatten)]
    pub fields: EntryFields,
}

impl SitemapEntry {
    pub fn new(loc: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            fields: EntryFields::default(),
        }
    }

    pub fn with_lastmod(mut self, lastmod: impl Into<LastMod>) -> Self {
        self.fields.lastmod = Some(lastmod.into());
        self
    }
}

/// One `<sitemap>` element of a sitemap index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapIndexEntry {
    /// Absolute URL of the shard.
    pub sitemap: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<LastMod>,
}

/// Merges entries sharing a `loc`. Each entry keeps the position where its
/// `loc` was first seen; later entries overlay earlier ones.
pub fn merge_on_loc(entries: Vec<SitemapEntry>) -> Vec<SitemapEntry> {
    let mut merged: Vec<SitemapEntry> = Vec::with_capacity(entries.len());
    let mut positions: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for entry in entries {
        match positions.get(&entry.loc) {
            Some(&index) => {
                let earlier = std::mem::take(&mut merged[index].fields);
                merged[index].fields = entry.fields.overlay(earlier);
            }
            None => {
                positions.insert(entry.loc.clone(), merged.len());
                merged.push(entry);
            }
        }
    }
    merged
}
