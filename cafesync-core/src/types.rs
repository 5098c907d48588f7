// Data model: fetched posts, enriched café stores, skip set, and the
// intermediate extraction / geocoding results.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One post fetched from the social-media source.
///
/// Every field other than `id` is optional on the wire; [`normalize`](Self::normalize)
/// is applied at the fetch boundary so downstream stages never re-check
/// for blank strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_product_type: Option<String>,
}

impl UpstreamRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    #[must_use]
    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    /// Trim the id and turn blank optional strings into `None`.
    /// Returns `None` when the record has no usable id.
    pub fn normalize(mut self) -> Option<Self> {
        let id = self.id.trim();
        if id.is_empty() {
            return None;
        }
        self.id = id.to_string();
        self.caption = blank_to_none(self.caption);
        self.media_type = blank_to_none(self.media_type);
        self.media_url = blank_to_none(self.media_url);
        self.permalink = blank_to_none(self.permalink);
        self.timestamp = blank_to_none(self.timestamp);
        self.username = blank_to_none(self.username);
        self.media_product_type = blank_to_none(self.media_product_type);
        Some(self)
    }

    /// Caption text worth sending to the extractor, if any.
    pub fn caption_text(&self) -> Option<&str> {
        self.caption
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Store name / address pair proposed by the extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCandidate {
    pub store_name: Option<String>,
    pub address: Option<String>,
}

impl StoreCandidate {
    /// The null/null pair.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(store_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            store_name: Some(store_name.into()),
            address: Some(address.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.store_name.is_none() && self.address.is_none()
    }
}

/// A resolved WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A café derived from one post. Persisted in `cafe_data_kv.json`.
///
/// Only complete stores (name, address and both coordinates present) are
/// ever written by the synchronizer. Fields this crate does not know about
/// are carried in `extra` so a rewrite never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedStore {
    pub id: String,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub caption: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub permalink: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub like_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media_type: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Older store files carry `null` for absent strings and counts.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl EnrichedStore {
    /// Build a store from a post, its extraction and its coordinates.
    /// Returns `None` unless the result would be complete.
    pub fn assemble(
        record: &UpstreamRecord,
        candidate: &StoreCandidate,
        coords: Option<Coordinates>,
    ) -> Option<Self> {
        let store_name = candidate.store_name.clone()?;
        let address = candidate.address.clone()?;
        let coords = coords?;
        Some(Self {
            id: record.id.clone(),
            store_name: Some(store_name),
            address: Some(address),
            lat: Some(coords.lat),
            lng: Some(coords.lng),
            caption: record.caption.clone().unwrap_or_default(),
            media_url: record.media_url.clone().unwrap_or_default(),
            permalink: record.permalink.clone().unwrap_or_default(),
            timestamp: record.timestamp.clone().unwrap_or_default(),
            username: record.username.clone().unwrap_or_default(),
            like_count: record.like_count.unwrap_or(0),
            comments_count: record.comments_count.unwrap_or(0),
            media_type: record.media_type.clone().unwrap_or_default(),
            extra: serde_json::Map::new(),
        })
    }

    pub fn is_complete(&self) -> bool {
        self.store_name.is_some() && self.address.is_some() && self.coordinates().is_some()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates {
            lat: self.lat?,
            lng: self.lng?,
        })
    }

    /// Name used in log lines.
    pub fn display_name(&self) -> &str {
        self.store_name.as_deref().unwrap_or("Unknown")
    }
}

/// Ids of posts that failed enrichment; never retried automatically.
pub type SkipSet = BTreeSet<String>;
