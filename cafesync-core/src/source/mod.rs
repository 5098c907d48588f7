//! Paginated retrieval of upstream posts.
//!
//! [`paginate`] follows opaque "next page" cursors until exhausted. The
//! first request carries query parameters; every later request uses the
//! server-supplied cursor URL verbatim.

pub mod instagram;

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{CafeError, UpstreamError};
use crate::types::UpstreamRecord;

pub use instagram::{InstagramSource, ReqwestTransport};

/// One page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// Initial request: base URL plus query parameters.
    First {
        url: String,
        query: Vec<(String, String)>,
    },
    /// Server-supplied cursor URL, sent exactly as received.
    Next(String),
}

impl PageRequest {
    pub fn url(&self) -> &str {
        match self {
            Self::First { url, .. } | Self::Next(url) => url,
        }
    }
}

/// Transport for a single page fetch. Returns the decoded JSON body.
#[async_trait::async_trait]
pub trait PageTransport: Send + Sync {
    async fn get_page(&self, request: &PageRequest) -> crate::error::Result<serde_json::Value>;
}

/// A source of upstream records, fully paginated.
#[async_trait::async_trait]
pub trait MediaSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch every record, concatenated in server order.
    async fn fetch_all(&self) -> crate::error::Result<Vec<UpstreamRecord>>;
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Vec<serde_json::Value>,
    #[serde(default)]
    paging: Option<Paging>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<String>,
}

/// A decoded page: normalized records plus the next cursor, if any.
#[derive(Debug)]
pub struct Page {
    pub records: Vec<UpstreamRecord>,
    pub next: Option<String>,
    pub dropped: usize,
}

/// Decode one page envelope.
///
/// An `error` member is an [`UpstreamError::Api`]. Items without a usable
/// `id` are dropped and counted.
pub fn parse_page(body: serde_json::Value) -> crate::error::Result<Page> {
    let envelope: Envelope = serde_json::from_value(body)
        .map_err(|e| CafeError::Upstream(UpstreamError::Parse(e.to_string())))?;

    if let Some(error) = envelope.error {
        return Err(CafeError::Upstream(UpstreamError::Api(error.to_string())));
    }

    let mut records = Vec::with_capacity(envelope.data.len());
    let mut dropped = 0;
    for item in envelope.data {
        match serde_json::from_value::<UpstreamRecord>(item)
            .ok()
            .and_then(UpstreamRecord::normalize)
        {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    let next = envelope
        .paging
        .and_then(|p| p.next)
        .filter(|n| !n.trim().is_empty());

    Ok(Page {
        records,
        next,
        dropped,
    })
}

/// Follow cursors from `first` until no next page is returned. A cursor
/// that points back at an already fetched page is an error.
pub async fn paginate(
    transport: &dyn PageTransport,
    first: PageRequest,
) -> crate::error::Result<Vec<UpstreamRecord>> {
    let mut all = Vec::new();
    let mut request = Some(first);
    let mut pages = 0u32;
    let mut seen = HashSet::new();

    while let Some(current) = request.take() {
        debug!(url = %redact_query(current.url()), page = pages + 1, "Fetching page");
        let body = transport.get_page(&current).await?;
        let page = parse_page(body)?;
        pages += 1;

        if page.dropped > 0 {
            warn!(dropped = page.dropped, "Dropped items without an id");
        }
        all.extend(page.records);
        info!(pages, fetched = all.len(), "Fetched page");

        seen.insert(current.url().to_string());
        if let Some(next) = page.next.as_ref().filter(|n| seen.contains(n.as_str())) {
            return Err(CafeError::Upstream(UpstreamError::Parse(format!(
                "pagination cursor repeated: {}",
                redact_query(next)
            ))));
        }
        request = page.next.map(PageRequest::Next);
    }

    Ok(all)
}

/// Cursor URLs embed the access token; keep it out of logs.
fn redact_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
