// Integration test utilities and scripted fakes for cafesync.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use cafesync_core::error::{CafeError, GeocodeError, LlmError, Result, UpstreamError};
use cafesync_core::extract::{StoreExtractor, parse_model_response};
use cafesync_core::geocode::Geocoder;
use cafesync_core::source::{MediaSource, PageRequest, PageTransport};
use cafesync_core::store::JsonStore;
use cafesync_core::types::{Coordinates, EnrichedStore, SkipSet, StoreCandidate, UpstreamRecord};

/// A temporary data directory with the default file layout.
#[derive(Debug)]
pub struct TestData {
    pub dir: tempfile::TempDir,
}

impl Default for TestData {
    fn default() -> Self {
        Self::new()
    }
}

impl TestData {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store(&self) -> JsonStore {
        JsonStore::in_dir(self.path())
    }

    pub fn with_posts(self, posts: &[UpstreamRecord]) -> Self {
        self.store().save_posts(posts).expect("write posts");
        self
    }

    pub fn with_stores(self, stores: &[EnrichedStore]) -> Self {
        self.store().save_stores(stores).expect("write stores");
        self
    }

    pub fn with_skipped(self, ids: &[&str]) -> Self {
        let skipped: SkipSet = ids.iter().map(|id| (*id).to_string()).collect();
        self.store().save_skipped(&skipped).expect("write skip set");
        self
    }

    pub fn stores(&self) -> Vec<EnrichedStore> {
        self.store().load_stores().expect("read stores")
    }

    pub fn skipped(&self) -> SkipSet {
        self.store().load_skipped().expect("read skip set")
    }

    /// Names of every file in the directory, sorted.
    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.path())
            .expect("read dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn post(id: &str, caption: &str) -> UpstreamRecord {
    UpstreamRecord::new(id).with_caption(caption)
}

pub fn post_with_media(id: &str, caption: &str, media_url: &str) -> UpstreamRecord {
    UpstreamRecord::new(id)
        .with_caption(caption)
        .with_media_url(media_url)
}

/// A complete stored café for `id`.
pub fn stored(id: &str, media_url: &str) -> EnrichedStore {
    EnrichedStore::assemble(
        &post_with_media(id, "stored", media_url),
        &StoreCandidate::new(format!("Cafe {id}"), "東京都渋谷区"),
        Some(Coordinates {
            lat: 35.66,
            lng: 139.70,
        }),
    )
    .expect("complete store")
}

// ── Extractor ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum ExtractorReply {
    Candidate(StoreCandidate),
    RawText(String),
    Fail,
}

/// Extractor answering from a per-caption script. Unknown captions get
/// the null/null pair.
#[derive(Debug, Default)]
pub struct ScriptedExtractor {
    replies: HashMap<String, ExtractorReply>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn answer(mut self, caption: &str, store_name: Option<&str>, address: Option<&str>) -> Self {
        self.replies.insert(
            caption.to_string(),
            ExtractorReply::Candidate(StoreCandidate {
                store_name: store_name.map(String::from),
                address: address.map(String::from),
            }),
        );
        self
    }

    /// Answer with raw model text, run through the response parser.
    #[must_use]
    pub fn answer_raw(mut self, caption: &str, text: &str) -> Self {
        self.replies
            .insert(caption.to_string(), ExtractorReply::RawText(text.to_string()));
        self
    }

    #[must_use]
    pub fn fail_on(mut self, caption: &str) -> Self {
        self.replies.insert(caption.to_string(), ExtractorReply::Fail);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("lock").clone()
    }
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl StoreExtractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(&self, caption: &str) -> Result<StoreCandidate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().expect("lock").push(caption.to_string());
        match self.replies.get(caption) {
            Some(ExtractorReply::Candidate(c)) => Ok(c.clone()),
            Some(ExtractorReply::RawText(text)) => Ok(parse_model_response(text).into_candidate()),
            Some(ExtractorReply::Fail) => Err(CafeError::Llm(LlmError::ApiError {
                status: 503,
                body: "overloaded".into(),
            })),
            None => Ok(StoreCandidate::empty()),
        }
    }
}

// ── Geocoder ───────────────────────────────────────────────────────

/// Geocoder answering from a per-address table. Unknown addresses are
/// not found.
#[derive(Debug, Default)]
pub struct ScriptedGeocoder {
    known: HashMap<String, Coordinates>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn locate(mut self, address: &str, lat: f64, lng: f64) -> Self {
        self.known.insert(address.to_string(), Coordinates { lat, lng });
        self
    }

    #[must_use]
    pub fn fail_on(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl Geocoder for ScriptedGeocoder {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(address) {
            return Err(CafeError::Geocode(GeocodeError::Network(
                "connection reset".into(),
            )));
        }
        Ok(self.known.get(address).copied())
    }
}

// ── Source ─────────────────────────────────────────────────────────

/// Page transport serving canned envelopes, linked by cursor URLs.
#[derive(Debug, Default)]
pub struct PagedTransport {
    first: Option<serde_json::Value>,
    by_cursor: HashMap<String, serde_json::Value>,
    requests: Mutex<Vec<PageRequest>>,
}

impl PagedTransport {
    /// Split `records` into pages of `page_size`, chained by cursors.
    pub fn from_records(records: &[UpstreamRecord], page_size: usize) -> Self {
        let chunks: Vec<&[UpstreamRecord]> = records.chunks(page_size.max(1)).collect();
        let mut transport = Self::default();
        if chunks.is_empty() {
            transport.first = Some(serde_json::json!({ "data": [] }));
            return transport;
        }
        for (i, chunk) in chunks.iter().enumerate() {
            let mut page = serde_json::json!({ "data": chunk });
            if i + 1 < chunks.len() {
                page["paging"] = serde_json::json!({ "next": Self::cursor(i + 1) });
            }
            if i == 0 {
                transport.first = Some(page);
            } else {
                transport.by_cursor.insert(Self::cursor(i), page);
            }
        }
        transport
    }

    /// A transport whose first page is an API error envelope.
    pub fn error_envelope(message: &str) -> Self {
        Self {
            first: Some(serde_json::json!({
                "error": { "message": message, "type": "OAuthException", "code": 190 }
            })),
            ..Self::default()
        }
    }

    pub fn cursor(page: usize) -> String {
        format!("https://graph.example/v23.0/1789/media?after=cursor{page}&access_token=secret")
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait::async_trait]
impl PageTransport for PagedTransport {
    async fn get_page(&self, request: &PageRequest) -> Result<serde_json::Value> {
        self.requests.lock().expect("lock").push(request.clone());
        let page = match request {
            PageRequest::First { .. } => self.first.clone(),
            PageRequest::Next(url) => self.by_cursor.get(url).cloned(),
        };
        page.ok_or_else(|| {
            CafeError::Upstream(UpstreamError::Status {
                status: 404,
                body: format!("no page at {}", request.url()),
            })
        })
    }
}

/// Media source returning a fixed batch, or failing.
#[derive(Debug)]
pub struct StaticSource {
    records: Option<Vec<UpstreamRecord>>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn ok(records: Vec<UpstreamRecord>) -> Self {
        Self {
            records: Some(records),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            records: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl MediaSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_all(&self) -> Result<Vec<UpstreamRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.records.clone().ok_or_else(|| {
            CafeError::Upstream(UpstreamError::Api(
                "{\"message\":\"Error validating access token\"}".into(),
            ))
        })
    }
}
