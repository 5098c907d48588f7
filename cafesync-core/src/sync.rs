//! Incremental synchronization of fetched posts into the persisted store set.
//!
//! Each run diffs the fetched batch against the stored ids and the skip set,
//! enriches only the remaining candidates (extract, then geocode), appends
//! complete stores and records every failure in the skip set. A record ends
//! a run in exactly one of the two collections.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::extract::StoreExtractor;
use crate::geocode::Geocoder;
use crate::llm::CostTracker;
use crate::progress::ProgressReporter;
use crate::types::{Coordinates, EnrichedStore, SkipSet, StoreCandidate, UpstreamRecord};

/// Why a record was added to the skip set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No caption to extract from; no external call was made.
    NoCaption,
    /// The extractor failed outright (network, provider error).
    ExtractionFailed(String),
    /// Extraction lacked a store name and/or an address.
    Incomplete {
        missing_store_name: bool,
        missing_address: bool,
    },
    /// The geocoder found no coordinates for the address.
    GeocodeNotFound,
    /// The geocoder failed outright.
    GeocodeFailed(String),
}

impl SkipReason {
    /// Stable key for summary counts.
    pub fn key(&self) -> &'static str {
        match self {
            Self::NoCaption => "no_caption",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::Incomplete { .. } => "incomplete",
            Self::GeocodeNotFound => "geocode_not_found",
            Self::GeocodeFailed(_) => "geocode_failed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCaption => write!(f, "no caption"),
            Self::ExtractionFailed(e) => write!(f, "extraction failed: {e}"),
            Self::Incomplete {
                missing_store_name,
                missing_address,
            } => {
                let missing: Vec<&str> = [
                    missing_store_name.then_some("store_name"),
                    missing_address.then_some("address"),
                ]
                .into_iter()
                .flatten()
                .collect();
                write!(f, "incomplete (missing {})", missing.join(", "))
            }
            Self::GeocodeNotFound => write!(f, "incomplete (address not geocoded)"),
            Self::GeocodeFailed(e) => write!(f, "geocode failed: {e}"),
        }
    }
}

/// Outcome of enriching one candidate record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Added(EnrichedStore),
    Skipped(SkipReason),
}

/// In-memory view of the persisted store set and skip set.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub stores: Vec<EnrichedStore>,
    pub skipped: SkipSet,
}

impl SyncState {
    pub fn new(stores: Vec<EnrichedStore>, skipped: SkipSet) -> Self {
        Self { stores, skipped }
    }

    pub fn store_ids(&self) -> HashSet<&str> {
        self.stores.iter().map(|s| s.id.as_str()).collect()
    }

    /// Whether `id` is already stored or skipped.
    pub fn is_known(&self, id: &str) -> bool {
        self.skipped.contains(id) || self.stores.iter().any(|s| s.id == id)
    }

    /// Ids present in both collections. Empty whenever the state is sound.
    pub fn overlap(&self) -> Vec<String> {
        self.stores
            .iter()
            .filter(|s| self.skipped.contains(&s.id))
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn is_disjoint(&self) -> bool {
        self.overlap().is_empty()
    }
}

/// Records from `fetched` that are neither stored nor skipped, in fetch
/// order, first occurrence only.
pub fn plan<'r>(fetched: &'r [UpstreamRecord], state: &SyncState) -> Vec<&'r UpstreamRecord> {
    let stored = state.store_ids();
    let mut seen = HashSet::new();
    fetched
        .iter()
        .filter(|r| !stored.contains(r.id.as_str()) && !state.skipped.contains(&r.id))
        .filter(|r| seen.insert(r.id.as_str()))
        .collect()
}

/// Counts for one synchronizer run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub fetched: usize,
    pub existing: usize,
    pub previously_skipped: usize,
    pub candidates: usize,
    pub processed: usize,
    pub added: usize,
    pub newly_skipped: usize,
    /// Candidates left for a later run because of `limit`.
    pub deferred: usize,
    pub skip_reasons: BTreeMap<&'static str, usize>,
    pub llm: CostTracker,
    pub duration: Duration,
}

/// Enrichment driver. Stages run strictly one record at a time.
pub struct Synchronizer<'a> {
    extractor: &'a dyn StoreExtractor,
    geocoder: &'a dyn Geocoder,
    progress: &'a dyn ProgressReporter,
    limit: Option<usize>,
}

impl fmt::Debug for Synchronizer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("extractor", &self.extractor.name())
            .field("geocoder", &self.geocoder.name())
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        extractor: &'a dyn StoreExtractor,
        geocoder: &'a dyn Geocoder,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            extractor,
            geocoder,
            progress,
            limit: None,
        }
    }

    /// Process at most `limit` candidates per run.
    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Enrich one record. Never fails: every error becomes a skip reason.
    pub async fn enrich(&self, record: &UpstreamRecord) -> RecordOutcome {
        let Some(caption) = record.caption_text() else {
            return RecordOutcome::Skipped(SkipReason::NoCaption);
        };

        let candidate: StoreCandidate = match self.extractor.extract(caption).await {
            Ok(c) => c,
            Err(e) => {
                warn!(id = %record.id, error = %e, "Extraction failed");
                return RecordOutcome::Skipped(SkipReason::ExtractionFailed(e.to_string()));
            }
        };

        let geocoded: Result<Option<Coordinates>, String> = match candidate.address.as_deref() {
            Some(address) => self.geocoder.geocode(address).await.map_err(|e| {
                warn!(id = %record.id, error = %e, "Geocoding failed");
                e.to_string()
            }),
            None => Ok(None),
        };

        if candidate.store_name.is_none() || candidate.address.is_none() {
            return RecordOutcome::Skipped(SkipReason::Incomplete {
                missing_store_name: candidate.store_name.is_none(),
                missing_address: candidate.address.is_none(),
            });
        }

        match geocoded {
            Err(e) => RecordOutcome::Skipped(SkipReason::GeocodeFailed(e)),
            Ok(None) => RecordOutcome::Skipped(SkipReason::GeocodeNotFound),
            Ok(coords) => match EnrichedStore::assemble(record, &candidate, coords) {
                Some(store) => RecordOutcome::Added(store),
                None => RecordOutcome::Skipped(SkipReason::GeocodeNotFound),
            },
        }
    }

    /// Run one pass over `fetched`, updating `state` in memory.
    #[instrument(skip_all, name = "sync", fields(fetched = fetched.len()))]
    pub async fn run(&self, fetched: &[UpstreamRecord], state: &mut SyncState) -> SyncReport {
        let start = Instant::now();
        let mut report = SyncReport {
            fetched: fetched.len(),
            existing: state.stores.len(),
            previously_skipped: state.skipped.len(),
            ..SyncReport::default()
        };

        let candidates = plan(fetched, state);
        report.candidates = candidates.len();
        let take = self.limit.map_or(candidates.len(), |l| l.min(candidates.len()));
        report.deferred = candidates.len() - take;

        info!(
            existing = report.existing,
            skipped = report.previously_skipped,
            fetched = report.fetched,
            candidates = report.candidates,
            deferred = report.deferred,
            "Sync plan"
        );

        self.progress.begin("sync", take as u64);
        let mut added = Vec::new();
        let mut newly_skipped = Vec::new();

        for (i, record) in candidates.into_iter().take(take).enumerate() {
            let position = format!("[{}/{take}] {}", i + 1, record.id);
            match self.enrich(record).await {
                RecordOutcome::Added(store) => {
                    info!(
                        id = %record.id,
                        store_name = store.display_name(),
                        address = store.address.as_deref().unwrap_or_default(),
                        "added"
                    );
                    self.progress.record(&format!(
                        "{position}: added {} - {}",
                        store.display_name(),
                        store.address.as_deref().unwrap_or_default()
                    ));
                    added.push(store);
                }
                RecordOutcome::Skipped(reason) => {
                    info!(id = %record.id, %reason, "skipped");
                    self.progress.record(&format!("{position}: skipped: {reason}"));
                    *report.skip_reasons.entry(reason.key()).or_default() += 1;
                    newly_skipped.push(record.id.clone());
                }
            }
            report.processed += 1;
        }
        self.progress.finish();

        report.added = added.len();
        report.newly_skipped = newly_skipped.len();
        state.stores.extend(added);
        state.skipped.extend(newly_skipped);

        report.llm = self.extractor.usage();
        report.duration = start.elapsed();
        info!(
            added = report.added,
            skipped = report.newly_skipped,
            processed = report.processed,
            duration = ?report.duration,
            "Sync complete"
        );
        report
    }
}
