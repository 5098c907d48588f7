//! Orchestration of the stages against the file store.
//!
//! Each entry point is one CLI operation: load what it needs, run the
//! pure stage, persist. File-level failures abort before anything is
//! written; per-record failures never reach this layer.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::export::{ExportReport, export_csv};
use crate::progress::ProgressReporter;
use crate::refresh::{RefreshReport, refresh_media_urls};
use crate::source::MediaSource;
use crate::store::JsonStore;
use crate::sync::{SyncReport, SyncState, Synchronizer, plan};
use crate::types::UpstreamRecord;

/// Records for one run and where they came from.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub records: Vec<UpstreamRecord>,
    pub from_cache: bool,
}

/// Fetch from `source`, falling back once to the cached posts snapshot.
///
/// When the snapshot is unavailable too, the original fetch error is
/// returned.
#[instrument(skip_all, fields(source = source.name()))]
pub async fn fetch_or_cached(source: &dyn MediaSource, store: &JsonStore) -> Result<FetchOutcome> {
    match source.fetch_all().await {
        Ok(records) => Ok(FetchOutcome {
            records,
            from_cache: false,
        }),
        Err(fetch_err) => {
            warn!(error = %fetch_err, "Fetch failed, trying cached snapshot");
            match store.load_posts() {
                Ok(records) => {
                    info!(
                        path = %store.posts_path().display(),
                        count = records.len(),
                        "Using cached posts"
                    );
                    Ok(FetchOutcome {
                        records,
                        from_cache: true,
                    })
                }
                Err(cache_err) => {
                    warn!(error = %cache_err, "Cached snapshot unavailable");
                    Err(fetch_err)
                }
            }
        }
    }
}

/// Fetch every post and rewrite the snapshot. No cache fallback.
pub async fn fetch_snapshot(source: &dyn MediaSource, store: &JsonStore) -> Result<usize> {
    let records = source.fetch_all().await?;
    store.save_posts(&records)?;
    Ok(records.len())
}

/// Load the persisted store set (empty on first run) and skip set.
pub fn load_state(store: &JsonStore) -> Result<SyncState> {
    let state = SyncState::new(store.load_stores_or_empty()?, store.load_skipped()?);
    let overlap = state.overlap();
    if !overlap.is_empty() {
        warn!(count = overlap.len(), ids = ?overlap, "Ids are both stored and skipped");
    }
    Ok(state)
}

/// Planning only: counts without calling any stage or writing files.
pub fn plan_sync(records: &[UpstreamRecord], store: &JsonStore) -> Result<SyncReport> {
    let state = load_state(store)?;
    let candidates = plan(records, &state).len();
    Ok(SyncReport {
        fetched: records.len(),
        existing: state.stores.len(),
        previously_skipped: state.skipped.len(),
        candidates,
        deferred: candidates,
        ..SyncReport::default()
    })
}

/// Load, enrich the new records, then persist the store set and skip set.
#[instrument(skip_all, fields(records = records.len()))]
pub async fn run_sync(
    records: &[UpstreamRecord],
    store: &JsonStore,
    synchronizer: &Synchronizer<'_>,
) -> Result<SyncReport> {
    let mut state = load_state(store)?;
    let report = synchronizer.run(records, &mut state).await;

    if report.added > 0 || !store.stores_path().exists() {
        store.save_stores(&state.stores)?;
    }
    if report.newly_skipped > 0 || !store.skipped_path().exists() {
        store.save_skipped(&state.skipped)?;
        info!(added = report.newly_skipped, "Skip set updated");
    }
    Ok(report)
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub report: RefreshReport,
    pub backup: Option<PathBuf>,
    pub from_cache: bool,
}

/// Fetch, rewrite the snapshot, refresh media URLs, back up, save.
#[instrument(skip_all)]
pub async fn run_refresh(
    source: &dyn MediaSource,
    store: &JsonStore,
    progress: &dyn ProgressReporter,
    now: DateTime<Local>,
) -> Result<RefreshOutcome> {
    let fetched = fetch_or_cached(source, store).await?;
    if !fetched.from_cache {
        store.save_posts(&fetched.records)?;
    }

    let mut stores = store.load_stores()?;
    info!(stores = stores.len(), fetched = fetched.records.len(), "Refreshing media URLs");
    let report = refresh_media_urls(&mut stores, &fetched.records, progress);

    let backup = store.backup_stores(now)?;
    store.save_stores(&stores)?;

    Ok(RefreshOutcome {
        report,
        backup,
        from_cache: fetched.from_cache,
    })
}

/// Export the persisted store set to CSV under `dir`.
pub fn run_export(store: &JsonStore, dir: &Path, stem: &str) -> Result<ExportReport> {
    let stores = store.load_stores()?;
    Ok(export_csv(&stores, dir, stem)?)
}

/// Counts over the persisted files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// `None` when no snapshot has been fetched yet.
    pub posts: Option<usize>,
    pub stores: usize,
    pub skipped: usize,
    pub pending: usize,
    /// Ids found in both the store set and the skip set.
    pub overlap: Vec<String>,
}

impl StatusReport {
    pub fn is_consistent(&self) -> bool {
        self.overlap.is_empty()
    }
}

pub fn status(store: &JsonStore) -> Result<StatusReport> {
    let state = load_state(store)?;
    let posts = match store.load_posts() {
        Ok(posts) => Some(posts),
        Err(crate::error::StoreError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };
    let pending = posts.as_deref().map_or(0, |p| plan(p, &state).len());

    Ok(StatusReport {
        posts: posts.map(|p| p.len()),
        stores: state.stores.len(),
        skipped: state.skipped.len(),
        pending,
        overlap: state.overlap(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CafeError, UpstreamError};
    use crate::types::{Coordinates, EnrichedStore, SkipSet, StoreCandidate};

    struct FailingSource;

    #[async_trait::async_trait]
    #[allow(clippy::unnecessary_literal_bound)]
    impl MediaSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch_all(&self) -> Result<Vec<UpstreamRecord>> {
            Err(CafeError::Upstream(UpstreamError::Api("token expired".into())))
        }
    }

    fn stored(id: &str) -> EnrichedStore {
        EnrichedStore::assemble(
            &UpstreamRecord::new(id),
            &StoreCandidate::new("Cafe", "Tokyo"),
            Some(Coordinates { lat: 1.0, lng: 2.0 }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fetch_falls_back_to_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::in_dir(dir.path());

        let err = fetch_or_cached(&FailingSource, &store).await.unwrap_err();
        assert!(matches!(err, CafeError::Upstream(UpstreamError::Api(_))));

        store.save_posts(&[UpstreamRecord::new("1")]).unwrap();
        let outcome = fetch_or_cached(&FailingSource, &store).await.unwrap();
        assert!(outcome.from_cache);
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn status_counts_pending_and_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::in_dir(dir.path());

        let empty = status(&store).unwrap();
        assert_eq!(empty.posts, None);
        assert!(empty.is_consistent());

        store
            .save_posts(&[UpstreamRecord::new("1"), UpstreamRecord::new("2"), UpstreamRecord::new("3")])
            .unwrap();
        store.save_stores(&[stored("1")]).unwrap();
        let skipped: SkipSet = ["1".to_string(), "2".to_string()].into_iter().collect();
        store.save_skipped(&skipped).unwrap();

        let report = status(&store).unwrap();
        assert_eq!(report.posts, Some(3));
        assert_eq!(report.pending, 1);
        assert_eq!(report.overlap, vec!["1".to_string()]);
        assert!(!report.is_consistent());
    }

    #[test]
    fn plan_sync_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::in_dir(dir.path());
        let report = plan_sync(&[UpstreamRecord::new("1"), UpstreamRecord::new("1")], &store).unwrap();
        assert_eq!(report.candidates, 1);
        assert!(!store.stores_path().exists());
        assert!(!store.skipped_path().exists());
    }

    #[test]
    fn export_requires_store_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::in_dir(dir.path());
        assert!(run_export(&store, dir.path(), "cafe_data").is_err());
    }
}
