//! Media-URL refresh for already-stored cafés.
//!
//! CDN media URLs expire; this rewrites each stored `media_url` from a
//! fresh fetch. Stores are matched by id and never added or removed.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::progress::ProgressReporter;
use crate::types::{EnrichedStore, UpstreamRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub updated: usize,
    pub unchanged: usize,
    /// Stored ids with no matching fetched record.
    pub not_found: usize,
    /// Stores with an empty id; left alone.
    pub missing_id: usize,
}

impl RefreshReport {
    pub fn total(&self) -> usize {
        self.updated + self.unchanged + self.not_found + self.missing_id
    }
}

/// Replace each store's `media_url` with the fetched one when it differs.
///
/// A fetched record without a media URL leaves the stored value in place.
pub fn refresh_media_urls(
    stores: &mut [EnrichedStore],
    fetched: &[UpstreamRecord],
    progress: &dyn ProgressReporter,
) -> RefreshReport {
    let latest: HashMap<&str, Option<&str>> = fetched
        .iter()
        .map(|r| (r.id.as_str(), r.media_url.as_deref()))
        .collect();

    let mut report = RefreshReport::default();
    let total = stores.len();
    progress.begin("refresh", total as u64);

    for (i, store) in stores.iter_mut().enumerate() {
        let position = format!("[{}/{total}]", i + 1);
        let name = store.display_name().to_string();

        if store.id.trim().is_empty() {
            warn!(store_name = %name, "Store has no id");
            progress.record(&format!("{position} {name}: missing id"));
            report.missing_id += 1;
            continue;
        }

        match latest.get(store.id.as_str()) {
            None => {
                warn!(id = %store.id, store_name = %name, "not found upstream");
                progress.record(&format!("{position} {name}: not found upstream"));
                report.not_found += 1;
            }
            Some(Some(url)) if *url != store.media_url => {
                info!(id = %store.id, store_name = %name, "media_url updated");
                progress.record(&format!("{position} {name}: updated"));
                store.media_url = (*url).to_string();
                report.updated += 1;
            }
            Some(_) => {
                progress.record(&format!("{position} {name}: unchanged"));
                report.unchanged += 1;
            }
        }
    }
    progress.finish();

    info!(
        updated = report.updated,
        unchanged = report.unchanged,
        not_found = report.not_found,
        missing_id = report.missing_id,
        "Media URL refresh complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoopReporter, RecordingReporter};
    use crate::types::{Coordinates, StoreCandidate};

    fn store(id: &str, url: &str) -> EnrichedStore {
        let mut s = EnrichedStore::assemble(
            &UpstreamRecord::new(id).with_media_url(url),
            &StoreCandidate::new(format!("Cafe {id}"), "Tokyo"),
            Some(Coordinates { lat: 1.0, lng: 2.0 }),
        )
        .unwrap();
        s.id = id.to_string();
        s
    }

    #[test]
    fn updates_only_changed_urls() {
        let mut stores = vec![store("1", "old-1"), store("2", "same"), store("3", "old-3")];
        let fetched = vec![
            UpstreamRecord::new("1").with_media_url("new-1"),
            UpstreamRecord::new("2").with_media_url("same"),
        ];
        let reporter = RecordingReporter::default();
        let report = refresh_media_urls(&mut stores, &fetched, &reporter);

        assert_eq!(
            report,
            RefreshReport {
                updated: 1,
                unchanged: 1,
                not_found: 1,
                missing_id: 0,
            }
        );
        assert_eq!(stores[0].media_url, "new-1");
        assert_eq!(stores[2].media_url, "old-3");
        assert_eq!(stores.len(), 3);
        assert_eq!(reporter.lines()[3], "[3/3] Cafe 3: not found upstream");
    }

    #[test]
    fn second_refresh_is_a_no_op() {
        let mut stores = vec![store("1", "old")];
        let fetched = vec![UpstreamRecord::new("1").with_media_url("new")];
        refresh_media_urls(&mut stores, &fetched, &NoopReporter);
        let again = refresh_media_urls(&mut stores, &fetched, &NoopReporter);
        assert_eq!(again.updated, 0);
        assert_eq!(again.unchanged, 1);
    }

    #[test]
    fn missing_fetched_url_keeps_stored_value() {
        let mut stores = vec![store("1", "kept"), store("", "x")];
        let fetched = vec![UpstreamRecord::new("1")];
        let report = refresh_media_urls(&mut stores, &fetched, &NoopReporter);
        assert_eq!(stores[0].media_url, "kept");
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.missing_id, 1);
        assert_eq!(report.total(), 2);
    }
}
