//! CSV export of the store set.
//!
//! Two files are written next to each other: every store, and only the
//! stores with resolved coordinates. Exports are derived output and are
//! never read back.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::ExportError;
use crate::types::EnrichedStore;

/// One CSV row. Field order is column order.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: &'a str,
    store_name: &'a str,
    address: &'a str,
    lat: Option<f64>,
    lng: Option<f64>,
    caption: &'a str,
    media_url: &'a str,
    permalink: &'a str,
    timestamp: &'a str,
    username: &'a str,
    like_count: u64,
    comments_count: u64,
    media_type: &'a str,
}

impl<'a> From<&'a EnrichedStore> for ExportRow<'a> {
    fn from(s: &'a EnrichedStore) -> Self {
        Self {
            id: &s.id,
            store_name: s.store_name.as_deref().unwrap_or_default(),
            address: s.address.as_deref().unwrap_or_default(),
            lat: s.lat,
            lng: s.lng,
            caption: &s.caption,
            media_url: &s.media_url,
            permalink: &s.permalink,
            timestamp: &s.timestamp,
            username: &s.username,
            like_count: s.like_count,
            comments_count: s.comments_count,
            media_type: &s.media_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub all_path: PathBuf,
    pub with_coords_path: PathBuf,
    pub total: usize,
    pub with_coords: usize,
}

impl ExportReport {
    /// Percentage of stores with coordinates; 0 for an empty set.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.with_coords as f64 / self.total as f64 * 100.0;
        rate
    }
}

/// `<dir>/<stem>_all.csv` and `<dir>/<stem>_with_coords.csv`.
pub fn export_paths(dir: &Path, stem: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{stem}_all.csv")),
        dir.join(format!("{stem}_with_coords.csv")),
    )
}

/// Write both CSV files for `stores`.
pub fn export_csv(
    stores: &[EnrichedStore],
    dir: &Path,
    stem: &str,
) -> Result<ExportReport, ExportError> {
    std::fs::create_dir_all(dir)?;
    let (all_path, with_coords_path) = export_paths(dir, stem);

    let total = write_rows(&all_path, stores.iter())?;
    let with_coords = write_rows(
        &with_coords_path,
        stores.iter().filter(|s| s.coordinates().is_some()),
    )?;

    let report = ExportReport {
        all_path,
        with_coords_path,
        total,
        with_coords,
    };
    info!(
        total = report.total,
        with_coords = report.with_coords,
        success_rate = format!("{:.1}%", report.success_rate()),
        "CSV export complete"
    );
    Ok(report)
}

fn write_rows<'a>(
    path: &Path,
    stores: impl Iterator<Item = &'a EnrichedStore>,
) -> Result<usize, ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut count = 0;
    for store in stores {
        writer.serialize(ExportRow::from(store))?;
        count += 1;
    }
    // An empty export still gets a header row.
    if count == 0 {
        writer.write_record(COLUMNS)?;
    }
    writer.flush()?;
    Ok(count)
}

const COLUMNS: [&str; 13] = [
    "id",
    "store_name",
    "address",
    "lat",
    "lng",
    "caption",
    "media_url",
    "permalink",
    "timestamp",
    "username",
    "like_count",
    "comments_count",
    "media_type",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coordinates, StoreCandidate, UpstreamRecord};

    fn store(id: &str, coords: bool) -> EnrichedStore {
        let mut s = EnrichedStore::assemble(
            &UpstreamRecord::new(id).with_caption("美味しい, \"珈琲\"\n二行目"),
            &StoreCandidate::new(format!("Cafe {id}"), "東京都渋谷区"),
            Some(Coordinates { lat: 35.5, lng: 139.25 }),
        )
        .unwrap();
        if !coords {
            s.lat = None;
            s.lng = None;
        }
        s
    }

    #[test]
    fn writes_both_files_with_counts() {
        let dir = tempfile::tempdir().unwrap();
        let stores = vec![store("1", true), store("2", false), store("3", true)];
        let report = export_csv(&stores, dir.path(), "cafe_data").unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.with_coords, 2);
        assert!((report.success_rate() - 66.666).abs() < 0.01);

        let mut reader = csv::Reader::from_path(&report.all_path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, COLUMNS);
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "1");
        assert_eq!(&rows[0][3], "35.5");
        assert_eq!(&rows[0][5], "美味しい, \"珈琲\"\n二行目");
        assert_eq!(&rows[1][3], "");

        let reader = csv::Reader::from_path(&report.with_coords_path).unwrap();
        assert_eq!(reader.into_records().count(), 2);
    }

    #[test]
    fn empty_set_writes_headers_only() {
        let dir = tempfile::tempdir().unwrap();
        let report = export_csv(&[], dir.path(), "out").unwrap();
        assert_eq!(report.total, 0);
        assert!(report.success_rate().abs() < f64::EPSILON);
        let text = std::fs::read_to_string(dir.path().join("out_all.csv")).unwrap();
        assert!(text.starts_with("id,store_name,address,lat,lng"));
    }
}
