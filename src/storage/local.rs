//! Local filesystem storage implementation.
//!
//! One CSV file per snapshot, named
//! `{category}_{filter}_{YYYYMMDD_HHMMSS}.csv`, with a header row of field
//! names. The directory is scanned once on open; after that lookups go
//! through the in-memory [`LineageIndex`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Category, LineageKey, Record, Snapshot, Timestamp};
use crate::storage::{LineageIndex, SnapshotStore};

const EXTENSION: &str = "csv";

/// Directory of CSV snapshot files.
#[derive(Debug, Clone)]
pub struct CsvSnapshotStore {
    root_dir: PathBuf,
    index: LineageIndex,
}

impl CsvSnapshotStore {
    /// Open (creating if needed) the snapshot directory and index its contents.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        let context = root_dir.display().to_string();
        tokio::fs::create_dir_all(&root_dir)
            .await
            .map_err(|e| AppError::persistence(&context, e))?;

        let mut index = LineageIndex::new();
        let mut entries = tokio::fs::read_dir(&root_dir)
            .await
            .map_err(|e| AppError::persistence(&context, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::persistence(&context, e))?
        {
            let name = entry.file_name();
            match name.to_str().and_then(parse_file_name) {
                Some((lineage, timestamp)) => {
                    index.insert(lineage, timestamp);
                }
                None => log::debug!("Ignoring non-snapshot file {:?}", name),
            }
        }

        log::info!(
            "Indexed {} snapshots in {}",
            index.len(),
            root_dir.display()
        );
        Ok(Self { root_dir, index })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Full path of the artifact for one snapshot.
    pub fn path_for(&self, lineage: &LineageKey, timestamp: Timestamp) -> PathBuf {
        self.root_dir.join(file_name(lineage, timestamp))
    }

    async fn write_new(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        if tokio::fs::try_exists(path).await? {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "snapshot already exists",
            ));
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await
    }
}

#[async_trait]
impl SnapshotStore for CsvSnapshotStore {
    async fn save(&mut self, snapshot: &Snapshot) -> Result<PathBuf> {
        let lineage = snapshot.lineage();
        let path = self.path_for(&lineage, snapshot.timestamp);
        let context = path.display().to_string();

        if let Some(latest) = self.index.latest(&lineage) {
            if snapshot.timestamp <= latest {
                return Err(AppError::persistence(
                    context,
                    format!("timestamp is not newer than latest snapshot {latest}"),
                ));
            }
        }

        let bytes = encode_csv(snapshot).map_err(|e| AppError::persistence(&context, e))?;
        self.write_new(&path, &bytes)
            .await
            .map_err(|e| AppError::persistence(&context, e))?;
        self.index.insert(lineage, snapshot.timestamp);

        log::info!(
            "Saved {} {} records to {}",
            snapshot.len(),
            snapshot.category,
            path.display()
        );
        Ok(path)
    }

    async fn latest_before(
        &self,
        lineage: &LineageKey,
        before: Timestamp,
    ) -> Result<Option<Snapshot>> {
        let Some(timestamp) = self.index.latest_before(lineage, before) else {
            return Ok(None);
        };

        let path = self.path_for(lineage, timestamp);
        let context = path.display().to_string();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::persistence(&context, e))?;
        let records = decode_csv(&bytes).map_err(|e| AppError::persistence(&context, e))?;

        log::debug!("Previous snapshot for {lineage}: {}", path.display());
        Ok(Some(Snapshot::new(
            lineage.category,
            lineage.filter_name.clone(),
            timestamp,
            records,
        )))
    }

    fn lineages(&self) -> Vec<(LineageKey, Timestamp)> {
        self.index.lineages()
    }
}

/// `{category}_{filter}_{timestamp}.csv`
fn file_name(lineage: &LineageKey, timestamp: Timestamp) -> String {
    format!(
        "{}_{}_{}.{}",
        lineage.category, lineage.filter_name, timestamp, EXTENSION
    )
}

/// Inverse of [`file_name`]. Filter names may themselves contain underscores,
/// so the timestamp is taken from the fixed-width tail.
fn parse_file_name(name: &str) -> Option<(LineageKey, Timestamp)> {
    let stem = name.strip_suffix(&format!(".{EXTENSION}"))?;
    let (category, rest) = stem.split_once('_')?;
    let category: Category = category.parse().ok()?;

    let split = rest.len().checked_sub(Timestamp::LEN + 1)?;
    if !rest.is_char_boundary(split) {
        return None;
    }
    let (filter_name, tail) = rest.split_at(split);
    let timestamp: Timestamp = tail.strip_prefix('_')?.parse().ok()?;
    if filter_name.is_empty() {
        return None;
    }

    Some((LineageKey::new(category, filter_name), timestamp))
}

fn encode_csv(snapshot: &Snapshot) -> std::result::Result<Vec<u8>, csv::Error> {
    let mut header = snapshot.header();
    if header.is_empty() {
        header.push(Record::TITLE);
    }

    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(&header)?;
    for record in &snapshot.records {
        writer.write_record(header.iter().map(|field| record.get(field).unwrap_or("")))?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

fn decode_csv(bytes: &[u8]) -> std::result::Result<Vec<Record>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let header = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let fields = header
            .iter()
            .zip(row.iter())
            .filter(|(key, value)| *key == Record::TITLE || !value.is_empty());
        match Record::from_fields(fields) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping stored row {:?}: {}", row.position(), e),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn snapshot(filter: &str, at: &str, titles: &[&str]) -> Snapshot {
        let records = titles
            .iter()
            .map(|t| Record::new(*t, format!("https://example.com/{t}"), "Active").unwrap())
            .collect();
        Snapshot::new(Category::Tenders, filter, ts(at), records)
    }

    #[test]
    fn test_file_name_round_trip_with_underscores() {
        let key = LineageKey::new(Category::Tenders, "india_water_tenders");
        let name = file_name(&key, ts("20250101_090000"));
        assert_eq!(name, "tenders_india_water_tenders_20250101_090000.csv");
        assert_eq!(
            parse_file_name(&name),
            Some((key, ts("20250101_090000")))
        );
    }

    #[test]
    fn test_parse_file_name_rejects_foreign_files() {
        assert_eq!(parse_file_name("notes.txt"), None);
        assert_eq!(parse_file_name("tenders_x_20250101_090000.tmp"), None);
        assert_eq!(parse_file_name("grants_x_20250101_090000.csv"), None);
        assert_eq!(parse_file_name("tenders_20250101_090000.csv"), None);
        assert_eq!(parse_file_name("tenders_x_2025.csv"), None);
    }

    #[tokio::test]
    async fn test_latest_before_follows_timestamps() {
        let tmp = TempDir::new().unwrap();
        let mut store = CsvSnapshotStore::open(tmp.path()).await.unwrap();

        for (at, titles) in [
            ("20250101_090000", vec!["A"]),
            ("20250102_090000", vec!["A", "B"]),
            ("20250103_090000", vec!["A", "B", "C"]),
        ] {
            store.save(&snapshot("india", at, &titles)).await.unwrap();
        }

        let key = LineageKey::new(Category::Tenders, "india");
        let prev = store
            .latest_before(&key, ts("20250103_090000"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(prev.timestamp, ts("20250102_090000"));
        assert_eq!(prev.len(), 2);

        assert!(
            store
                .latest_before(&key, ts("20250101_090000"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_reopen_rebuilds_index() {
        let tmp = TempDir::new().unwrap();
        {
            let mut store = CsvSnapshotStore::open(tmp.path()).await.unwrap();
            store
                .save(&snapshot("a_b", "20250102_090000", &["X"]))
                .await
                .unwrap();
            store
                .save(&snapshot("a", "20250101_090000", &["Y"]))
                .await
                .unwrap();
        }
        std::fs::write(tmp.path().join("README.txt"), "not a snapshot").unwrap();

        let store = CsvSnapshotStore::open(tmp.path()).await.unwrap();
        let lineages = store.lineages();
        assert_eq!(lineages.len(), 2);

        let prev = store
            .latest_before(
                &LineageKey::new(Category::Tenders, "a_b"),
                ts("20250103_000000"),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(prev.records[0].title(), "X");
    }

    #[tokio::test]
    async fn test_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let mut store = CsvSnapshotStore::open(tmp.path()).await.unwrap();
        store
            .save(&snapshot("india", "20250102_090000", &["A"]))
            .await
            .unwrap();

        let same = store
            .save(&snapshot("india", "20250102_090000", &["B"]))
            .await;
        assert!(matches!(same, Err(AppError::Persistence { .. })));

        let older = store
            .save(&snapshot("india", "20250101_090000", &["B"]))
            .await;
        assert!(matches!(older, Err(AppError::Persistence { .. })));

        let key = LineageKey::new(Category::Tenders, "india");
        let kept = store
            .latest_before(&key, ts("20250103_000000"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.records[0].title(), "A");
    }

    #[tokio::test]
    async fn test_ragged_records_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut store = CsvSnapshotStore::open(tmp.path()).await.unwrap();

        let first = Record::new("Bridge, phase 2", "https://example.com/1", "Active")
            .unwrap()
            .with_field("Closing Date", "2025-03-01");
        let second = Record::new("Port \"North\"", "https://example.com/2", "Active")
            .unwrap()
            .with_field("Country", "India");
        let saved = Snapshot::new(
            Category::Projects,
            "mixed",
            ts("20250101_090000"),
            vec![first.clone(), second.clone()],
        );
        let path = store.save(&saved).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Title,Link,Status,Closing Date,Country\n"));

        let loaded = store
            .latest_before(&saved.lineage(), ts("20250102_000000"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.records, vec![first, second]);
    }
}
