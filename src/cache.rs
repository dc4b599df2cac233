//! The local CSV snapshot of the normalized rows.
//!
//! The cache is always read and written whole. Change detection is a full-table comparison: the
//! rows parsed back from the file are compared, in order, against the freshly normalized rows.
//! This is O(rows) per sync and relies on the remote source returning rows in a stable order.

use crate::error::{ErrorType, IntoResult, Res};
use crate::model::{Amount, NormalizedRow};
use crate::{utils, Error, Result};
use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// The header row of the cache file.
pub const HEADERS: [&str; 5] = ["Concepto", "Tipo", "Fecha", "Importe", "Mes"];

/// The outcome of `Cache::sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The cache did not exist or differed, and was rewritten.
    Updated,
    /// The cache already held exactly these rows; nothing was written.
    Unchanged,
}

serde_plain::derive_display_from_serialize!(SyncStatus);

/// One line of the cache file, as text.
#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
pub(crate) struct CacheRecord {
    #[serde(rename = "Concepto")]
    pub(crate) concept: String,
    #[serde(rename = "Tipo")]
    pub(crate) category: String,
    #[serde(rename = "Fecha")]
    pub(crate) date: String,
    #[serde(rename = "Importe")]
    pub(crate) amount: String,
    #[serde(rename = "Mes")]
    pub(crate) period: String,
}

impl CacheRecord {
    /// An empty or unparsable amount cell is `None`.
    pub(crate) fn amount(&self) -> Option<Decimal> {
        let s = self.amount.trim();
        if s.is_empty() {
            return None;
        }
        match Amount::from_str(s) {
            Ok(a) => Some(a.value()),
            Err(e) => {
                debug!("Ignoring unparsable amount '{s}': {e}");
                None
            }
        }
    }

    fn into_row(self) -> NormalizedRow {
        NormalizedRow {
            amount: self.amount(),
            concept: self.concept,
            category: self.category,
            date: self.date,
            period: self.period,
        }
    }
}

/// The CSV file holding the last synced rows.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Cache {
    path: PathBuf,
}

impl Cache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Rewrites the cache with `rows` unless it already holds exactly the same rows in the same
    /// order. A cache that cannot be parsed counts as different.
    pub async fn sync(&self, rows: &[NormalizedRow]) -> Result<SyncStatus> {
        self.sync_inner(rows).await.pub_result(ErrorType::Cache)
    }

    async fn sync_inner(&self, rows: &[NormalizedRow]) -> Res<SyncStatus> {
        if self.exists() {
            match self.read_rows().await {
                Ok(existing) if existing == rows => {
                    debug!("{} rows unchanged in {}", rows.len(), self.path.display());
                    return Ok(SyncStatus::Unchanged);
                }
                Ok(existing) => debug!(
                    "Cache differs: {} rows on disk, {} fetched",
                    existing.len(),
                    rows.len()
                ),
                Err(e) => warn!("The cache will be rewritten because it could not be read: {e:#}"),
            }
        }
        self.write(rows).await?;
        info!("Wrote {} rows to {}", rows.len(), self.path.display());
        Ok(SyncStatus::Updated)
    }

    /// Reads every line of the cache as text.
    ///
    /// # Errors
    /// `CacheMissing` when there is no cache file, `Cache` when it cannot be read or parsed.
    pub(crate) async fn read_records(&self) -> Result<Vec<CacheRecord>> {
        if !self.exists() {
            return Err(Error::msg(
                ErrorType::CacheMissing,
                format!("No cache file found at {}", self.path.display()),
            ));
        }
        self.read_records_inner().await.pub_result(ErrorType::Cache)
    }

    async fn read_records_inner(&self) -> Res<Vec<CacheRecord>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read cache at {}", self.path.display()))?;
        let mut rdr = csv::Reader::from_reader(bytes.as_slice());
        let mut records = Vec::new();
        for (ix, result) in rdr.deserialize().enumerate() {
            let record: CacheRecord = result.with_context(|| {
                format!("Malformed cache line {} in {}", ix + 2, self.path.display())
            })?;
            records.push(record);
        }
        Ok(records)
    }

    async fn read_rows(&self) -> Res<Vec<NormalizedRow>> {
        let records = self.read_records_inner().await?;
        Ok(records.into_iter().map(CacheRecord::into_row).collect())
    }

    async fn write(&self, rows: &[NormalizedRow]) -> Res<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            utils::make_dir(parent).await?;
        }
        let data = to_csv(rows)?;
        utils::write(&self.path, data).await
    }
}

/// Serializes `rows` with the header line, which is written even when there are no rows.
fn to_csv(rows: &[NormalizedRow]) -> Res<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(HEADERS)?;
    for row in rows {
        wtr.serialize(row).context("Unable to serialize a cache row")?;
    }
    wtr.into_inner().context("Unable to flush the cache CSV")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(concept: &str, category: &str, date: &str, amount: Option<&str>) -> NormalizedRow {
        NormalizedRow {
            concept: concept.into(),
            category: category.into(),
            date: date.into(),
            amount: amount.map(|a| Decimal::from_str(a).unwrap()),
            period: crate::model::period_of_str(date),
        }
    }

    fn rows() -> Vec<NormalizedRow> {
        vec![
            row("Nómina", "Ingreso", "2024-01-01", Some("1000")),
            row("Café, con leche", "Gasto", "2024-01-02", Some("2.5")),
            row("", "", "", None),
        ]
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().join("c.csv"));
        assert_eq!(cache.sync(&rows()).await.unwrap(), SyncStatus::Updated);
        assert_eq!(cache.sync(&rows()).await.unwrap(), SyncStatus::Unchanged);
    }

    #[tokio::test]
    async fn test_any_change_rewrites() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().join("c.csv"));
        cache.sync(&rows()).await.unwrap();

        let mut changed = rows();
        changed[1].amount = Some(Decimal::from_str("2.51").unwrap());
        assert_eq!(cache.sync(&changed).await.unwrap(), SyncStatus::Updated);
        assert_eq!(cache.sync(&changed).await.unwrap(), SyncStatus::Unchanged);
    }

    #[tokio::test]
    async fn test_order_matters() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().join("c.csv"));
        cache.sync(&rows()).await.unwrap();
        let mut reversed = rows();
        reversed.reverse();
        assert_eq!(cache.sync(&reversed).await.unwrap(), SyncStatus::Updated);
    }

    #[tokio::test]
    async fn test_equal_values_with_different_scale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.csv");
        std::fs::write(
            &path,
            "Concepto,Tipo,Fecha,Importe,Mes\nNómina,Ingreso,2024-01-01,1000.0,2024-01\n",
        )
        .unwrap();
        let cache = Cache::new(&path);
        let fresh = vec![row("Nómina", "Ingreso", "2024-01-01", Some("1000"))];
        assert_eq!(cache.sync(&fresh).await.unwrap(), SyncStatus::Unchanged);
    }

    #[tokio::test]
    async fn test_malformed_cache_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.csv");
        std::fs::write(&path, "something,else\n1,2\n").unwrap();
        let cache = Cache::new(&path);
        assert_eq!(cache.sync(&rows()).await.unwrap(), SyncStatus::Updated);
        assert_eq!(cache.read_records().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_rows_still_write_header() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().join("nested").join("c.csv"));
        assert_eq!(cache.sync(&[]).await.unwrap(), SyncStatus::Updated);
        let text = std::fs::read_to_string(cache.path()).unwrap();
        assert_eq!(text, "Concepto,Tipo,Fecha,Importe,Mes\n");
        assert_eq!(cache.sync(&[]).await.unwrap(), SyncStatus::Unchanged);
    }

    #[tokio::test]
    async fn test_written_format() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().join("c.csv"));
        cache.sync(&rows()).await.unwrap();
        let text = std::fs::read_to_string(cache.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Concepto,Tipo,Fecha,Importe,Mes");
        assert_eq!(lines[1], "Nómina,Ingreso,2024-01-01,1000,2024-01");
        assert_eq!(lines[2], "\"Café, con leche\",Gasto,2024-01-02,2.5,2024-01");
        assert_eq!(lines[3], ",,,,");
    }

    #[tokio::test]
    async fn test_read_missing() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().join("absent.csv"));
        let err = cache.read_records().await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::CacheMissing);
    }

    #[test]
    fn test_record_amount() {
        let mut r = CacheRecord {
            amount: " 12.50 ".into(),
            ..CacheRecord::default()
        };
        assert_eq!(r.amount(), Some(Decimal::from_str("12.5").unwrap()));
        r.amount = "n/a".into();
        assert_eq!(r.amount(), None);
        r.amount = String::new();
        assert_eq!(r.amount(), None);
    }
}
