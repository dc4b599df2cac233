use crate::api::{self, Mode};
use crate::cache::{Cache, SyncStatus};
use crate::commands::Out;
use crate::model::NormalizedRow;
use crate::{Config, Result};
use tracing::debug;

/// Fetches every record of the configured database, normalizes it and brings the cache up to
/// date.
///
/// # Errors
/// - `Config` when the credential or database id is missing, before any request is made.
/// - `Authentication`, `Network` or `Remote` when the fetch fails. The cache is left untouched.
/// - `Cache` when the cache cannot be written.
pub async fn sync(config: &Config, mode: Mode) -> Result<Out<SyncStatus>> {
    let (status, count) = sync_cache(config, mode).await?;
    let message = match status {
        SyncStatus::Updated => format!("Cache updated with {count} rows"),
        SyncStatus::Unchanged => format!("Cache unchanged, {count} rows"),
    };
    Ok(Out::new(message, status))
}

/// Runs fetch, normalize and cache sync, returning the status and the number of rows.
pub(super) async fn sync_cache(config: &Config, mode: Mode) -> Result<(SyncStatus, usize)> {
    let data_source_id = config.data_source_id()?;
    let mut source = api::source(config, mode)?;
    debug!("Fetching database {data_source_id} in {mode:?} mode");

    let records = api::fetch_all(source.as_mut(), data_source_id, config.max_pages()).await?;
    let rows: Vec<NormalizedRow> = records.iter().map(NormalizedRow::normalize).collect();

    let cache = Cache::new(config.cache_path());
    let status = cache.sync(&rows).await?;
    Ok((status, rows.len()))
}
