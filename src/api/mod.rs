//! Access to the remote data source.
//!
//! The `Source` trait is the seam between the pipeline and Notion: `NotionSource` talks to the
//! real API over HTTPS and `TestSource` serves pages from memory. `fetch_all` walks the cursor
//! pagination of whichever one it is given.

mod notion;
mod test_source;

use crate::error::ErrorType;
use crate::model::RawValue;
use crate::{Config, Error, Result};
use serde::Deserialize;
use tracing::{debug, trace};

pub use notion::NotionSource;
pub use test_source::TestSource;

/// When this environment variable is set and non-empty the program runs against `TestSource`
/// instead of Notion.
pub const TEST_MODE_ENV: &str = "FINANZAS_IN_TEST_MODE";

/// Whether we are talking to Notion or to the in-memory test source.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Notion,
    Test,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(v) if !v.is_empty() => Mode::Test,
            _ => Mode::Notion,
        }
    }
}

/// One page of a database query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Page {
    pub results: Vec<RawValue>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A paginated source of raw records.
#[async_trait::async_trait]
pub trait Source {
    /// Requests the page of `data_source_id` that starts at `cursor`, or the first page when
    /// `cursor` is `None`.
    async fn query(&mut self, data_source_id: &str, cursor: Option<&str>) -> Result<Page>;
}

/// Creates the `Source` for `mode`. In `Mode::Notion` this requires a credential.
pub fn source(config: &Config, mode: Mode) -> Result<Box<dyn Source + Send>> {
    Ok(match mode {
        Mode::Notion => Box::new(NotionSource::new(config)?),
        Mode::Test => Box::new(TestSource::default()),
    })
}

/// Retrieves every record of `data_source_id`, following `next_cursor` until the source reports
/// that there is nothing more. Fails rather than loop forever if the source is still reporting
/// more pages after `max_pages` requests.
pub async fn fetch_all(
    source: &mut (dyn Source + Send),
    data_source_id: &str,
    max_pages: usize,
) -> Result<Vec<RawValue>> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        if pages >= max_pages {
            return Err(Error::msg(
                ErrorType::Remote,
                format!("Gave up after {pages} pages, the data source never reported its end"),
            ));
        }
        let page = source.query(data_source_id, cursor.as_deref()).await?;
        pages += 1;
        trace!("Page {pages} has {} records", page.results.len());
        records.extend(page.results);

        if !page.has_more {
            break;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => {
                return Err(Error::msg(
                    ErrorType::Remote,
                    "The data source reported more pages but did not send a cursor",
                ))
            }
        }
    }

    debug!("Fetched {} records in {pages} pages", records.len());
    Ok(records)
}
