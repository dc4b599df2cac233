//! Implements the `Source` trait using in-memory pages for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without talking to Notion.

use crate::api::{Page, Source};
use crate::error::ErrorType;
use crate::model::RawValue;
use crate::{Error, Result};
use serde_json::json;
use uuid::Uuid;

const SEED_PAGE_SIZE: usize = 4;

/// An implementation of the `Source` trait that does not use Notion. It serves a fixed list of
/// pages and remembers which cursors it was asked for.
pub struct TestSource {
    pages: Vec<Page>,
    requests: Vec<Option<String>>,
}

impl TestSource {
    /// Serves `pages` in order. The first request must carry no cursor, each following request
    /// the `next_cursor` of the page before it.
    pub fn from_pages(pages: Vec<Page>) -> Self {
        Self {
            pages,
            requests: Vec::new(),
        }
    }

    /// Splits `records` into pages of `page_size`, chained by random cursors the way Notion does.
    pub fn from_records(records: Vec<serde_json::Value>, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let records: Vec<RawValue> = records.into_iter().map(RawValue::from).collect();
        let chunks: Vec<Vec<RawValue>> = records.chunks(page_size).map(|c| c.to_vec()).collect();
        let count = chunks.len();
        let mut pages: Vec<Page> = chunks
            .into_iter()
            .enumerate()
            .map(|(ix, results)| {
                let has_more = ix + 1 < count;
                Page {
                    results,
                    has_more,
                    next_cursor: has_more.then(|| Uuid::new_v4().to_string()),
                }
            })
            .collect();
        if pages.is_empty() {
            pages.push(Page::default());
        }
        Self::from_pages(pages)
    }

    /// The cursors that were requested, in order.
    pub fn requests(&self) -> &[Option<String>] {
        &self.requests
    }

    fn page_index(&self, cursor: Option<&str>) -> Option<usize> {
        match cursor {
            None => Some(0),
            Some(c) => self
                .pages
                .iter()
                .position(|p| p.next_cursor.as_deref() == Some(c))
                .map(|ix| ix + 1),
        }
    }
}

#[async_trait::async_trait]
impl Source for TestSource {
    async fn query(&mut self, data_source_id: &str, cursor: Option<&str>) -> Result<Page> {
        self.requests.push(cursor.map(str::to_string));
        if data_source_id.trim().is_empty() {
            return Err(Error::msg(
                ErrorType::Authentication,
                "Could not find a database with an empty id",
            ));
        }
        self.page_index(cursor)
            .and_then(|ix| self.pages.get(ix))
            .cloned()
            .ok_or_else(|| {
                Error::msg(
                    ErrorType::Remote,
                    format!("Unknown start_cursor {cursor:?}"),
                )
            })
    }
}

impl Default for TestSource {
    /// Loads seed data from this module.
    fn default() -> Self {
        Self::from_records(seed_records(), SEED_PAGE_SIZE)
    }
}

/// Builds a Notion page object with the properties of the finance database.
pub(crate) fn notion_page(
    concept: &str,
    category: &str,
    date: &str,
    amount: Option<f64>,
) -> serde_json::Value {
    json!({
        "object": "page",
        "id": Uuid::new_v4().to_string(),
        "properties": {
            "Concepto": {"id": "title", "type": "title", "title": [
                {"type": "text", "text": {"content": concept}, "plain_text": concept}
            ]},
            "Tipo": {
                "id": "tipo",
                "type": "select",
                "select": {"name": category, "color": "green"}
            },
            "Fecha": {"id": "fecha", "type": "date", "date": {"start": date, "end": null}},
            "Importe (€)": {"id": "importe", "type": "number", "number": amount},
            "Mes": {"id": "mes", "type": "rich_text", "rich_text": []}
        }
    })
}

/// Seed records, two months of a modest budget.
fn seed_records() -> Vec<serde_json::Value> {
    vec![
        notion_page("Nómina", "Ingreso", "2025-09-01", Some(1850.0)),
        notion_page("Alquiler", "Gasto", "2025-09-02", Some(650.0)),
        notion_page("Supermercado", "Gasto", "2025-09-06", Some(84.35)),
        notion_page("Fondo indexado", "Inversión", "2025-09-10", Some(115.0)),
        notion_page("Hucha Erasmus", "Ahorro", "2025-09-15", Some(300.0)),
        notion_page("Cena", "Gasto", "2025-09-20", Some(42.8)),
        notion_page("Nómina", "Ingreso", "2025-10-01", Some(1850.0)),
        notion_page("Alquiler", "Gasto", "2025-10-02", Some(650.0)),
        notion_page("Abono transporte", "Gasto", "2025-10-03", Some(20.0)),
        notion_page("Fondo indexado", "Inversión", "2025-10-10", Some(100.0)),
        notion_page("Hucha Erasmus", "Ahorro", "2025-10-15", Some(250.0)),
    ]
}
