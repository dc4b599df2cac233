//! Loading the cache into a typed `Dataset` and filtering it.

use crate::cache::{Cache, CacheRecord};
use crate::model::{parse_date, period_of, Category};
use crate::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// One movement, with its date parsed and its signed amount derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub concept: String,
    pub category: Category,
    /// `None` when the cached date does not parse.
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    /// Always recomputed from `date`; empty when there is no date.
    pub period: String,
    /// `amount` (zero when absent) times the sign of `category`.
    pub signed_amount: Decimal,
}

impl Entry {
    pub fn new(
        concept: impl Into<String>,
        category: Category,
        date: Option<NaiveDate>,
        amount: Option<Decimal>,
    ) -> Self {
        let signed_amount = amount.unwrap_or_default() * Decimal::from(category.sign());
        Self {
            concept: concept.into(),
            period: date.map(period_of).unwrap_or_default(),
            category,
            date,
            amount,
            signed_amount,
        }
    }

    fn from_record(record: CacheRecord) -> Self {
        let date = parse_date(&record.date);
        if date.is_none() && !record.date.trim().is_empty() {
            debug!("Unparsable date '{}' treated as missing", record.date);
        }
        let amount = record.amount();
        Entry::new(
            record.concept,
            Category::from(record.category.as_str()),
            date,
            amount,
        )
    }

    /// The amount with absent values counted as zero.
    pub fn amount_or_zero(&self) -> Decimal {
        self.amount.unwrap_or_default()
    }
}

/// The rows of the cache in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dataset {
    entries: Vec<Entry>,
}

impl Dataset {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Reads the cache.
    ///
    /// # Errors
    /// `CacheMissing` when there is no cache file, `Cache` when it cannot be read or parsed.
    pub async fn load(cache: &Cache) -> Result<Self> {
        let records = cache.read_records().await?;
        let entries: Vec<Entry> = records.into_iter().map(Entry::from_record).collect();

        let unknown: BTreeSet<&str> = entries
            .iter()
            .filter(|e| !e.category.is_known())
            .map(|e| e.category.as_str())
            .collect();
        for category in unknown {
            warn!("Unknown category '{category}' does not count towards the balance");
        }

        debug!("Loaded {} entries from {}", entries.len(), cache.path().display());
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct categories in the order they first appear.
    pub fn categories(&self) -> Vec<Category> {
        distinct(self.entries.iter().map(|e| &e.category))
    }

    /// Distinct periods in the order they first appear.
    pub fn periods(&self) -> Vec<String> {
        distinct(self.entries.iter().map(|e| &e.period))
    }

    /// The entries that pass `filter`, in their original order.
    pub fn filter(&self, filter: &Filter) -> Dataset {
        Dataset {
            entries: self
                .entries
                .iter()
                .filter(|e| filter.matches(e))
                .cloned()
                .collect(),
        }
    }
}

fn distinct<'a, T>(items: impl Iterator<Item = &'a T>) -> Vec<T>
where
    T: Clone + Ord + 'a,
{
    let mut seen = BTreeSet::new();
    items
        .filter(|item| seen.insert(*item))
        .cloned()
        .collect()
}

/// A selection of categories and periods. `None` selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub categories: Option<BTreeSet<Category>>,
    pub periods: Option<BTreeSet<String>>,
}

impl Filter {
    /// Builds a filter from command line selections, where an empty list means "all".
    pub fn new<C, P>(categories: C, periods: P) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let categories: BTreeSet<Category> = categories
            .into_iter()
            .map(|c| Category::from(c.as_ref()))
            .collect();
        let periods: BTreeSet<String> = periods.into_iter().map(Into::into).collect();
        Self {
            categories: (!categories.is_empty()).then_some(categories),
            periods: (!periods.is_empty()).then_some(periods),
        }
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        let category_ok = self
            .categories
            .as_ref()
            .map_or(true, |set| set.contains(&entry.category));
        let period_ok = self
            .periods
            .as_ref()
            .map_or(true, |set| set.contains(&entry.period));
        category_ok && period_ok
    }
}
