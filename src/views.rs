//! Derived tables consumed by the report: monthly totals per category, the running balance,
//! investment against its monthly target, the distribution of the latest month, the headline
//! totals and the detail listing.
//!
//! Every function here is pure and takes a `Dataset` that has already been filtered.

use crate::dataset::{Dataset, Entry};
use crate::model::Category;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

/// The total of one category in one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodCategoryTotal {
    pub period: String,
    pub category: Category,
    pub amount: Decimal,
}

/// The balance after one movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancePoint {
    pub date: Option<NaiveDate>,
    pub concept: String,
    pub signed_amount: Decimal,
    pub balance: Decimal,
}

/// What was invested in one period next to what should have been.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetPoint {
    pub period: String,
    pub invested: Decimal,
    pub target: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub amount: Decimal,
}

/// How the most recent period splits across categories. `period` is `None` for a dataset with no
/// dated entries, in which case there are no slices either.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthDistribution {
    pub period: Option<String>,
    pub slices: Vec<CategoryTotal>,
}

/// The headline figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub ingresos: Decimal,
    pub gastos: Decimal,
    pub ahorro: Decimal,
    pub inversion: Decimal,
    /// What is left in the current account: income minus everything that went elsewhere.
    pub corriente: Decimal,
}

/// Sums `amount` by (period, category), ordered by period then category.
pub fn monthly_by_category(dataset: &Dataset) -> Vec<PeriodCategoryTotal> {
    let mut totals: BTreeMap<(&str, &Category), Decimal> = BTreeMap::new();
    for e in dataset.entries() {
        accumulate(
            totals.entry((e.period.as_str(), &e.category)).or_default(),
            e.amount_or_zero(),
        );
    }
    totals
        .into_iter()
        .map(|((period, category), amount)| PeriodCategoryTotal {
            period: period.to_string(),
            category: category.clone(),
            amount,
        })
        .collect()
}

/// The running sum of `signed_amount` in date order. Entries on the same date keep their relative
/// order and undated entries come last.
pub fn cumulative_balance(dataset: &Dataset) -> Vec<BalancePoint> {
    let mut sorted: Vec<&Entry> = dataset.entries().iter().collect();
    sorted.sort_by(|a, b| dates_ascending(a.date, b.date));

    let mut balance = Decimal::ZERO;
    sorted
        .into_iter()
        .map(|e| {
            accumulate(&mut balance, e.signed_amount);
            BalancePoint {
                date: e.date,
                concept: e.concept.clone(),
                signed_amount: e.signed_amount,
                balance,
            }
        })
        .collect()
}

/// Investment per period, each paired with the same `target`.
pub fn investment_vs_target(dataset: &Dataset, target: Decimal) -> Vec<TargetPoint> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for e in dataset
        .entries()
        .iter()
        .filter(|e| e.category == Category::Inversion)
    {
        accumulate(totals.entry(e.period.as_str()).or_default(), e.amount_or_zero());
    }
    totals
        .into_iter()
        .map(|(period, invested)| TargetPoint {
            period: period.to_string(),
            invested,
            target,
        })
        .collect()
}

/// Totals by category for the latest period. `YYYY-MM` labels sort chronologically, so the latest
/// period is the greatest string.
pub fn month_distribution(dataset: &Dataset) -> MonthDistribution {
    let Some(latest) = dataset
        .entries()
        .iter()
        .map(|e| e.period.as_str())
        .filter(|p| !p.is_empty())
        .max()
    else {
        return MonthDistribution::default();
    };

    let mut totals: BTreeMap<&Category, Decimal> = BTreeMap::new();
    for e in dataset.entries().iter().filter(|e| e.period == latest) {
        accumulate(totals.entry(&e.category).or_default(), e.amount_or_zero());
    }
    MonthDistribution {
        period: Some(latest.to_string()),
        slices: totals
            .into_iter()
            .map(|(category, amount)| CategoryTotal {
                category: category.clone(),
                amount,
            })
            .collect(),
    }
}

pub fn summary(dataset: &Dataset) -> Summary {
    let total = |category: Category| -> Decimal {
        let mut total = Decimal::ZERO;
        for e in dataset.entries().iter().filter(|e| e.category == category) {
            accumulate(&mut total, e.amount_or_zero());
        }
        total
    };
    let ingresos = total(Category::Ingreso);
    let gastos = total(Category::Gasto);
    let ahorro = total(Category::Ahorro);
    let inversion = total(Category::Inversion);
    Summary {
        ingresos,
        gastos,
        ahorro,
        inversion,
        corriente: [gastos, ahorro, inversion]
            .into_iter()
            .fold(ingresos, |mut left, spent| {
                accumulate(&mut left, -spent);
                left
            }),
    }
}

/// The entries newest first, undated ones at the end.
pub fn detail(dataset: &Dataset) -> Vec<Entry> {
    let mut entries = dataset.entries().to_vec();
    entries.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => y.cmp(&x),
        _ => dates_ascending(a.date, b.date),
    });
    entries
}

/// Adds `amount` to `total`, holding at the largest representable value rather than overflowing.
fn accumulate(total: &mut Decimal, amount: Decimal) {
    *total = match total.checked_add(amount) {
        Some(sum) => sum,
        None => {
            warn!("A total went out of range adding {amount} and was capped");
            total.saturating_add(amount)
        }
    };
}

fn dates_ascending(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
