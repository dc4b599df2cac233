use crate::api::Mode;
use crate::args::OutputFormat;
use crate::cache::{Cache, SyncStatus};
use crate::commands::sync::sync_cache;
use crate::commands::Out;
use crate::dataset::{Dataset, Entry, Filter};
use crate::error::ErrorType;
use crate::model::{Amount, Category};
use crate::views::{
    self, BalancePoint, MonthDistribution, PeriodCategoryTotal, Summary, TargetPoint,
};
use crate::{Config, Error, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use tracing::{debug, warn};

/// Everything the dashboard shows, computed from the filtered dataset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    /// `None` when the report was built from the cache without syncing.
    pub sync_status: Option<SyncStatus>,
    /// Every category in the cache, whatever the filter, in the order first seen.
    pub categories: Vec<Category>,
    /// Every period in the cache, whatever the filter, in the order first seen.
    pub periods: Vec<String>,
    pub summary: Summary,
    pub savings_goal_target: Decimal,
    pub monthly_by_category: Vec<PeriodCategoryTotal>,
    pub cumulative_balance: Vec<BalancePoint>,
    pub investment_vs_target: Vec<TargetPoint>,
    pub month_distribution: MonthDistribution,
    pub detail: Vec<Entry>,
}

impl Report {
    pub fn build(
        dataset: &Dataset,
        filter: &Filter,
        config: &Config,
        sync_status: Option<SyncStatus>,
    ) -> Self {
        let selected = dataset.filter(filter);
        debug!(
            "{} of {} entries selected for the report",
            selected.len(),
            dataset.len()
        );
        Self {
            sync_status,
            categories: dataset.categories(),
            periods: dataset.periods(),
            summary: views::summary(&selected),
            savings_goal_target: config.savings_goal_target(),
            monthly_by_category: views::monthly_by_category(&selected),
            cumulative_balance: views::cumulative_balance(&selected),
            investment_vs_target: views::investment_vs_target(
                &selected,
                config.investment_target(),
            ),
            month_distribution: views::month_distribution(&selected),
            detail: views::detail(&selected),
        }
    }

    /// Renders the report for stdout.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| Error::new(ErrorType::Internal, e)),
            OutputFormat::Table => Ok(Table(self).to_string()),
        }
    }
}

/// Syncs the cache (unless `offline`), loads it and computes the report for the entries that pass
/// `filter`. When there is no cache to read the report is empty rather than an error.
///
/// # Errors
/// Any error of `sync` when not `offline`, and `Cache` errors when the cache cannot be read.
pub async fn report(
    config: &Config,
    mode: Mode,
    offline: bool,
    filter: &Filter,
) -> Result<Out<Report>> {
    let sync_status = if offline {
        None
    } else {
        Some(sync_cache(config, mode).await?.0)
    };

    let cache = Cache::new(config.cache_path());
    let dataset = match Dataset::load(&cache).await {
        Ok(dataset) => dataset,
        Err(e) if e.error_type() == ErrorType::CacheMissing => {
            warn!("{e}");
            let report = Report {
                sync_status,
                savings_goal_target: config.savings_goal_target(),
                ..Report::default()
            };
            return Ok(Out::new(
                "No cached data yet, run 'finanzas sync' first",
                report,
            ));
        }
        Err(e) => return Err(e),
    };

    let report = Report::build(&dataset, filter, config, sync_status);
    let message = format!(
        "Report built from {} of {} entries",
        report.detail.len(),
        dataset.len()
    );
    Ok(Out::new(message, report))
}

/// The plain text rendering of a `Report`.
struct Table<'a>(&'a Report);

impl Display for Table<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let r = self.0;
        let s = &r.summary;

        writeln!(f, "Resumen")?;
        for (label, value) in [
            ("Ingresos", s.ingresos),
            ("Gastos", s.gastos),
            ("Ahorro", s.ahorro),
            ("Inversión", s.inversion),
            ("Corriente", s.corriente),
        ] {
            writeln!(f, "  {label:<18}{:>16}", money(value))?;
        }
        writeln!(
            f,
            "  {:<18}{:>16}",
            "Objetivo ahorro",
            money(r.savings_goal_target)
        )?;

        writeln!(f, "\nPor mes y categoría")?;
        for t in &r.monthly_by_category {
            writeln!(
                f,
                "  {:<9}{:<12}{:>16}",
                t.period,
                t.category.as_str(),
                money(t.amount)
            )?;
        }

        writeln!(f, "\nSaldo acumulado")?;
        for p in &r.cumulative_balance {
            writeln!(
                f,
                "  {:<12}{:<28}{:>16}",
                date(p.date),
                p.concept,
                money(p.balance)
            )?;
        }

        writeln!(f, "\nInversión vs objetivo")?;
        for p in &r.investment_vs_target {
            writeln!(
                f,
                "  {:<9}{:>16}{:>16}",
                p.period,
                money(p.invested),
                money(p.target)
            )?;
        }

        match &r.month_distribution.period {
            Some(period) => writeln!(f, "\nDistribución {period}")?,
            None => writeln!(f, "\nDistribución")?,
        }
        for slice in &r.month_distribution.slices {
            writeln!(
                f,
                "  {:<12}{:>16}",
                slice.category.as_str(),
                money(slice.amount)
            )?;
        }

        writeln!(f, "\nDetalle")?;
        for e in &r.detail {
            let amount = e.amount.map(money).unwrap_or_default();
            writeln!(
                f,
                "  {:<12}{:<28}{:<12}{:>16}",
                date(e.date),
                e.concept,
                e.category.as_str(),
                amount
            )?;
        }
        Ok(())
    }
}

fn money(value: Decimal) -> String {
    Amount::new(value).to_string()
}

fn date(value: Option<chrono::NaiveDate>) -> String {
    value.map(|d| d.to_string()).unwrap_or_default()
}
