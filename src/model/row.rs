use crate::model::period::period_of_str;
use crate::model::{Amount, RawValue};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Names of the Notion database properties that feed each column.
pub(crate) const CONCEPT_PROPERTY: &str = "Concepto";
pub(crate) const CATEGORY_PROPERTY: &str = "Tipo";
pub(crate) const DATE_PROPERTY: &str = "Fecha";
pub(crate) const AMOUNT_PROPERTY: &str = "Importe (€)";
pub(crate) const PERIOD_PROPERTY: &str = "Mes";

const CONCEPT_PATH: &[&str] = &["title", "plain_text"];
const CATEGORY_PATH: &[&str] = &["select", "name"];
const DATE_PATH: &[&str] = &["date", "start"];
const PERIOD_PATH: &[&str] = &["rich_text", "plain_text"];

/// A flat, typed row built from one Notion page. This is exactly what goes into the cache.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    #[serde(rename = "Concepto")]
    pub concept: String,
    /// The select value as found, which is not necessarily one of the known categories.
    #[serde(rename = "Tipo")]
    pub category: String,
    /// The start date as Notion sent it, possibly empty.
    #[serde(rename = "Fecha")]
    pub date: String,
    #[serde(rename = "Importe")]
    pub amount: Option<Decimal>,
    /// `YYYY-MM`, either supplied by the `Mes` property or derived from `date`.
    #[serde(rename = "Mes")]
    pub period: String,
}

impl NormalizedRow {
    /// Builds a row from a raw Notion page. This never fails: a property that is missing or
    /// shaped unexpectedly becomes an empty string, or `None` for the amount.
    pub fn normalize(record: &RawValue) -> Self {
        let properties = record.get("properties").unwrap_or(&RawValue::Null);
        let property = |name: &str| properties.get(name).unwrap_or(&RawValue::Null);

        let concept = property(CONCEPT_PROPERTY).traverse(CONCEPT_PATH);
        let category = property(CATEGORY_PROPERTY).traverse(CATEGORY_PATH);
        let date = property(DATE_PROPERTY).traverse(DATE_PATH);
        let amount = property(AMOUNT_PROPERTY)
            .get("number")
            .and_then(RawValue::as_number)
            .and_then(|n| match Amount::from_str(&n.to_string()) {
                Ok(a) => Some(Decimal::from(a).normalize()),
                Err(e) => {
                    warn!("Amount {n} of '{concept}' is out of range and counts as empty: {e}");
                    None
                }
            });

        let mut period = property(PERIOD_PROPERTY).traverse(PERIOD_PATH);
        if period.is_empty() && !date.is_empty() {
            period = period_of_str(&date);
        }

        Self {
            concept,
            category,
            date,
            amount,
            period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(properties: serde_json::Value) -> RawValue {
        RawValue::from(json!({ "object": "page", "properties": properties }))
    }

    #[test]
    fn test_normalize_full_record() {
        let record = page(json!({
            "Concepto": {"title": [{"plain_text": "Nómina"}]},
            "Tipo": {"select": {"name": "Ingreso"}},
            "Fecha": {"date": {"start": "2024-01-31", "end": null}},
            "Importe (€)": {"number": 1500.5},
            "Mes": {"rich_text": [{"plain_text": "2024-02"}]}
        }));
        let row = NormalizedRow::normalize(&record);
        assert_eq!(row.concept, "Nómina");
        assert_eq!(row.category, "Ingreso");
        assert_eq!(row.date, "2024-01-31");
        assert_eq!(row.amount, Some(Decimal::from_str("1500.5").unwrap()));
        // An explicit label is kept even if it disagrees with the date.
        assert_eq!(row.period, "2024-02");
    }

    #[test]
    fn test_period_derived_from_date() {
        let record = page(json!({
            "Fecha": {"date": {"start": "2024-03-15"}},
            "Mes": {"rich_text": []}
        }));
        let row = NormalizedRow::normalize(&record);
        assert_eq!(row.period, "2024-03");
    }

    #[test]
    fn test_missing_everything() {
        let row = NormalizedRow::normalize(&page(json!({})));
        assert_eq!(row, NormalizedRow::default());
    }

    #[test]
    fn test_no_properties_key() {
        let row = NormalizedRow::normalize(&RawValue::from(json!({"object": "page"})));
        assert_eq!(row, NormalizedRow::default());
    }

    #[test]
    fn test_missing_intermediate_keys() {
        let record = page(json!({
            "Concepto": {"rich_text": [{"plain_text": "wrong property type"}]},
            "Tipo": {"select": null},
            "Fecha": {"date": null},
            "Importe (€)": {"number": null}
        }));
        let row = NormalizedRow::normalize(&record);
        assert_eq!(row.concept, "");
        assert_eq!(row.category, "");
        assert_eq!(row.date, "");
        assert_eq!(row.amount, None);
        assert_eq!(row.period, "");
    }

    #[test]
    fn test_amount_must_be_a_number() {
        let record = page(json!({"Importe (€)": {"number": "12"}}));
        assert_eq!(NormalizedRow::normalize(&record).amount, None);
    }

    #[test]
    fn test_unparsable_date_gives_empty_period() {
        let record = page(json!({"Fecha": {"date": {"start": "someday"}}}));
        let row = NormalizedRow::normalize(&record);
        assert_eq!(row.date, "someday");
        assert_eq!(row.period, "");
    }

    #[test]
    fn test_integer_amount() {
        let record = page(json!({"Importe (€)": {"number": 40}}));
        assert_eq!(
            NormalizedRow::normalize(&record).amount,
            Some(Decimal::from(40))
        );
    }

    #[test]
    fn test_whole_float_amount_has_no_trailing_zero() {
        let record = page(json!({"Importe (€)": {"number": 1850.0}}));
        let amount = NormalizedRow::normalize(&record).amount.unwrap();
        assert_eq!(amount.to_string(), "1850");
    }

    #[test]
    fn test_amount_out_of_decimal_range_is_empty() {
        for number in [json!(1e29), json!(-1e30)] {
            let record = page(json!({
                "Concepto": {"title": [{"plain_text": "Lotería"}]},
                "Importe (€)": {"number": number}
            }));
            let row = NormalizedRow::normalize(&record);
            assert_eq!(row.concept, "Lotería");
            assert_eq!(row.amount, None, "{number}");
        }
    }
}
