//! Types that represent the core data model: raw Notion records, the flat rows they are normalized
//! into, categories and amounts.
mod amount;
mod category;
mod period;
mod row;
mod value;

pub use amount::{Amount, AmountError};
pub use category::Category;
pub use period::{parse_date, period_of, period_of_str};
pub use row::NormalizedRow;
pub use value::{RawValue, Scalar};
