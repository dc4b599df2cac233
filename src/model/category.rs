use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The classification of a movement, as chosen in the `Tipo` select of the Notion database.
///
/// Any other select value is kept verbatim in `Other` so that it survives the round trip through
/// the cache; such rows contribute nothing to the running balance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// Income
    Ingreso,
    /// Expense
    Gasto,
    /// Savings
    Ahorro,
    /// Investment
    Inversion,
    Other(String),
}

impl Category {
    /// The four known categories, in the order the dashboard shows them.
    pub const KNOWN: [Category; 4] = [
        Category::Ingreso,
        Category::Gasto,
        Category::Ahorro,
        Category::Inversion,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Category::Ingreso => "Ingreso",
            Category::Gasto => "Gasto",
            Category::Ahorro => "Ahorro",
            Category::Inversion => "Inversión",
            Category::Other(s) => s,
        }
    }

    /// `1` for money coming into the balance, `-1` for money leaving it, `0` when unknown.
    pub fn sign(&self) -> i8 {
        match self {
            Category::Ingreso | Category::Ahorro => 1,
            Category::Gasto | Category::Inversion => -1,
            Category::Other(_) => 0,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Category::Other(_))
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        match s {
            "Ingreso" => Category::Ingreso,
            "Gasto" => Category::Gasto,
            "Ahorro" => Category::Ahorro,
            "Inversión" => Category::Inversion,
            other => Category::Other(other.to_string()),
        }
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Category::from(s))
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Category::from(s.as_str()))
    }
}
