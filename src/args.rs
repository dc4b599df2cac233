//! These structs provide the CLI interface for the finanzas CLI.

use crate::dataset::Filter;
use crate::Overrides;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// finanzas: A command-line tool for personal finance reporting.
///
/// The purpose of this program is to download your income, expenses, savings and investments
/// from a Notion database into a local CSV file and to report on them: monthly totals per
/// category, the running balance, investment against its monthly target and a detail listing.
///
/// You will need a Notion integration token with access to the database. Pass it as --token,
/// set NOTION_TOKEN, or store it with `finanzas init`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run. Pass the id of your Notion database as
    /// --database-id and, optionally, your integration token as --token. The token is stored in
    /// $FINANZAS_HOME/.secrets/notion_token, readable only by you.
    Init,
    /// Download the records from Notion and update the local cache if anything changed.
    Sync,
    /// Print the report. Syncs first unless --offline is given.
    Report(ReportArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, global = true, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where finanzas data and configuration is held. Defaults to ~/finanzas
    #[arg(long, global = true, env = "FINANZAS_HOME", default_value_t = default_finanzas_home())]
    finanzas_home: DisplayPath,

    /// The Notion integration token. Takes precedence over the stored one.
    #[arg(long, global = true, env = "NOTION_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// The id of the Notion database. Takes precedence over the one in config.json.
    #[arg(long, global = true, env = "NOTION_DATABASE_ID")]
    database_id: Option<String>,
}

impl Common {
    pub fn new(log_level: LevelFilter, finanzas_home: PathBuf) -> Self {
        Self {
            log_level,
            finanzas_home: finanzas_home.into(),
            token: None,
            database_id: None,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn finanzas_home(&self) -> &DisplayPath {
        &self.finanzas_home
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn database_id(&self) -> Option<&str> {
        self.database_id.as_deref()
    }

    /// The values that take precedence over what is stored in the home directory.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            token: self.token.clone(),
            database_id: self.database_id.clone(),
        }
    }
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

serde_plain::derive_display_from_serialize!(OutputFormat);
serde_plain::derive_fromstr_from_deserialize!(OutputFormat);

/// (Not shown): Args for the `finanzas report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    /// Report from the cache without contacting Notion.
    #[arg(long)]
    offline: bool,

    /// Only include this category. May be repeated; all categories when omitted.
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Only include this month, as YYYY-MM. May be repeated; all months when omitted.
    #[arg(long = "period")]
    periods: Vec<String>,

    /// The output format: "json" or "table"
    #[arg(long, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

impl ReportArgs {
    pub fn new(
        offline: bool,
        categories: Vec<String>,
        periods: Vec<String>,
        format: OutputFormat,
    ) -> Self {
        Self {
            offline,
            categories,
            periods,
            format,
        }
    }

    pub fn offline(&self) -> bool {
        self.offline
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn filter(&self) -> Filter {
        Filter::new(&self.categories, self.periods.iter().cloned())
    }
}

fn default_finanzas_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("finanzas"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --finanzas-home or FINANZAS_HOME instead of relying on the \
                default finanzas home directory. If you continue using the program right now, \
                you may have problems!",
            );
            PathBuf::from("finanzas")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
