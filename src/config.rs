//! Configuration file handling for finanzas.
//!
//! The configuration file is stored at `$FINANZAS_HOME/config.json` and contains the Notion data
//! source id, the report targets and the knobs of the remote fetch. The Notion credential is kept
//! apart from it, in `$FINANZAS_HOME/.secrets/notion_token`, or supplied on the command line.

use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Error, Result};
use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "finanzas";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CONFIG_JSON: &str = "config.json";
const TOKEN_FILE: &str = "notion_token";
const CACHE_CSV: &str = "notion_data.csv";
const API_BASE_URL: &str = "https://api.notion.com";
const INVESTMENT_TARGET: i64 = 115;
const SAVINGS_GOAL_TARGET: i64 = 4000;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 500;
const MAX_PAGES: usize = 1000;

/// Values given on the command line (or through the environment by way of clap) that take
/// precedence over what is stored in the home directory.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Overrides {
    pub token: Option<String>,
    pub database_id: Option<String>,
}

/// The `Config` object represents the configuration of the app. It is built once, at process
/// entry, from `$FINANZAS_HOME` plus any `Overrides`, and then passed by reference to whatever
/// needs it. Nothing below `main` reads the environment.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    credential: Option<String>,
    data_source_id: Option<String>,
}

impl Config {
    /// Creates the home directory, writes an initial `config.json` holding `data_source_id` and,
    /// when given, stores `token` in the secrets directory.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail.
    pub async fn create(
        dir: impl Into<PathBuf>,
        data_source_id: &str,
        token: Option<&str>,
    ) -> Result<Self> {
        Self::create_inner(dir.into(), data_source_id, token)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(dir: PathBuf, data_source_id: &str, token: Option<&str>) -> Res<Self> {
        utils::make_dir(&dir)
            .await
            .context("Unable to create the finanzas home directory")?;
        let root = utils::canonicalize(&dir).await?;
        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            data_source_id: Some(data_source_id.to_string()),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        if let Some(token) = token {
            let token_path = secrets.join(TOKEN_FILE);
            utils::write(&token_path, token.trim()).await?;
            utils::restrict_permissions(&token_path)?;
        }

        Ok(Self {
            root,
            secrets,
            config_path,
            credential: non_empty(token.map(|t| t.trim().to_string())),
            data_source_id: non_empty(Some(data_source_id.to_string())),
            config_file,
        })
    }

    /// This will
    /// - create `finanzas_home` if it is missing (the cache lives there)
    /// - load `config.json` if there is one, otherwise use defaults
    /// - read the stored credential if one was not given in `overrides`
    pub async fn load(finanzas_home: impl Into<PathBuf>, overrides: Overrides) -> Result<Self> {
        Self::load_inner(finanzas_home.into(), overrides)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(home: PathBuf, overrides: Overrides) -> Res<Self> {
        utils::make_dir(&home).await?;
        let root = utils::canonicalize(&home).await?;
        let secrets = root.join(SECRETS);
        let config_path = root.join(CONFIG_JSON);

        let config_file = if config_path.is_file() {
            ConfigFile::load(&config_path).await?
        } else {
            ConfigFile::default()
        };

        let credential = match non_empty(overrides.token) {
            Some(token) => Some(token),
            None => read_token(&secrets.join(TOKEN_FILE)).await?,
        };
        let data_source_id = non_empty(overrides.database_id)
            .or_else(|| non_empty(config_file.data_source_id.clone()));

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            credential,
            data_source_id,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    /// The bearer credential for the remote service.
    ///
    /// # Errors
    /// A `Config` error when no credential was configured.
    pub fn credential(&self) -> Result<&str> {
        self.credential.as_deref().ok_or_else(|| {
            Error::msg(
                ErrorType::Config,
                "Missing Notion token: pass --token, set NOTION_TOKEN, or run 'finanzas init'",
            )
        })
    }

    /// The identifier of the Notion database holding the records.
    ///
    /// # Errors
    /// A `Config` error when no data source id was configured.
    pub fn data_source_id(&self) -> Result<&str> {
        self.data_source_id.as_deref().ok_or_else(|| {
            Error::msg(
                ErrorType::Config,
                "Missing Notion database id: pass --database-id, set NOTION_DATABASE_ID, or run \
                'finanzas init'",
            )
        })
    }

    /// Returns the cache path; a relative `cache_file` is resolved against the home directory.
    pub fn cache_path(&self) -> PathBuf {
        let p = self.config_file.cache_file();
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }

    pub fn investment_target(&self) -> Decimal {
        self.config_file
            .investment_target
            .unwrap_or_else(|| Decimal::from(INVESTMENT_TARGET))
    }

    pub fn savings_goal_target(&self) -> Decimal {
        self.config_file
            .savings_goal_target
            .unwrap_or_else(|| Decimal::from(SAVINGS_GOAL_TARGET))
    }

    pub fn api_base_url(&self) -> &str {
        self.config_file
            .api_base_url
            .as_deref()
            .unwrap_or(API_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.config_file
                .request_timeout_secs
                .unwrap_or(REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.config_file.max_retries.unwrap_or(MAX_RETRIES)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.config_file.retry_delay_ms.unwrap_or(RETRY_DELAY_MS))
    }

    pub fn max_pages(&self) -> usize {
        self.config_file.max_pages.unwrap_or(MAX_PAGES)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "finanzas",
///   "config_version": 1,
///   "data_source_id": "1c2e4f0a9b8d4c7e8f6a5b4c3d2e1f00",
///   "investment_target": "115",
///   "savings_goal_target": "4000"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "finanzas"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The Notion database to query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_source_id: Option<String>,

    /// Monthly investment target, defaults to 115
    #[serde(default, skip_serializing_if = "Option::is_none")]
    investment_target: Option<Decimal>,

    /// Savings goal, defaults to 4000. Reported as-is, not used by any aggregation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    savings_goal_target: Option<Decimal>,

    /// Path to the CSV cache, relative to the home directory or absolute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry_delay_ms: Option<u64>,

    /// Upper bound on the number of pages fetched in one run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_pages: Option<usize>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            data_source_id: None,
            investment_target: None,
            savings_goal_target: None,
            cache_file: None,
            api_base_url: None,
            request_timeout_secs: None,
            max_retries: None,
            retry_delay_ms: None,
            max_pages: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it belongs to another app.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version <= CONFIG_VERSION,
            "Config version {} is unsupported. Is a newer version of finanzas available?",
            config.config_version
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    fn cache_file(&self) -> PathBuf {
        self.cache_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(CACHE_CSV))
    }
}

async fn read_token(path: &Path) -> Res<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let token = utils::read(path).await?;
    Ok(non_empty(Some(token.trim().to_string())))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}
