use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Error, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its secrets subdirectory and:
/// - Creates an initial `config.json` file holding `database_id` along with default settings
/// - Stores `token`, when given, in the secrets directory with owner-only permissions.
///
/// # Arguments
/// - `finanzas_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/finanzas`
/// - `database_id` - The id of the Notion database that holds the finance records.
/// - `token` - A Notion integration token. When it is not given here it must be supplied later
///   with `--token` or `NOTION_TOKEN`.
///
/// # Errors
/// - Returns an error if `database_id` is blank or any file operations fail.
pub async fn init(finanzas_home: &Path, database_id: &str, token: Option<&str>) -> Result<Out<()>> {
    let database_id = database_id.trim();
    if database_id.is_empty() {
        return Err(Error::msg(
            ErrorType::Config,
            "Missing Notion database id: pass --database-id or set NOTION_DATABASE_ID",
        ));
    }
    let config = Config::create(finanzas_home, database_id, token)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    let message = if token.is_some() {
        format!(
            "Successfully created the finanzas directory at {} and stored the token",
            config.root().display()
        )
    } else {
        format!(
            "Successfully created the finanzas directory at {}, supply the token with --token or \
            NOTION_TOKEN",
            config.root().display()
        )
    };
    Ok(message.into())
}
