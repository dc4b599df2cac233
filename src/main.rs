use clap::Parser;
use finanzas_sync::args::{Args, Command};
use finanzas_sync::{commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let common = args.common();
    let home = common.finanzas_home().path();

    // This allows for running the program without hitting the Notion API. When
    // FINANZAS_IN_TEST_MODE is set and non-zero in length, then the mode will be Mode::Test,
    // otherwise it will be Mode::Notion.
    let mode = Mode::from_env();

    match args.command() {
        Command::Init => commands::init(
            home,
            common.database_id().unwrap_or_default(),
            common.token(),
        )
        .await?
        .print(),

        Command::Sync => {
            let config = Config::load(home, common.overrides()).await?;
            commands::sync(&config, mode).await?.print()
        }

        Command::Report(report_args) => {
            let config = Config::load(home, common.overrides()).await?;
            let out = commands::report(
                &config,
                mode,
                report_args.offline(),
                &report_args.filter(),
            )
            .await?;
            out.print();
            if let Some(report) = out.structure() {
                println!("{}", report.render(report_args.format())?);
            }
        }
    }
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for the binary and library only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
