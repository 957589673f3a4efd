use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use xbench::cli::QueryArgs;
use xbench::core::log::init_logging;
use xbench::core::window::Period;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct QueryOpts {
    /// Look-back period: 1Y, 3Y or 5Y
    #[arg(short, long, conflicts_with = "start")]
    period: Option<Period>,

    /// First day of a custom window (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day of a custom window (YYYY-MM-DD), defaults to today
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,

    /// Instrument id to include; repeat for several. Defaults to all
    #[arg(short, long = "instrument")]
    instruments: Vec<String>,

    /// Leave the portfolio out
    #[arg(long)]
    no_portfolio: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl From<QueryOpts> for QueryArgs {
    fn from(opts: QueryOpts) -> QueryArgs {
        QueryArgs {
            period: opts.period,
            start: opts.start,
            end: opts.end,
            instruments: opts.instruments,
            no_portfolio: opts.no_portfolio,
            json: opts.json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Download daily history into the local store
    Sync {
        /// How far back to fetch: 1Y, 3Y or 5Y
        #[arg(short, long, default_value = "5Y")]
        period: Period,
    },
    /// Display accumulated returns over a window
    Returns(QueryOpts),
    /// Display aligned accumulated-return series
    Chart(QueryOpts),
}

impl From<Commands> for xbench::AppCommand {
    fn from(cmd: Commands) -> xbench::AppCommand {
        match cmd {
            Commands::Sync { period } => xbench::AppCommand::Sync { period },
            Commands::Returns(opts) => xbench::AppCommand::Returns(opts.into()),
            Commands::Chart(opts) => xbench::AppCommand::Chart(opts.into()),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => xbench::cli::setup::setup_at_path(path),
            None => xbench::cli::setup::setup(),
        },
        Some(cmd) => xbench::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
