use anyhow::Result;
use clap::{Parser, Subcommand};
use common::{init_structured_logging, LoggingConfig, OperationTimer};

mod commands;

use commands::{CoerceArgs, GetArgs, ParametersArgs, ShowArgs};

#[derive(Parser)]
#[command(name = "confbind")]
#[command(about = "Inspect configuration trees and try out coercions")]
#[command(version)]
struct Cli {
    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Write logs to stderr as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a configuration file as a flattened key/value tree
    Show(ShowArgs),
    /// Print the raw value stored at a key
    Get(GetArgs),
    /// Coerce the section at a key into a named type
    Coerce(CoerceArgs),
    /// List the deferred bindings built from a section
    Parameters(ParametersArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Show(_) => "show",
            Commands::Get(_) => "get",
            Commands::Coerce(_) => "coerce",
            Commands::Parameters(_) => "parameters",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = LoggingConfig::default()
        .with_level_str(&cli.log_level)?
        .json(cli.json_logs);
    init_structured_logging(logging)?;

    let timer = OperationTimer::new(cli.command.name());
    let result = match &cli.command {
        Commands::Show(args) => args.execute(),
        Commands::Get(args) => args.execute(),
        Commands::Coerce(args) => args.execute(),
        Commands::Parameters(args) => args.execute(),
    };
    timer.finish_with_result(result)
}
