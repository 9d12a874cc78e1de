mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{GlobalArgs, RunArgs, Target};

/// A templated, YAML-driven task runner with parallel stages
#[derive(Parser, Debug)]
#[command(name = "taskmill", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single operation
    Run(RunArgs),

    /// Run every operation of a stage in parallel
    Srun(RunArgs),

    /// List operations and stages
    Ls,

    /// Write a starter taskfile
    Init,
}

/// Diagnostics go to stderr, filtered by `TASKMILL_LOG` (default `warn`)
fn init_logging() {
    let filter = EnvFilter::try_from_env("TASKMILL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => commands::run::execute(&cli.global, args, Target::Operation).await,
        Command::Srun(args) => commands::run::execute(&cli.global, args, Target::Stage).await,
        Command::Ls => commands::list::execute(&cli.global),
        Command::Init => commands::init::execute(&cli.global),
    }
}
