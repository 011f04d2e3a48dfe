mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use exercise_service::{is_worker_process, EXIT_SETUP_ERROR};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::build::BuildArgs;
use commands::validate::ValidateArgs;
use commands::worker::WorkerArgs;

#[derive(Parser, Debug)]
#[command(name = "grader")]
#[command(version)]
#[command(about = "Build the exercise index and re-grade changed exercises")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish the index and grade every changed exercise
    Build(BuildArgs),
    /// Check the index, metadata and exercise definitions without grading
    Validate(ValidateArgs),
}

impl Cli {
    fn verbose(&self) -> bool {
        match &self.command {
            Commands::Build(args) => args.verbose,
            Commands::Validate(args) => args.verbose,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Workers are this same binary, started with the sentinel set
    if is_worker_process() {
        let args = WorkerArgs::parse();
        init_tracing(args.verbose);
        let code = commands::worker::execute(args).await;
        std::process::exit(code);
    }

    let cli = Cli::parse();
    init_tracing(cli.verbose());

    let result = match cli.command {
        Commands::Build(args) => commands::build::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::error(&format!("{:#}", e));
            std::process::exit(EXIT_SETUP_ERROR);
        }
    }
}
