//! Weft CLI: compile intents and run their action DAGs.

use clap::Parser;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "weft=info";

#[derive(Parser, Debug)]
#[command(
    name = "weft",
    version,
    about = "Compile declarative intents into action DAGs and run them with bounded retries and an append-only trace"
)]
struct Cli {
    #[command(subcommand)]
    command: weft::cli::Commands,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("WEFT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    if let Err(e) = weft::cli::dispatch(cli.command).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
