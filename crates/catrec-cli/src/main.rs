mod commands;

use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "catrec",
    version,
    about = "Reconcile satellite product catalogs and report what is missing where"
)]
struct Cli {
    /// Log debug output (pages, retries, written files)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    commands::run(cli.command).await
}
