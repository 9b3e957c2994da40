pub mod auth;
pub mod config;
pub mod run;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Initialize and show catrec configuration
    Config {
        #[command(subcommand)]
        action: config::ConfigAction,
    },
    /// Manage the data hub password
    Auth {
        #[command(subcommand)]
        action: auth::AuthAction,
    },
    /// Compare both catalogs and write the report
    Run(run::RunArgs),
}

pub async fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Config { action } => config::run(action),
        Command::Auth { action } => auth::run(action),
        Command::Run(args) => run::run(args).await,
    }
}
