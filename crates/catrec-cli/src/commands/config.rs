use clap::Subcommand;
use catrec_core::config::CatrecConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Create ~/.catrec/ with a default config
    Init,
    /// Show current configuration
    Show,
}

pub fn run(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let home = CatrecConfig::init()?;
            println!("Initialized catrec at {}", home.display());
            println!("  config: {}", CatrecConfig::config_path()?.display());
            println!("Set hub.username in the config, then run `catrec auth set`.");
            Ok(())
        }
        ConfigAction::Show => {
            let config = CatrecConfig::load()?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{toml_str}");
            Ok(())
        }
    }
}
