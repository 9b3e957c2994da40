use std::io::BufRead;

use clap::Subcommand;
use catrec_auth::{CredentialStore, KeyringStore, HUB_PASSWORD_ENV};
use catrec_core::config::CatrecConfig;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the hub password in the OS keychain
    Set {
        /// Read the password from the first line of stdin without prompting
        #[arg(long)]
        password_stdin: bool,
    },
    /// Remove the stored hub password
    Clear,
}

pub fn run(action: AuthAction) -> anyhow::Result<()> {
    let config = CatrecConfig::load()?;
    let store = KeyringStore::new();
    let key = &config.hub.credential_key;

    match action {
        AuthAction::Set { password_stdin } => {
            if config.hub.username.trim().is_empty() {
                anyhow::bail!(
                    "hub.username is not set; edit {} first",
                    CatrecConfig::config_path()?.display()
                );
            }
            if !password_stdin {
                eprint!("Enter hub password for {}: ", config.hub.username);
            }
            let mut input = String::new();
            std::io::stdin().lock().read_line(&mut input)?;
            let password = input.trim_end_matches(['\r', '\n']);
            if password.is_empty() {
                anyhow::bail!("Password cannot be empty");
            }

            store.store(key, password)?;
            println!("Password for '{}' stored in OS keychain as '{key}'", config.hub.username);
            println!("{HUB_PASSWORD_ENV} overrides it when set.");
            Ok(())
        }
        AuthAction::Clear => {
            store.delete(key)?;
            println!("Removed '{key}' from OS keychain");
            Ok(())
        }
    }
}
