use catrec_core::config::HubConfig;
use catrec_core::error::CatrecError;
use catrec_core::models::credentials::BasicCredentials;
use tracing::debug;

/// Environment variable that overrides the keychain hub password.
pub const HUB_PASSWORD_ENV: &str = "CATREC_HUB_PASSWORD";

/// Trait for credential storage backends.
pub trait CredentialStore: Send + Sync {
    /// Store a secret under the given key.
    fn store(&self, key: &str, secret: &str) -> Result<(), CatrecError>;

    /// Retrieve a secret by key.
    fn get(&self, key: &str) -> Result<Option<String>, CatrecError>;

    /// Delete a stored secret.
    fn delete(&self, key: &str) -> Result<(), CatrecError>;
}

/// OS keychain-backed credential store using the `keyring` crate.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: "catrec".to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, CatrecError> {
        keyring::Entry::new(&self.service, key).map_err(|e| CatrecError::CredentialError {
            message: e.to_string(),
        })
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn store(&self, key: &str, secret: &str) -> Result<(), CatrecError> {
        self.entry(key)?
            .set_password(secret)
            .map_err(|e| CatrecError::CredentialError {
                message: e.to_string(),
            })
    }

    fn get(&self, key: &str) -> Result<Option<String>, CatrecError> {
        match self.entry(key)?.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CatrecError::CredentialError {
                message: e.to_string(),
            }),
        }
    }

    fn delete(&self, key: &str) -> Result<(), CatrecError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CatrecError::CredentialError {
                message: e.to_string(),
            }),
        }
    }
}

/// In-memory credential store for testing.
pub struct MemoryStore {
    store: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            store: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, std::collections::HashMap<String, String>>, CatrecError>
    {
        self.store.lock().map_err(|_| CatrecError::CredentialError {
            message: "memory store lock poisoned".into(),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryStore {
    fn store(&self, key: &str, secret: &str) -> Result<(), CatrecError> {
        self.lock()?.insert(key.to_string(), secret.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, CatrecError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), CatrecError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Resolve hub credentials from [`HUB_PASSWORD_ENV`] or the credential store.
///
/// Fails with [`CatrecError::Config`] when the username or password is
/// missing, so a run aborts before the first chunk.
pub fn resolve_hub_credentials(
    store: &dyn CredentialStore,
    hub: &HubConfig,
) -> Result<BasicCredentials, CatrecError> {
    resolve_with_env(store, hub, std::env::var(HUB_PASSWORD_ENV).ok())
}

fn resolve_with_env(
    store: &dyn CredentialStore,
    hub: &HubConfig,
    env_password: Option<String>,
) -> Result<BasicCredentials, CatrecError> {
    if hub.username.trim().is_empty() {
        return Err(CatrecError::Config {
            message: "hub.username is not set".into(),
        });
    }

    let password = match env_password.filter(|p| !p.is_empty()) {
        Some(pw) => {
            debug!("using hub password from {HUB_PASSWORD_ENV}");
            pw
        }
        None => store.get(&hub.credential_key)?.ok_or_else(|| CatrecError::Config {
            message: format!(
                "no hub password: set {HUB_PASSWORD_ENV} or run `catrec auth set`"
            ),
        })?,
    };

    Ok(BasicCredentials::new(hub.username.clone(), password))
}
