//! Secure in-memory provider keys and the snapshot handed to each generation run.
//!
//! ```rust
//! use aprovider::{CredentialSource, ProviderId, SecureCredentialManager};
//!
//! let manager = SecureCredentialManager::new();
//! manager
//!     .set_api_key(ProviderId::from("groq"), "gsk-test")
//!     .expect("key should be stored");
//!
//! let snapshot = manager.snapshot().expect("snapshot should load");
//! assert_eq!(snapshot.api_key(&ProviderId::from("groq")), Some("gsk-test"));
//! assert_eq!(format!("{snapshot:?}"), "CredentialSnapshot { providers: [\"groq\"] }");
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::{ProviderDescriptor, ProviderError, ProviderId};

#[derive(PartialEq, Eq)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // SAFETY: zero bytes are valid UTF-8, so the string stays well-formed.
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

/// Keys available to one run, keyed by provider id.
#[derive(Clone, Default)]
pub struct CredentialSnapshot {
    keys: HashMap<ProviderId, SecretString>,
}

impl CredentialSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, provider: impl Into<ProviderId>, key: impl Into<String>) -> Self {
        self.insert(provider, key);
        self
    }

    pub fn insert(&mut self, provider: impl Into<ProviderId>, key: impl Into<String>) {
        let secret = SecretString::new(key);
        if !secret.is_blank() {
            self.keys.insert(provider.into(), secret);
        }
    }

    pub fn api_key(&self, provider: &ProviderId) -> Option<&str> {
        self.keys.get(provider).map(SecretString::expose)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for CredentialSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers = self.keys.keys().map(ProviderId::as_str).collect::<Vec<_>>();
        providers.sort_unstable();
        f.debug_struct("CredentialSnapshot")
            .field("providers", &providers)
            .finish()
    }
}

/// Where a run gets its keys from. Queried once per run.
pub trait CredentialSource: Send + Sync {
    fn snapshot(&self) -> Result<CredentialSnapshot, ProviderError>;
}

impl CredentialSource for CredentialSnapshot {
    fn snapshot(&self) -> Result<CredentialSnapshot, ProviderError> {
        Ok(self.clone())
    }
}

#[derive(Default)]
pub struct SecureCredentialManager {
    credentials: Mutex<HashMap<ProviderId, SecretString>>,
}

impl std::fmt::Debug for SecureCredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureCredentialManager")
            .field("credentials", &"[REDACTED]")
            .finish()
    }
}

impl SecureCredentialManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_api_key(
        &self,
        provider: ProviderId,
        api_key: impl Into<String>,
    ) -> Result<(), ProviderError> {
        let api_key = SecretString::new(api_key);
        if api_key.is_blank() {
            return Err(ProviderError::configuration("api key must not be empty"));
        }

        self.credentials()?.insert(provider, api_key);
        Ok(())
    }

    pub fn has_credentials(&self, provider: &ProviderId) -> Result<bool, ProviderError> {
        Ok(self.credentials()?.contains_key(provider))
    }

    pub fn clear(&self, provider: &ProviderId) -> Result<bool, ProviderError> {
        Ok(self.credentials()?.remove(provider).is_some())
    }

    /// Loads keys from each descriptor's `credential_env` variable. Returns how many were found.
    pub fn load_from_env(&self, descriptors: &[ProviderDescriptor]) -> Result<usize, ProviderError> {
        self.load_from_env_with(descriptors, |name| std::env::var(name).ok())
    }

    /// Same as [`Self::load_from_env`] with an injectable variable lookup.
    pub fn load_from_env_with(
        &self,
        descriptors: &[ProviderDescriptor],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<usize, ProviderError> {
        let mut credentials = self.credentials()?;
        let mut loaded = 0;

        for descriptor in descriptors {
            let Some(variable) = descriptor.credential_env.as_deref() else {
                continue;
            };
            let Some(value) = lookup(variable) else {
                continue;
            };

            let secret = SecretString::new(value);
            if secret.is_blank() {
                continue;
            }

            credentials.insert(descriptor.id.clone(), secret);
            loaded += 1;
        }

        Ok(loaded)
    }

    fn credentials(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<ProviderId, SecretString>>, ProviderError> {
        self.credentials
            .lock()
            .map_err(|_| ProviderError::other("credential manager lock poisoned"))
    }
}

impl CredentialSource for SecureCredentialManager {
    fn snapshot(&self) -> Result<CredentialSnapshot, ProviderError> {
        Ok(CredentialSnapshot {
            keys: self.credentials()?.clone(),
        })
    }
}
