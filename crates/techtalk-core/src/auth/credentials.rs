use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, CredentialBackend};

/// Fixed key the bearer credential is stored under
pub const TOKEN_KEY: &str = "token";

const SERVICE_NAME: &str = "techtalk";

/// Credential file name in the data directory
const TOKEN_FILE: &str = "token.json";

/// Opaque bearer token proving authentication to the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for the authorization header and durable storage only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Credential file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt credential file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Durable storage for the single session credential.
pub trait CredentialStorage: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, StorageError>;
    fn store(&self, credential: &Credential) -> Result<(), StorageError>;
    /// Remove the credential. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Open the storage selected by the configuration
pub fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn CredentialStorage>> {
    let storage: Arc<dyn CredentialStorage> = match config.credential_backend {
        CredentialBackend::Keyring => Arc::new(KeyringStorage),
        CredentialBackend::File => Arc::new(FileStorage::new(config.data_dir()?)),
        CredentialBackend::Memory => Arc::new(MemoryStorage::default()),
    };
    Ok(storage)
}

/// Credential kept in the OS keychain
pub struct KeyringStorage;

impl KeyringStorage {
    fn entry() -> Result<Entry, StorageError> {
        Ok(Entry::new(SERVICE_NAME, TOKEN_KEY)?)
    }
}

impl CredentialStorage for KeyringStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        match Self::entry()?.get_password() {
            Ok(token) => Ok(Some(Credential::new(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, credential: &Credential) -> Result<(), StorageError> {
        Self::entry()?.set_password(credential.expose())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    token: String,
    stored_at: DateTime<Utc>,
}

/// Credential kept as JSON in a directory on disk
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }
}

impl CredentialStorage for FileStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let file: TokenFile = serde_json::from_str(&contents)?;
        Ok(Some(Credential::new(file.token)))
    }

    fn store(&self, credential: &Credential) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let file = TokenFile {
            token: credential.expose().to_string(),
            stored_at: Utc::now(),
        };
        std::fs::write(self.token_path(), serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Process-local storage; nothing survives a restart
#[derive(Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<Credential>>,
}

impl MemoryStorage {
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }

    /// Current contents, for inspection
    pub fn peek(&self) -> Option<Credential> {
        self.slot.lock().map(|slot| slot.clone()).unwrap_or(None)
    }
}

impl CredentialStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.peek())
    }

    fn store(&self, credential: &Credential) -> Result<(), StorageError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(credential.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("secret-token");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.expose(), "secret-token");
    }

    #[test]
    fn test_file_storage_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("techtalk"));

        assert!(storage.load().unwrap().is_none());
        storage.store(&Credential::new("abc")).unwrap();
        assert_eq!(storage.load().unwrap(), Some(Credential::new("abc")));

        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
        // Clearing twice is fine
        storage.clear().unwrap();
    }

    #[test]
    fn test_file_storage_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TOKEN_FILE), "not json").unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());
        assert!(matches!(storage.load(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::default();
        assert!(storage.peek().is_none());
        storage.store(&Credential::new("t1")).unwrap();
        storage.store(&Credential::new("t2")).unwrap();
        assert_eq!(storage.load().unwrap(), Some(Credential::new("t2")));
        storage.clear().unwrap();
        assert!(storage.peek().is_none());
    }
}
