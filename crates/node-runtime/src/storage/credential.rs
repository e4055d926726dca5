//! # Private Validator
//!
//! Ed25519 signing credential plus the last height/round/step it signed,
//! persisted as hex-encoded JSON.

use std::path::PathBuf;

use ed25519_dalek::{Signer, SigningKey};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{Address, PublicKey, Validator};
use thiserror::Error;
use tracing::{debug, info};

use super::StorageError;

/// Voting power given to the validator of a generated dev genesis.
pub const DEFAULT_VOTING_POWER: u64 = 10;

/// Refusal to sign.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignError {
    #[error("height/round/step regression: last signed {last:?}, requested {requested:?}")]
    Regression {
        last: (u64, u32, u8),
        requested: (u64, u32, u8),
    },
}

/// Local signing identity.
pub struct PrivValidator {
    signing_key: SigningKey,
    last_height: u64,
    last_round: u32,
    last_step: u8,
}

impl PrivValidator {
    /// Fresh random key, nothing signed yet.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_key(SigningKey::generate(&mut rand::thread_rng()))
    }

    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::from_key(SigningKey::from_bytes(&seed))
    }

    fn from_key(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            last_height: 0,
            last_round: 0,
            last_step: 0,
        }
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.signing_key.verifying_key().to_bytes()
    }

    /// First 20 bytes of the SHA-256 of the public key.
    #[must_use]
    pub fn address(&self) -> Address {
        let digest = Sha256::digest(self.public_key());
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest[..20]);
        address
    }

    /// Validator entry for a genesis doc.
    #[must_use]
    pub fn to_validator(&self, voting_power: u64) -> Validator {
        Validator {
            public_key: self.public_key(),
            voting_power,
        }
    }

    #[must_use]
    pub fn last_signed(&self) -> (u64, u32, u8) {
        (self.last_height, self.last_round, self.last_step)
    }

    /// Sign `message` at `(height, round, step)`.
    ///
    /// Signing strictly below the last signed position is refused. Repeating
    /// the same position is allowed.
    pub fn sign(&mut self, height: u64, round: u32, step: u8, message: &[u8]) -> Result<[u8; 64], SignError> {
        let requested = (height, round, step);
        let last = self.last_signed();
        if requested < last {
            return Err(SignError::Regression { last, requested });
        }
        self.last_height = height;
        self.last_round = round;
        self.last_step = step;
        debug!(height, round, step, "Signed");
        Ok(self.signing_key.sign(message).to_bytes())
    }

    fn to_file(&self) -> PrivValidatorFile {
        PrivValidatorFile {
            address: hex::encode(self.address()),
            pub_key: hex::encode(self.public_key()),
            priv_key: hex::encode(self.signing_key.to_bytes()),
            last_height: self.last_height,
            last_round: self.last_round,
            last_step: self.last_step,
        }
    }

    fn from_file(file: &PrivValidatorFile) -> Result<Self, StorageError> {
        let bytes = hex::decode(&file.priv_key)
            .map_err(|e| StorageError::Corrupt(format!("priv_key: {e}")))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StorageError::Corrupt("priv_key: expected 32 bytes".into()))?;
        let mut validator = Self::from_seed(seed);
        if hex::encode(validator.public_key()) != file.pub_key {
            return Err(StorageError::Corrupt("pub_key does not match priv_key".into()));
        }
        validator.last_height = file.last_height;
        validator.last_round = file.last_round;
        validator.last_step = file.last_step;
        Ok(validator)
    }
}

impl std::fmt::Debug for PrivValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivValidator")
            .field("address", &hex::encode(self.address()))
            .field("last_height", &self.last_height)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PrivValidatorFile {
    address: String,
    pub_key: String,
    priv_key: String,
    last_height: u64,
    last_round: u32,
    last_step: u8,
}

/// Persistence for the signing credential.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<PrivValidator>, StorageError>;
    fn save(&self, validator: &PrivValidator) -> Result<(), StorageError>;
}

/// JSON file credential store.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<PrivValidator>, StorageError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: PrivValidatorFile = serde_json::from_slice(&bytes)?;
        PrivValidator::from_file(&file).map(Some)
    }

    fn save(&self, validator: &PrivValidator) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&validator.to_file())?)?;
        info!(path = %self.path.display(), "Private validator saved");
        Ok(())
    }
}

/// In-memory credential store for tests and ephemeral nodes.
#[derive(Default)]
pub struct MemoryCredentialStore {
    saved: Mutex<Option<[u8; 32]>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<PrivValidator>, StorageError> {
        Ok(self.saved.lock().map(PrivValidator::from_seed))
    }

    fn save(&self, validator: &PrivValidator) -> Result<(), StorageError> {
        *self.saved.lock() = Some(validator.signing_key.to_bytes());
        Ok(())
    }
}

/// Load the stored credential or generate and persist a new one.
pub fn load_or_generate(store: &dyn CredentialStore) -> Result<PrivValidator, StorageError> {
    if let Some(validator) = store.load()? {
        info!(address = %hex::encode(validator.address()), "Loaded private validator");
        return Ok(validator);
    }
    let validator = PrivValidator::generate();
    store.save(&validator)?;
    info!(address = %hex::encode(validator.address()), "Generated private validator");
    Ok(validator)
}
