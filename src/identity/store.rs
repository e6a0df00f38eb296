use anyhow::Error;
use bincode::config::Configuration;
use bincode::{config, decode_from_slice, encode_to_vec, Decode, Encode};
use log::{debug, error};
use sled::{Db, Tree};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const DB_BIN_CONFIG: Configuration = config::standard();
const IDENTITY_TREE: &[u8] = b"identity";

/// Persistence is gone or broken. Callers degrade to an ephemeral identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageUnavailable(pub String);

impl Display for StorageUnavailable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "storage unavailable: {}", self.0)
    }
}

impl std::error::Error for StorageUnavailable {}

/// Local key/value storage holding the client identity.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageUnavailable>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageUnavailable>;
}

#[derive(Encode, Decode, PartialEq, Eq, Debug)]
struct StoredValue {
    value: String,
    /// unix seconds
    written_at: u64,
}

/// sled-backed store, one tree per client profile directory.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    values: Tree,
}

impl SledStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let db = sled::open(path).map_err(|e| Error::msg(format!("bad identity db path: {}", e)))?;
        Self::with_db(db)
    }

    pub(crate) fn with_db(db: Db) -> anyhow::Result<Self> {
        let values = db
            .open_tree(IDENTITY_TREE)
            .map_err(|_| Error::msg("failed to open tree (identity)".to_string()))?;
        Ok(Self { db, values })
    }

    /// Unix seconds of the last write of `key`.
    pub fn written_at(&self, key: &str) -> Result<Option<u64>, StorageUnavailable> {
        Ok(self.stored(key)?.map(|stored| stored.written_at))
    }

    fn stored(&self, key: &str) -> Result<Option<StoredValue>, StorageUnavailable> {
        match self.values.get(key.as_bytes()) {
            Ok(Some(data)) => match decode_from_slice::<StoredValue, _>(data.as_ref(), DB_BIN_CONFIG)
            {
                Ok((stored, _)) => Ok(Some(stored)),
                Err(e) => {
                    error!("identity db decode error: {}", e);
                    Err(StorageUnavailable(format!("corrupted value for `{}`", key)))
                }
            },
            Ok(None) => Ok(None),
            Err(e) => {
                error!("identity db query error: {}", e);
                Err(StorageUnavailable(e.to_string()))
            }
        }
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageUnavailable> {
        Ok(self.stored(key)?.map(|stored| {
            debug!("`{}` written at {}", key, stored.written_at);
            stored.value
        }))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageUnavailable> {
        let written_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let stored = StoredValue {
            value: value.to_string(),
            written_at,
        };
        let bytes = encode_to_vec(stored, DB_BIN_CONFIG).map_err(|e| {
            error!("identity encode error: {}", e);
            StorageUnavailable(e.to_string())
        })?;
        self.values.insert(key.as_bytes(), bytes).map_err(|e| {
            error!("identity db insertion error: {}", e);
            StorageUnavailable(e.to_string())
        })?;
        self.values.flush().map_err(|e| {
            error!("identity db flush error: {}", e);
            StorageUnavailable(e.to_string())
        })?;
        Ok(())
    }
}

impl Drop for SledStore {
    fn drop(&mut self) {
        let _ = self.db.flush();
    }
}

/// Process-lifetime store, also the fallback when disk storage fails.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageUnavailable> {
        let values = self
            .values
            .lock()
            .map_err(|_| StorageUnavailable("memory store poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageUnavailable> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StorageUnavailable("memory store poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
