//! LMDB-backed persistent store.
//!
//! Uses the heed crate (Rust bindings for LMDB). The environment holds one
//! named database per [`Namespace`]; each namespace is opened on first use so
//! callers never see a "namespace absent" error.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions and serializes writers internally. Every
//! call on [`Store`] runs in its own transaction:
//! - Read transactions for `get` and `scan`
//! - Write transactions for `put` and `delete`

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use geolayer_core::GeoError;
use heed::types::{Bytes, Str};
use heed::{CompactionOption, Database, Env, EnvOpenOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to open or create the LMDB environment.
    #[error("failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a namespace database within the environment.
    #[error("failed to open namespace {namespace}: {reason}")]
    DbOpen { namespace: Namespace, reason: String },

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Stored bytes could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Value could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for GeoError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Serialization(_) | StoreError::Deserialization(_) => {
                GeoError::Internal(e.to_string())
            }
            _ => GeoError::StorageUnavailable(e.to_string()),
        }
    }
}

/// Independent key spaces inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Datasource id → layer JSON.
    Layers,
    /// API key → customer JSON.
    Apikeys,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Layers, Namespace::Apikeys];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Layers => "layers",
            Namespace::Apikeys => "apikeys",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable key-value store over an LMDB environment.
pub struct Store {
    env: Env,
    path: PathBuf,
    databases: RwLock<HashMap<Namespace, Database<Str, Bytes>>>,
}

impl Store {
    /// Open (or create) a store in `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the memory map in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(Namespace::ALL.len() as u32)
                .open(path.as_ref())
        }
        .map_err(|e| StoreError::EnvOpen(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "Opened LMDB environment");

        Ok(Self {
            env,
            path: path.as_ref().to_path_buf(),
            databases: RwLock::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle to a namespace database, creating it on first use.
    fn database(&self, namespace: Namespace) -> Result<Database<Str, Bytes>, StoreError> {
        if let Some(db) = self
            .databases
            .read()
            .map_err(|_| StoreError::Transaction("namespace table poisoned".into()))?
            .get(&namespace)
        {
            return Ok(*db);
        }

        let mut databases = self
            .databases
            .write()
            .map_err(|_| StoreError::Transaction("namespace table poisoned".into()))?;
        if let Some(db) = databases.get(&namespace) {
            return Ok(*db);
        }

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        let db: Database<Str, Bytes> = self
            .env
            .create_database(&mut wtxn, Some(namespace.as_str()))
            .map_err(|e| StoreError::DbOpen {
                namespace,
                reason: e.to_string(),
            })?;
        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        tracing::debug!(%namespace, "Created namespace");
        databases.insert(namespace, db);
        Ok(db)
    }

    /// Raw bytes stored under `key`, or `None`.
    pub fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let db = self.database(namespace)?;
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let value = db
            .get(&rtxn, key)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        Ok(value.map(<[u8]>::to_vec))
    }

    pub fn put(&self, namespace: Namespace, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let db = self.database(namespace)?;
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        db.put(&mut wtxn, key, value)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    /// Remove `key`. Returns whether it was present.
    pub fn delete(&self, namespace: Namespace, key: &str) -> Result<bool, StoreError> {
        let db = self.database(namespace)?;
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let deleted = db
            .delete(&mut wtxn, key)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        Ok(deleted)
    }

    /// Every entry of a namespace in key order.
    pub fn scan(&self, namespace: Namespace) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let db = self.database(namespace)?;
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let iter = db
            .iter(&rtxn)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let mut entries = Vec::new();
        for result in iter {
            let (key, value) = result.map_err(|e| StoreError::Transaction(e.to_string()))?;
            entries.push((key.to_string(), value.to_vec()));
        }
        Ok(entries)
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.get(namespace, key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Deserialization(format!("{}/{}: {}", namespace, key, e))),
            None => Ok(None),
        }
    }

    pub fn put_json<T: Serialize>(
        &self,
        namespace: Namespace,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.put(namespace, key, &bytes)
    }

    pub fn scan_json<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
    ) -> Result<Vec<(String, T)>, StoreError> {
        self.scan(namespace)?
            .into_iter()
            .map(|(key, bytes)| {
                serde_json::from_slice(&bytes)
                    .map(|value| (key.clone(), value))
                    .map_err(|e| {
                        StoreError::Deserialization(format!("{}/{}: {}", namespace, key, e))
                    })
            })
            .collect()
    }

    /// Write a compacted snapshot of the environment to `dest`.
    ///
    /// The snapshot is written beside `dest` and renamed into place, so an
    /// existing backup is only replaced by a complete one.
    pub fn backup<P: AsRef<Path>>(&self, dest: P) -> Result<(), StoreError> {
        let dest = dest.as_ref();
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp = dest.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        match std::fs::remove_file(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let file = self
            .env
            .copy_to_file(&tmp, CompactionOption::Enabled)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp, dest)?;
        tracing::info!(path = %dest.display(), "Store backup written");
        Ok(())
    }
}
