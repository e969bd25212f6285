//! LMDB-backed cache medium.
//!
//! Uses the heed crate (Rust bindings for LMDB) so the cache survives app
//! restarts on a memory-mapped store. One unnamed database, string keys and
//! values, a transaction per operation.

use std::path::Path;

use async_trait::async_trait;
use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};
use waymark_core::MediumError;

use crate::medium::CacheMedium;

/// Error type for LMDB medium construction and operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbMediumError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistent cache medium backed by LMDB.
///
/// # Example
///
/// ```ignore
/// let medium = LmdbMedium::new("/var/cache/waymark", 64)?;
/// medium.write("waymark:spots.all", &serialized).await?;
/// ```
pub struct LmdbMedium {
    env: Env,
    db: Database<Str, Str>,
}

impl LmdbMedium {
    /// Open (or create) an LMDB environment at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the memory map in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or database cannot be opened.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbMediumError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbMediumError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbMediumError::Transaction(e.to_string()))?;

        let db: Database<Str, Str> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbMediumError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbMediumError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    fn is_map_full(error: &heed::Error) -> bool {
        matches!(error, heed::Error::Mdb(heed::MdbError::MapFull))
    }
}

#[async_trait]
impl CacheMedium for LmdbMedium {
    async fn read(&self, key: &str) -> Result<Option<String>, MediumError> {
        let rtxn = self.env.read_txn().map_err(|e| MediumError::ReadFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let value = self
            .db
            .get(&rtxn, key)
            .map_err(|e| MediumError::ReadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        Ok(value.map(ToOwned::to_owned))
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let mut wtxn = self.env.write_txn().map_err(|e| MediumError::WriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        self.db.put(&mut wtxn, key, value).map_err(|e| {
            if Self::is_map_full(&e) {
                MediumError::QuotaExceeded {
                    key: key.to_string(),
                }
            } else {
                MediumError::WriteFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        wtxn.commit().map_err(|e| MediumError::WriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), MediumError> {
        let mut wtxn = self.env.write_txn().map_err(|e| MediumError::Backend {
            reason: e.to_string(),
        })?;

        self.db
            .delete(&mut wtxn, key)
            .map_err(|e| MediumError::Backend {
                reason: e.to_string(),
            })?;

        wtxn.commit().map_err(|e| MediumError::Backend {
            reason: e.to_string(),
        })
    }

    async fn keys(&self) -> Result<Vec<String>, MediumError> {
        let rtxn = self.env.read_txn().map_err(|e| MediumError::Backend {
            reason: e.to_string(),
        })?;

        let iter = self.db.iter(&rtxn).map_err(|e| MediumError::Backend {
            reason: e.to_string(),
        })?;

        let mut keys = Vec::new();
        for result in iter {
            match result {
                Ok((key, _)) => keys.push(key.to_owned()),
                Err(_) => continue,
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_medium() -> (LmdbMedium, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let medium = LmdbMedium::new(temp_dir.path(), 10).expect("medium creation should succeed");
        (medium, temp_dir)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (medium, _temp_dir) = create_test_medium();

        medium
            .write("waymark:spots.all", r#"{"data":[]}"#)
            .await
            .expect("write should succeed");

        let value = medium
            .read("waymark:spots.all")
            .await
            .expect("read should succeed");
        assert_eq!(value.as_deref(), Some(r#"{"data":[]}"#));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let (medium, _temp_dir) = create_test_medium();
        let value = medium.read("missing").await.expect("read should succeed");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_overwrite() {
        let (medium, _temp_dir) = create_test_medium();

        medium.write("k", "old").await.expect("write should succeed");
        medium.write("k", "new").await.expect("write should succeed");

        let value = medium.read("k").await.expect("read should succeed");
        assert_eq!(value.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_delete() {
        let (medium, _temp_dir) = create_test_medium();

        medium.write("k", "v").await.expect("write should succeed");
        medium.delete("k").await.expect("delete should succeed");

        let value = medium.read("k").await.expect("read should succeed");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_keys_survive_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");

        {
            let medium =
                LmdbMedium::new(temp_dir.path(), 10).expect("medium creation should succeed");
            medium
                .write("waymark:spots.all", "persisted")
                .await
                .expect("write should succeed");
        }

        let medium = LmdbMedium::new(temp_dir.path(), 10).expect("reopen should succeed");
        let value = medium
            .read("waymark:spots.all")
            .await
            .expect("read should succeed");
        assert_eq!(value.as_deref(), Some("persisted"));
    }

    #[tokio::test]
    async fn test_keys_lists_entries() {
        let (medium, _temp_dir) = create_test_medium();

        medium.write("a", "1").await.expect("write should succeed");
        medium.write("b", "2").await.expect("write should succeed");

        let mut keys = medium.keys().await.expect("keys should succeed");
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
