//! Composition utilities for building `SQLite`-backed stores.
//!
//! This module is focused purely on construction and should not contain
//! any domain logic.

use std::path::Path;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::cipher::{CipherError, TokenCipher};
use crate::repositories::{SqliteCredentialCache, SqliteJobRepository};

/// Factory for creating repository instances with `SQLite` backends.
pub struct StoreFactory;

impl StoreFactory {
    /// Create a job repository from a pool.
    pub fn job_repository(pool: SqlitePool) -> Arc<SqliteJobRepository> {
        Arc::new(SqliteJobRepository::new(pool))
    }

    /// Create a credential cache, loading or creating the sealing key at
    /// `key_path`.
    pub fn credential_cache(
        pool: SqlitePool,
        key_path: &Path,
    ) -> Result<Arc<SqliteCredentialCache>, CipherError> {
        let cipher = TokenCipher::load_or_create(key_path)?;
        Ok(Arc::new(SqliteCredentialCache::new(pool, cipher)))
    }
}

/// Test database helper for integration tests.
///
/// Provides an in-memory `SQLite` database with the production schema.
#[cfg(any(test, feature = "test-utils"))]
pub struct TestDb {
    pool: SqlitePool,
}

#[cfg(any(test, feature = "test-utils"))]
impl TestDb {
    /// Create a new in-memory test database with full schema.
    pub async fn new() -> anyhow::Result<Self> {
        let pool = crate::setup::setup_test_database().await?;
        Ok(Self { pool })
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a job repository using this test database.
    pub fn job_repository(&self) -> SqliteJobRepository {
        SqliteJobRepository::new(self.pool.clone())
    }

    /// Create a credential cache with a throwaway key.
    pub fn credential_cache(&self) -> SqliteCredentialCache {
        SqliteCredentialCache::new(self.pool.clone(), TokenCipher::generate())
    }
}
