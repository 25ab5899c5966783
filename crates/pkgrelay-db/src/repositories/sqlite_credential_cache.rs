//! `SQLite` implementation of the `CredentialCachePort` trait.
//!
//! Tokens are sealed with [`TokenCipher`] before they touch the database;
//! only the scope and issue time are stored in the clear.

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::SqlitePool;

use pkgrelay_core::{Credential, CredentialCachePort, CredentialDomain, RepositoryError};

use crate::cipher::TokenCipher;

/// `SQLite` implementation of the `CredentialCachePort` trait.
pub struct SqliteCredentialCache {
    pool: SqlitePool,
    cipher: TokenCipher,
}

impl SqliteCredentialCache {
    /// Create a cache that seals tokens with `cipher`.
    pub fn new(pool: SqlitePool, cipher: TokenCipher) -> Self {
        Self { pool, cipher }
    }
}

#[async_trait]
impl CredentialCachePort for SqliteCredentialCache {
    async fn load(&self, domain: CredentialDomain) -> Result<Option<Credential>, RepositoryError> {
        use sqlx::Row;

        let row = sqlx::query(
            r#"
            SELECT sealed_token, scope, issued_at
            FROM credential_cache
            WHERE domain = ?
            "#,
        )
        .bind(domain.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sealed: String = row.try_get("sealed_token").map_err(map_column_error)?;
        let scope: String = row.try_get("scope").map_err(map_column_error)?;
        let issued_at: i64 = row.try_get("issued_at").map_err(map_column_error)?;

        let token = self.cipher.open(&sealed).map_err(|e| {
            RepositoryError::Serialization(format!("Cached {domain} credential unreadable: {e}"))
        })?;
        let issued_at = DateTime::from_timestamp_millis(issued_at).ok_or_else(|| {
            RepositoryError::Serialization(format!("Invalid timestamp {issued_at}"))
        })?;

        Ok(Some(Credential::issued(token, scope, issued_at)))
    }

    async fn save(
        &self,
        domain: CredentialDomain,
        credential: &Credential,
    ) -> Result<(), RepositoryError> {
        let sealed = self
            .cipher
            .seal(&credential.token)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO credential_cache (domain, sealed_token, scope, issued_at, updated_at)
            VALUES (?, ?, ?, ?, datetime('now'))
            ON CONFLICT(domain) DO UPDATE SET
                sealed_token = excluded.sealed_token,
                scope = excluded.scope,
                issued_at = excluded.issued_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(domain.as_str())
        .bind(&sealed)
        .bind(&credential.scope)
        .bind(credential.issued_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn clear(&self, domain: CredentialDomain) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM credential_cache WHERE domain = ?")
            .bind(domain.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(())
    }
}

fn map_column_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(format!("Column read error: {e}"))
}
