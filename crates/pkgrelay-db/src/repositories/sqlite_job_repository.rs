//! `SQLite` implementation of the `JobRepositoryPort` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use pkgrelay_core::{
    AssetRequest, FailureReason, Job, JobId, JobRepositoryPort, JobState, RepositoryError,
};

/// `SQLite` implementation of the `JobRepositoryPort` trait.
///
/// Persists the relay queue so jobs survive restarts. Queue order is kept
/// in the `seq` column, which is bumped every time a job is upserted.
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    /// Create a new `SQLite` job repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool (for testing only).
    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl JobRepositoryPort for SqliteJobRepository {
    async fn upsert(&self, job: &Job) -> Result<(), RepositoryError> {
        let last_error = encode_failure(job.last_error.as_ref())?;

        sqlx::query(
            r#"
            INSERT INTO relay_jobs (
                id, asset_id, version, variant, channel, state,
                attempts, last_error, created_at, updated_at, seq
            ) VALUES (
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM relay_jobs)
            )
            ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                attempts = excluded.attempts,
                last_error = excluded.last_error,
                updated_at = excluded.updated_at,
                seq = excluded.seq
            "#,
        )
        .bind(job.id.to_string())
        .bind(&job.request.asset_id)
        .bind(&job.request.version)
        .bind(&job.request.variant)
        .bind(&job.request.channel)
        .bind(job.state.as_str())
        .bind(i64::from(job.attempts))
        .bind(&last_error)
        .bind(job.created_at.timestamp_millis())
        .bind(job.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn update_state(&self, job: &Job) -> Result<(), RepositoryError> {
        let last_error = encode_failure(job.last_error.as_ref())?;
        let id_str = job.id.to_string();

        let result = sqlx::query(
            r#"
            UPDATE relay_jobs
            SET state = ?, attempts = ?, last_error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(job.state.as_str())
        .bind(i64::from(job.attempts))
        .bind(&last_error)
        .bind(job.updated_at.timestamp_millis())
        .bind(&id_str)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Job with ID '{id_str}'")));
        }

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Job>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, asset_id, version, variant, channel, state,
                   attempts, last_error, created_at, updated_at
            FROM relay_jobs
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        rows.iter().map(row_to_job).collect()
    }

    async fn remove(&self, id: &JobId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM relay_jobs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn clear_terminal(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM relay_jobs WHERE state IN ('succeeded', 'failed')
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn prune_terminal(&self, older_than_days: u32) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(older_than_days));

        let result = sqlx::query(
            r#"
            DELETE FROM relay_jobs
            WHERE state IN ('succeeded', 'failed')
            AND updated_at < ?
            "#,
        )
        .bind(cutoff.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

fn encode_failure(reason: Option<&FailureReason>) -> Result<Option<String>, RepositoryError> {
    reason
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Convert a database row to a `Job`.
fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<Job, RepositoryError> {
    use sqlx::Row;

    let id_str: String = row.try_get("id").map_err(map_column_error)?;
    let asset_id: String = row.try_get("asset_id").map_err(map_column_error)?;
    let version: String = row.try_get("version").map_err(map_column_error)?;
    let variant: String = row.try_get("variant").map_err(map_column_error)?;
    let channel: String = row.try_get("channel").map_err(map_column_error)?;
    let state_str: String = row.try_get("state").map_err(map_column_error)?;
    let attempts: i64 = row.try_get("attempts").map_err(map_column_error)?;
    let last_error_json: Option<String> = row.try_get("last_error").map_err(map_column_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_column_error)?;
    let updated_at: i64 = row.try_get("updated_at").map_err(map_column_error)?;

    let id = JobId::parse(&id_str)
        .map_err(|e| RepositoryError::Serialization(format!("Invalid job id '{id_str}': {e}")))?;

    let state = JobState::parse(&state_str).ok_or_else(|| {
        RepositoryError::Serialization(format!("Unknown job state '{state_str}' for {id_str}"))
    })?;

    let last_error = last_error_json
        .map(|json| serde_json::from_str::<FailureReason>(&json))
        .transpose()
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    Ok(Job {
        id,
        request: AssetRequest::new(asset_id, version, variant, channel),
        state,
        attempts: u32::try_from(attempts).unwrap_or(0),
        last_error,
        created_at: millis_to_datetime(created_at)?,
        updated_at: millis_to_datetime(updated_at)?,
    })
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| RepositoryError::Serialization(format!("Invalid timestamp {millis}")))
}

fn map_column_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(format!("Column read error: {e}"))
}

fn map_write_error(e: sqlx::Error) -> RepositoryError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => RepositoryError::Constraint(db.to_string()),
        _ => RepositoryError::Storage(e.to_string()),
    }
}
