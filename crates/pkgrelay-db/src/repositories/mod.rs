//! Repository implementations using `SQLite`.
//!
//! These implementations encapsulate all SQL queries and database access.
//! The `SqlitePool` is confined to this module and never exposed through
//! the port trait signatures.

mod sqlite_credential_cache;
mod sqlite_job_repository;

pub use sqlite_credential_cache::SqliteCredentialCache;
pub use sqlite_job_repository::SqliteJobRepository;
