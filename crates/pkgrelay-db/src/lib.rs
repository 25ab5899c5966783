//! `SQLite` persistence for pkgrelay.
//!
//! Implements the job repository and the encrypted credential cache ports
//! from `pkgrelay-core`. Nothing outside this crate sees `sqlx` types.
//!
//! | Table              | Port                  | Adapter                 |
//! |--------------------|-----------------------|-------------------------|
//! | `relay_jobs`       | `JobRepositoryPort`   | `SqliteJobRepository`   |
//! | `credential_cache` | `CredentialCachePort` | `SqliteCredentialCache` |
#![deny(unsafe_code)]

pub mod cipher;
pub mod factory;
pub mod repositories;
pub mod setup;

pub use cipher::{CipherError, TokenCipher};
pub use factory::StoreFactory;

// Re-export TestDb for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub use factory::TestDb;

pub use repositories::{SqliteCredentialCache, SqliteJobRepository};

pub use setup::setup_database;
#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
