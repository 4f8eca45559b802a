//! Persistence of access codes and their leases.
//!
//! The store is the only shared mutable state. Every method is a single
//! atomic step against it; callers never cache lease state between calls.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::access_code::{AccessCode, Lease, NewAccessCode};

pub use memory::MemoryLeaseStore;
pub use postgres::PgLeaseStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached; the operation may be retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed => Self::Unavailable(e.to_string()),
            other => Self::Database(other),
        }
    }
}

#[async_trait]
pub trait LeaseStore: Send + Sync + std::fmt::Debug {
    async fn find_code(&self, code: &str) -> Result<Option<AccessCode>, StoreError>;

    /// Installs `lease` on `code` in one conditional write.
    ///
    /// Succeeds only if the code exists, is active, and holds no lease renewed
    /// at or after `stale_before`. Returns the updated code, or `None` when the
    /// condition did not hold.
    async fn claim_if_free(
        &self,
        code: &str,
        lease: &Lease,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<AccessCode>, StoreError>;

    /// Sets `last_renewed_at` on whichever code holds `session_id`. Returns that code.
    async fn renew(&self, session_id: &str, now: DateTime<Utc>)
        -> Result<Option<String>, StoreError>;

    /// Clears the lease holding `session_id`, if any. Returns the released code.
    async fn release(&self, session_id: &str) -> Result<Option<String>, StoreError>;

    /// Inserts a new active code with no lease.
    ///
    /// Returns `None` without inserting when `referrer_code` is set but does not
    /// name an active code.
    async fn insert_code(&self, new: &NewAccessCode) -> Result<Option<AccessCode>, StoreError>;

    /// Marks a code inactive and drops its lease. Returns `None` for unknown codes.
    async fn deactivate(&self, code: &str) -> Result<Option<AccessCode>, StoreError>;

    /// Codes whose referrer is `code`, oldest first.
    async fn list_referrals(&self, code: &str) -> Result<Vec<AccessCode>, StoreError>;

    /// One round trip to check the store is reachable.
    async fn health(&self) -> Result<(), StoreError>;
}
