use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{LeaseStore, StoreError};
use crate::models::access_code::{AccessCode, AccessCodeRow, Lease, NewAccessCode};

const COLUMNS: &str =
    "code, referrer_code, user_name, is_active, session_id, last_renewed_at, claim_token, created_at";

#[derive(Debug, Clone)]
pub struct PgLeaseStore {
    db: PgPool,
}

impl PgLeaseStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Connects with an acquire timeout so an unreachable database fails fast.
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
        let db = PgPoolOptions::new()
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(db))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.db).await
    }
}

#[async_trait]
impl LeaseStore for PgLeaseStore {
    async fn find_code(&self, code: &str) -> Result<Option<AccessCode>, StoreError> {
        let row = sqlx::query_as::<_, AccessCodeRow>(&format!(
            "SELECT {COLUMNS} FROM access_codes WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(AccessCode::from))
    }

    async fn claim_if_free(
        &self,
        code: &str,
        lease: &Lease,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<AccessCode>, StoreError> {
        // Concurrent updaters of the same row re-check the WHERE clause against
        // the winner's write, so only one of them matches.
        let row = sqlx::query_as::<_, AccessCodeRow>(&format!(
            "UPDATE access_codes
             SET session_id = $2, last_renewed_at = $3, claim_token = $4
             WHERE code = $1 AND is_active
               AND (session_id IS NULL OR last_renewed_at IS NULL OR last_renewed_at < $5)
             RETURNING {COLUMNS}"
        ))
        .bind(code)
        .bind(&lease.session_id)
        .bind(lease.last_renewed_at)
        .bind(&lease.claim_token)
        .bind(stale_before)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(AccessCode::from))
    }

    async fn renew(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let code = sqlx::query_scalar::<_, String>(
            "UPDATE access_codes SET last_renewed_at = $2 WHERE session_id = $1 RETURNING code",
        )
        .bind(session_id)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        Ok(code)
    }

    async fn release(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        let code = sqlx::query_scalar::<_, String>(
            "UPDATE access_codes
             SET session_id = NULL, last_renewed_at = NULL, claim_token = NULL
             WHERE session_id = $1
             RETURNING code",
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(code)
    }

    async fn insert_code(&self, new: &NewAccessCode) -> Result<Option<AccessCode>, StoreError> {
        // Referrer check and insert in one statement, so a concurrent
        // deactivation cannot slip between them.
        let row = sqlx::query_as::<_, AccessCodeRow>(&format!(
            "INSERT INTO access_codes (code, referrer_code, user_name, is_active, created_at)
             SELECT $1, $2, $3, TRUE, $4
             WHERE $2::text IS NULL
                OR EXISTS (SELECT 1 FROM access_codes WHERE code = $2 AND is_active)
             RETURNING {COLUMNS}"
        ))
        .bind(&new.code)
        .bind(&new.referrer_code)
        .bind(&new.display_name)
        .bind(new.created_at)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(AccessCode::from))
    }

    async fn deactivate(&self, code: &str) -> Result<Option<AccessCode>, StoreError> {
        let row = sqlx::query_as::<_, AccessCodeRow>(&format!(
            "UPDATE access_codes
             SET is_active = FALSE, session_id = NULL, last_renewed_at = NULL, claim_token = NULL
             WHERE code = $1
             RETURNING {COLUMNS}"
        ))
        .bind(code)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(AccessCode::from))
    }

    async fn list_referrals(&self, code: &str) -> Result<Vec<AccessCode>, StoreError> {
        let rows = sqlx::query_as::<_, AccessCodeRow>(&format!(
            "SELECT {COLUMNS} FROM access_codes
             WHERE referrer_code = $1
             ORDER BY created_at ASC, code ASC"
        ))
        .bind(code)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(AccessCode::from).collect())
    }

    async fn health(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db)
            .await?;
        Ok(())
    }
}
