//! Claim, renew and release of access-code leases.
//!
//! Expiry is never stored or swept. A lease is expired when more than the
//! session timeout has passed since its last renewal, and that is only
//! evaluated when a claim competes for the code.

use std::sync::Arc;

use chrono::Duration;

use super::{Clock, bounded};
use crate::codegen;
use crate::error::AppError;
use crate::models::access_code::Lease;
use crate::store::LeaseStore;

/// Shortest accepted claim token. Anyone holding a live lease's token can
/// read its session id back, so tokens must be random, not counters.
pub const MIN_CLAIM_TOKEN_LEN: usize = 16;

/// A successful claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimed {
    pub session_id: String,
    pub display_name: Option<String>,
    pub referrer_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LeaseManager {
    store: Arc<dyn LeaseStore>,
    clock: Arc<dyn Clock>,
    session_timeout: Duration,
    store_timeout: std::time::Duration,
}

/// Log-safe prefix of a session id.
pub(crate) fn short(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}

impl LeaseManager {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        clock: Arc<dyn Clock>,
        session_timeout: Duration,
        store_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            clock,
            session_timeout,
            store_timeout,
        }
    }

    /// Binds a fresh session to `code` unless another live session holds it.
    ///
    /// With a `claim_token`, a retry of a claim whose write already landed
    /// gets the same session back instead of `AlreadyLeased`. The token must
    /// be unguessable and at least [`MIN_CLAIM_TOKEN_LEN`] characters long.
    pub async fn claim(&self, code: &str, claim_token: Option<&str>) -> Result<Claimed, AppError> {
        if code.is_empty() {
            return Err(AppError::MissingInput("accessCode"));
        }
        if claim_token.is_some_and(|t| t.chars().count() < MIN_CLAIM_TOKEN_LEN) {
            return Err(AppError::InvalidInput(format!(
                "Idempotency-Key must be at least {MIN_CLAIM_TOKEN_LEN} characters"
            )));
        }

        bounded(self.store_timeout, "claim", async {
            let now = self.clock.now();
            let lease = Lease {
                session_id: codegen::session_id(),
                last_renewed_at: now,
                claim_token: claim_token.map(String::from),
            };

            let stale_before = now - self.session_timeout;
            if let Some(claimed) = self.store.claim_if_free(code, &lease, stale_before).await? {
                tracing::info!(code, session = short(&lease.session_id), "access code claimed");
                return Ok(Claimed {
                    session_id: lease.session_id,
                    display_name: claimed.display_name,
                    referrer_code: claimed.referrer_code,
                });
            }

            // The conditional write did not match; work out why.
            let current = self.store.find_code(code).await?.ok_or_else(|| {
                tracing::info!(code, "claim on unknown access code");
                AppError::NotFound
            })?;

            if !current.is_active {
                return Err(AppError::Inactive);
            }

            let held = current.live_lease(now, self.session_timeout);
            if let (Some(token), Some(held)) = (claim_token, held) {
                if held.claim_token.as_deref() == Some(token) {
                    tracing::info!(code, session = short(&held.session_id), "claim replayed");
                    return Ok(Claimed {
                        session_id: held.session_id.clone(),
                        display_name: current.display_name.clone(),
                        referrer_code: current.referrer_code.clone(),
                    });
                }
            }

            tracing::info!(code, "access code already leased");
            Err(AppError::AlreadyLeased)
        })
        .await
    }

    /// Refreshes the lease holding `session_id`.
    ///
    /// Does not look at expiry: a session that keeps pinging stays alive.
    pub async fn renew(&self, session_id: &str) -> Result<(), AppError> {
        if session_id.is_empty() {
            return Err(AppError::MissingInput("sessionId"));
        }

        bounded(self.store_timeout, "renew", async {
            let now = self.clock.now();
            match self.store.renew(session_id, now).await? {
                Some(code) => {
                    tracing::debug!(code = %code, session = short(session_id), "lease renewed");
                    Ok(())
                }
                None => {
                    tracing::info!(session = short(session_id), "renew for unknown session");
                    Err(AppError::NotFound)
                }
            }
        })
        .await
    }

    /// Drops the lease holding `session_id`. Succeeds whether or not one existed.
    pub async fn release(&self, session_id: &str) -> Result<(), AppError> {
        if session_id.is_empty() {
            return Err(AppError::MissingInput("sessionId"));
        }

        bounded(self.store_timeout, "release", async {
            match self.store.release(session_id).await? {
                Some(code) => {
                    tracing::info!(code = %code, session = short(session_id), "session released")
                }
                None => tracing::info!(
                    session = short(session_id),
                    "release for unknown or already released session"
                ),
            }
            Ok::<_, AppError>(())
        })
        .await
    }

    pub async fn health(&self) -> Result<(), AppError> {
        bounded(self.store_timeout, "health", async {
            self.store.health().await?;
            Ok::<_, AppError>(())
        })
        .await
    }
}
