//! Administrative operations, all gated by the shared admin secret.

use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::codegen;
use crate::error::AppError;
use crate::lease::{Clock, bounded};
use crate::models::access_code::{AccessCode, NewAccessCode};
use crate::store::LeaseStore;

#[derive(Debug, Clone)]
pub struct AdminGate {
    store: Arc<dyn LeaseStore>,
    clock: Arc<dyn Clock>,
    secret: Option<String>,
    store_timeout: std::time::Duration,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl AdminGate {
    /// With no `secret` configured, every admin call is rejected.
    pub fn new(
        store: Arc<dyn LeaseStore>,
        clock: Arc<dyn Clock>,
        secret: Option<String>,
        store_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            clock,
            secret: secret.filter(|s| !s.is_empty()),
            store_timeout,
        }
    }

    pub fn authorize(&self, credential: Option<&str>) -> Result<(), AppError> {
        let Some(expected) = self.secret.as_deref() else {
            tracing::warn!("admin call rejected: no admin secret configured");
            return Err(AppError::Unauthorized);
        };

        let given = credential.unwrap_or_default();
        if bool::from(given.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            tracing::warn!("admin call rejected: secret mismatch");
            Err(AppError::Unauthorized)
        }
    }

    /// Creates a new active, unclaimed code and returns it.
    ///
    /// The referrer, if given, must be an existing active code at the moment
    /// of insertion. Empty strings count as absent.
    pub async fn issue_code(
        &self,
        credential: Option<&str>,
        referrer_code: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<String, AppError> {
        self.authorize(credential)?;

        let referrer_code = non_empty(referrer_code);
        let code = codegen::access_code();
        let new = NewAccessCode {
            display_name: non_empty(display_name)
                .map(String::from)
                .unwrap_or_else(|| codegen::default_display_name(&code)),
            referrer_code: referrer_code.map(String::from),
            created_at: self.clock.now(),
            code,
        };

        bounded(self.store_timeout, "issue_code", async {
            match self.store.insert_code(&new).await {
                Ok(Some(created)) => {
                    tracing::info!(
                        code = %created.code,
                        referrer = created.referrer_code.as_deref().unwrap_or("none"),
                        user = %new.display_name,
                        "access code issued"
                    );
                    Ok(created.code)
                }
                Ok(None) => Err(AppError::InvalidReferrer(
                    referrer_code.unwrap_or_default().to_string(),
                )),
                Err(e) => {
                    let err = AppError::from(e);
                    if matches!(err, AppError::Conflict) {
                        tracing::warn!(code = %new.code, "generated access code collided");
                    }
                    Err(err)
                }
            }
        })
        .await
    }

    /// Permanently disables `code` and revokes any session holding it.
    pub async fn deactivate_code(&self, credential: Option<&str>, code: &str) -> Result<(), AppError> {
        self.authorize(credential)?;
        if code.is_empty() {
            return Err(AppError::MissingInput("code"));
        }

        bounded(self.store_timeout, "deactivate_code", async {
            let updated = self.store.deactivate(code).await?.ok_or(AppError::NotFound)?;
            tracing::info!(code = %updated.code, "access code deactivated");
            Ok::<_, AppError>(())
        })
        .await
    }

    /// Codes introduced by `code`, oldest first.
    pub async fn list_referrals(
        &self,
        credential: Option<&str>,
        code: &str,
    ) -> Result<Vec<AccessCode>, AppError> {
        self.authorize(credential)?;
        if code.is_empty() {
            return Err(AppError::MissingInput("code"));
        }

        bounded(self.store_timeout, "list_referrals", async {
            let referrals = self.store.list_referrals(code).await?;
            Ok::<_, AppError>(referrals)
        })
        .await
    }
}
