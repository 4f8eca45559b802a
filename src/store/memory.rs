//! In-process store for local development and tests.
//!
//! Every operation takes the table lock once, so each call is atomic in the
//! same way a single SQL statement is for [`super::PgLeaseStore`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{LeaseStore, StoreError};
use crate::models::access_code::{AccessCode, Lease, NewAccessCode};

#[derive(Debug, Clone, Default)]
pub struct MemoryLeaseStore {
    codes: Arc<Mutex<HashMap<String, AccessCode>>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn holds_session(code: &AccessCode, session_id: &str) -> bool {
    code.lease
        .as_ref()
        .is_some_and(|l| l.session_id == session_id)
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn find_code(&self, code: &str) -> Result<Option<AccessCode>, StoreError> {
        Ok(self.codes.lock().await.get(code).cloned())
    }

    async fn claim_if_free(
        &self,
        code: &str,
        lease: &Lease,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<AccessCode>, StoreError> {
        let mut codes = self.codes.lock().await;

        if codes
            .values()
            .any(|c| c.code != code && holds_session(c, &lease.session_id))
        {
            return Err(StoreError::Conflict(
                "session id already bound to another code".to_string(),
            ));
        }

        let Some(entry) = codes.get_mut(code) else {
            return Ok(None);
        };
        let free = match &entry.lease {
            None => true,
            Some(current) => current.last_renewed_at < stale_before,
        };
        if !entry.is_active || !free {
            return Ok(None);
        }

        entry.lease = Some(lease.clone());
        Ok(Some(entry.clone()))
    }

    async fn renew(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let mut codes = self.codes.lock().await;
        for c in codes.values_mut() {
            if let Some(lease) = c.lease.as_mut().filter(|l| l.session_id == session_id) {
                lease.last_renewed_at = now;
                return Ok(Some(c.code.clone()));
            }
        }
        Ok(None)
    }

    async fn release(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        let mut codes = self.codes.lock().await;
        let released = codes
            .values_mut()
            .find(|c| holds_session(c, session_id))
            .map(|c| {
                c.lease = None;
                c.code.clone()
            });
        Ok(released)
    }

    async fn insert_code(&self, new: &NewAccessCode) -> Result<Option<AccessCode>, StoreError> {
        let mut codes = self.codes.lock().await;

        if let Some(referrer) = &new.referrer_code {
            if !codes.get(referrer).is_some_and(|c| c.is_active) {
                return Ok(None);
            }
        }
        if codes.contains_key(&new.code) {
            return Err(StoreError::Conflict(format!(
                "access code {} already exists",
                new.code
            )));
        }

        let created = AccessCode {
            code: new.code.clone(),
            referrer_code: new.referrer_code.clone(),
            display_name: Some(new.display_name.clone()),
            is_active: true,
            lease: None,
            created_at: new.created_at,
        };
        codes.insert(created.code.clone(), created.clone());
        Ok(Some(created))
    }

    async fn deactivate(&self, code: &str) -> Result<Option<AccessCode>, StoreError> {
        let mut codes = self.codes.lock().await;
        Ok(codes.get_mut(code).map(|c| {
            c.is_active = false;
            c.lease = None;
            c.clone()
        }))
    }

    async fn list_referrals(&self, code: &str) -> Result<Vec<AccessCode>, StoreError> {
        let codes = self.codes.lock().await;
        let mut referrals: Vec<AccessCode> = codes
            .values()
            .filter(|c| c.referrer_code.as_deref() == Some(code))
            .cloned()
            .collect();
        referrals.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.code.cmp(&b.code))
        });
        Ok(referrals)
    }

    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
