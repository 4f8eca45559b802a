use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The session currently bound to an access code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub session_id: String,
    pub last_renewed_at: DateTime<Utc>,
    /// Caller-supplied idempotency key the lease was claimed with, if any.
    pub claim_token: Option<String>,
}

impl Lease {
    /// A lease expires once strictly more than `timeout` has passed since the last renewal.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_renewed_at > timeout
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCode {
    pub code: String,
    pub referrer_code: Option<String>,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub lease: Option<Lease>,
    pub created_at: DateTime<Utc>,
}

impl AccessCode {
    /// The lease holding this code at `now`, ignoring expired ones.
    pub fn live_lease(&self, now: DateTime<Utc>, timeout: Duration) -> Option<&Lease> {
        self.lease.as_ref().filter(|l| !l.is_expired(now, timeout))
    }
}

#[derive(Debug, Clone)]
pub struct NewAccessCode {
    pub code: String,
    pub referrer_code: Option<String>,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Flat row shape of the `access_codes` table.
#[derive(Debug, Clone, FromRow)]
pub struct AccessCodeRow {
    pub code: String,
    pub referrer_code: Option<String>,
    pub user_name: Option<String>,
    pub is_active: bool,
    pub session_id: Option<String>,
    pub last_renewed_at: Option<DateTime<Utc>>,
    pub claim_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AccessCodeRow> for AccessCode {
    fn from(row: AccessCodeRow) -> Self {
        // A session id without a renewal time never blocks a claim, so it is not a lease.
        let lease = match (row.session_id, row.last_renewed_at) {
            (Some(session_id), Some(last_renewed_at)) => Some(Lease {
                session_id,
                last_renewed_at,
                claim_token: row.claim_token,
            }),
            _ => None,
        };

        Self {
            code: row.code,
            referrer_code: row.referrer_code,
            display_name: row.user_name,
            is_active: row.is_active,
            lease,
            created_at: row.created_at,
        }
    }
}

// --- Wire types ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    pub access_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateResponse {
    pub success: bool,
    pub session_id: String,
    pub user_name: Option<String>,
    pub referrer_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeRequest {
    pub admin_secret: Option<String>,
    pub referrer_code: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeResponse {
    pub success: bool,
    pub new_code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCodeRequest {
    pub admin_secret: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSummary {
    pub code: String,
    pub user_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<AccessCode> for CodeSummary {
    fn from(c: AccessCode) -> Self {
        Self {
            code: c.code,
            user_name: c.display_name,
            is_active: c.is_active,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReferralsResponse {
    pub success: bool,
    pub referrals: Vec<CodeSummary>,
}
