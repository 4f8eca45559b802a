//! Identifier generation from the operating system's secure random source.
//!
//! Uniqueness is not checked here; the store's constraints reject collisions.

use rand::RngCore;
use rand::rngs::OsRng;

const SESSION_ID_BYTES: usize = 32;
const ACCESS_CODE_BYTES: usize = 8;
const ACCESS_CODE_PREFIX: &str = "REF_";

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 64 hex characters; the sole credential for renew and release.
pub fn session_id() -> String {
    random_hex(SESSION_ID_BYTES)
}

/// `REF_` followed by 16 hex characters.
pub fn access_code() -> String {
    format!("{ACCESS_CODE_PREFIX}{}", random_hex(ACCESS_CODE_BYTES))
}

pub fn default_display_name(code: &str) -> String {
    let head: String = code.chars().take(5).collect();
    format!("User_{head}")
}
