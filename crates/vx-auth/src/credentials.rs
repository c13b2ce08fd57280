use chrono::Utc;
use vx_accounts::{AccountData, AccountType};

use crate::config::TOKEN_EXPIRY_SKEW_MS;

/// Outcome of a completed login or refresh chain.
///
/// `access_token` is the Minecraft Services token the game launches with;
/// `refresh_token` is the Microsoft token the next refresh starts from.
/// A refresh outcome carries no `owns_game` (the chain skips the
/// entitlement stage), so the stored flag survives the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrosoftCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub username: String,
    pub uuid: String,
    pub owns_game: Option<bool>,
    /// Epoch milliseconds
    pub expires_at: i64,
}

impl MicrosoftCredentials {
    pub fn is_expired(&self) -> bool {
        is_token_expired(self.expires_at)
    }
}

impl From<MicrosoftCredentials> for AccountData {
    fn from(creds: MicrosoftCredentials) -> Self {
        AccountData {
            kind: AccountType::Microsoft,
            username: creds.username,
            uuid: Some(creds.uuid),
            access_token: Some(creds.access_token),
            refresh_token: creds.refresh_token,
            expires_at: Some(creds.expires_at),
            owns_game: creds.owns_game,
        }
    }
}

/// True when the current time is within 5 minutes of `expires_at`, so
/// tokens are renewed before they actually lapse.
pub fn is_token_expired(expires_at: i64) -> bool {
    Utc::now().timestamp_millis() >= expires_at - TOKEN_EXPIRY_SKEW_MS
}
