use serde::{Deserialize, Serialize};

/// Kind of a stored identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Microsoft,
    Offline,
}

/// One authenticated or offline identity.
///
/// Field names follow the on-disk camelCase schema. For microsoft accounts
/// `access_token`/`refresh_token` are plaintext in memory and encrypted by
/// the store before they reach disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "type")]
    pub kind: AccountType,
    pub username: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owns_game: Option<bool>,
    pub added_at: i64,
    pub last_used: i64,
}

impl Account {
    /// The identifier an account is addressed by: `uuid` for microsoft,
    /// `username` for offline.
    pub fn identifier(&self) -> &str {
        match self.kind {
            AccountType::Microsoft => self.uuid.as_deref().unwrap_or(&self.username),
            AccountType::Offline => &self.username,
        }
    }

    pub(crate) fn matches(&self, incoming: &AccountData) -> bool {
        match incoming.kind {
            AccountType::Microsoft => self.uuid.is_some() && self.uuid == incoming.uuid,
            AccountType::Offline => {
                self.kind == AccountType::Offline && self.username == incoming.username
            }
        }
    }
}

/// Incoming account data for `add_account`.
///
/// `None` fields are "absent": merged into an existing entry they leave the
/// stored value untouched, so a refresh result without an ownership flag
/// keeps the flag from the original login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountData {
    pub kind: AccountType,
    pub username: String,
    pub uuid: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub owns_game: Option<bool>,
}

impl AccountData {
    pub fn identifier(&self) -> &str {
        match self.kind {
            AccountType::Microsoft => self.uuid.as_deref().unwrap_or(&self.username),
            AccountType::Offline => &self.username,
        }
    }
}

/// The persisted store document: `{accounts: [...], selectedAccount: ...}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreData {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub selected_account: Option<String>,
}

impl StoreData {
    pub fn find(&self, identifier: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.identifier() == identifier)
    }

    pub fn selected(&self) -> Option<&Account> {
        self.selected_account.as_deref().and_then(|id| self.find(id))
    }
}
