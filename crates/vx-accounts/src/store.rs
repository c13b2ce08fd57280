use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::cipher::CredentialCipher;
use crate::errors::{Result, StoreError};
use crate::key_source;
use crate::models::{Account, AccountData, AccountType, StoreData};

/// Encrypted multi-account store.
///
/// One JSON document per user, read from and written back to disk on every
/// operation. Microsoft token fields are encrypted on the way out and
/// decrypted on the way in; the caller always holds plaintext copies.
///
/// Mutating operations are serialized through an in-process writer lock and
/// writes additionally take an advisory file lock, so concurrent calls
/// cannot drop each other's changes.
#[derive(Debug)]
pub struct AccountStore {
    path: PathBuf,
    lock_path: PathBuf,
    cipher: CredentialCipher,
    writer: Mutex<()>,
}

impl AccountStore {
    pub fn new(path: impl AsRef<Path>, cipher: CredentialCipher) -> Self {
        let path = path.as_ref().to_path_buf();
        let lock_path = path.with_extension("lock");
        Self {
            path,
            lock_path,
            cipher,
            writer: Mutex::new(()),
        }
    }

    /// Open the store at its default location with the keyring-resolved
    /// cipher.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_store_path()?, key_source::resolve_cipher()))
    }

    /// `~/.minecraft-launcher/accounts.json`, shared with earlier launcher
    /// versions.
    pub fn default_store_path() -> Result<PathBuf> {
        let dirs = directories::BaseDirs::new().ok_or(StoreError::HomeDirUnavailable)?;
        Ok(dirs
            .home_dir()
            .join(".minecraft-launcher")
            .join("accounts.json"))
    }

    /// Load the store, decrypting microsoft credentials.
    ///
    /// A missing file is an empty store; an unreadable or unparsable one is
    /// `StoreError::Corrupt`, so callers can tell the two apart.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<StoreData> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Account store does not exist yet: {}", self.path.display());
                return Ok(StoreData::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut store: StoreData =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        for account in &mut store.accounts {
            if account.kind != AccountType::Microsoft {
                continue;
            }
            account.access_token = self.decrypt_field(account, account.access_token.as_deref());
            account.refresh_token = self.decrypt_field(account, account.refresh_token.as_deref());
        }

        Ok(store)
    }

    fn decrypt_field(&self, account: &Account, stored: Option<&str>) -> Option<String> {
        let stored = stored?;
        let plaintext = self.cipher.decrypt(stored);
        if plaintext.is_none() {
            warn!(
                "Could not decrypt a credential for account '{}'; re-authentication required",
                account.username
            );
        }
        plaintext
    }

    /// Encrypt microsoft credentials and write the store to disk.
    ///
    /// Works on a copy; the caller's in-memory tokens stay plaintext.
    #[instrument(skip(self, data))]
    pub async fn save(&self, data: &StoreData) -> Result<()> {
        let _writer = self.writer.lock().await;
        self.save_locked(data).await
    }

    async fn save_locked(&self, data: &StoreData) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
            }
        }

        let mut to_disk = data.clone();
        for account in &mut to_disk.accounts {
            if account.kind != AccountType::Microsoft {
                continue;
            }
            if let Some(token) = &account.access_token {
                account.access_token = Some(self.cipher.encrypt(token)?);
            }
            if let Some(token) = &account.refresh_token {
                account.refresh_token = Some(self.cipher.encrypt(token)?);
            }
        }

        let json = serde_json::to_string_pretty(&to_disk)?;

        let _flock = self.acquire_file_lock()?;

        // Atomic write: temp file, sync, rename
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json).await?;
        let file = std::fs::File::open(&temp_path)?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!("Saved account store: {}", self.path.display());
        Ok(())
    }

    fn acquire_file_lock(&self) -> Result<std::fs::File> {
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::LockUnavailable)?;

        Ok(lock_file)
    }

    /// Add a new account or merge into an existing one (matched by
    /// identifier). The first account ever added becomes selected.
    #[instrument(skip(self, data), fields(identifier = %data.identifier()))]
    pub async fn add_account(&self, data: AccountData) -> Result<StoreData> {
        let _writer = self.writer.lock().await;
        self.add_account_locked(data).await
    }

    async fn add_account_locked(&self, data: AccountData) -> Result<StoreData> {
        let mut store = self.load().await?;
        let identifier = data.identifier().to_string();
        let now = Utc::now().timestamp_millis();

        if let Some(existing) = store.accounts.iter_mut().find(|a| a.matches(&data)) {
            merge_account(existing, data, now);
        } else {
            store.accounts.push(new_account(data, now));
        }

        if store.selected_account.is_none() {
            store.selected_account = Some(identifier);
        }

        self.save_locked(&store).await?;
        Ok(store)
    }

    /// Remove an account and repair selection: the first remaining account
    /// becomes selected, or nothing if the store is now empty.
    #[instrument(skip(self))]
    pub async fn remove_account(&self, identifier: &str) -> Result<StoreData> {
        let _writer = self.writer.lock().await;

        let mut store = self.load().await?;
        store.accounts.retain(|a| a.identifier() != identifier);

        if store.selected_account.as_deref() == Some(identifier) {
            store.selected_account = store.accounts.first().map(|a| a.identifier().to_string());
        }

        self.save_locked(&store).await?;
        Ok(store)
    }

    /// Mark an account as selected and refresh its `last_used` stamp.
    #[instrument(skip(self))]
    pub async fn select_account(&self, identifier: &str) -> Result<Account> {
        let _writer = self.writer.lock().await;

        let mut store = self.load().await?;
        let account = store
            .accounts
            .iter_mut()
            .find(|a| a.identifier() == identifier)
            .ok_or_else(|| StoreError::AccountNotFound {
                identifier: identifier.to_string(),
            })?;

        account.last_used = Utc::now().timestamp_millis();
        let selected = account.clone();
        store.selected_account = Some(identifier.to_string());

        self.save_locked(&store).await?;
        Ok(selected)
    }

    pub async fn selected_account(&self) -> Result<Option<Account>> {
        let store = self.load().await?;
        Ok(store.selected().cloned())
    }

    pub async fn all_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.load().await?.accounts)
    }

    /// Add an offline account. The username must be non-empty after
    /// trimming and at most 16 characters.
    #[instrument(skip(self))]
    pub async fn add_offline_account(&self, username: &str) -> Result<StoreData> {
        let trimmed = username.trim();
        if trimmed.is_empty() {
            return Err(StoreError::EmptyUsername);
        }
        let len = username.chars().count();
        if len > 16 {
            return Err(StoreError::UsernameTooLong { len });
        }

        self.add_account(AccountData {
            kind: AccountType::Offline,
            username: trimmed.to_string(),
            uuid: None,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            owns_game: None,
        })
        .await
    }

    /// Persist the outcome of a microsoft login or refresh.
    pub async fn update_microsoft_account(&self, mut data: AccountData) -> Result<StoreData> {
        data.kind = AccountType::Microsoft;
        self.add_account(data).await
    }
}

/// Present incoming fields overwrite; absent ones keep the stored value, so
/// a refresh without an ownership flag keeps the flag from login.
fn merge_account(existing: &mut Account, data: AccountData, now: i64) {
    existing.username = data.username;
    if data.uuid.is_some() {
        existing.uuid = data.uuid;
    }
    if data.access_token.is_some() {
        existing.access_token = data.access_token;
    }
    if data.refresh_token.is_some() {
        existing.refresh_token = data.refresh_token;
    }
    if data.expires_at.is_some() {
        existing.expires_at = data.expires_at;
    }
    if data.owns_game.is_some() {
        existing.owns_game = data.owns_game;
    }
    existing.last_used = now;
}

fn new_account(data: AccountData, now: i64) -> Account {
    Account {
        kind: data.kind,
        username: data.username,
        uuid: data.uuid,
        access_token: data.access_token,
        refresh_token: data.refresh_token,
        expires_at: data.expires_at,
        owns_game: data.owns_game,
        added_at: now,
        last_used: now,
    }
}
