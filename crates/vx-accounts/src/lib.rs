//! Encrypted multi-account credential store for the launcher.
//!
//! Accounts live in a single JSON document under the user's profile
//! directory. Microsoft accounts carry an access and refresh token,
//! encrypted at rest with AES-256-CBC (`"<ivHex>:<cipherHex>"` fields) and
//! held as plaintext only in memory. Offline accounts are just a username.
//!
//! # Example
//!
//! ```no_run
//! use vx_accounts::AccountStore;
//!
//! # async fn example() -> Result<(), vx_accounts::StoreError> {
//! let store = AccountStore::open_default()?;
//! store.add_offline_account("Steve").await?;
//!
//! if let Some(account) = store.selected_account().await? {
//!     println!("Playing as {}", account.username);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The store is deduplicating: adding account data whose identifier (uuid
//! for microsoft, username for offline) already exists merges into the
//! existing entry instead of appending. The selected account always refers
//! to an existing entry; removals repair the selection.

pub mod cipher;
pub mod errors;
pub mod key_source;
pub mod models;
pub mod store;

pub use cipher::CredentialCipher;
pub use errors::{Result, StoreError};
pub use models::{Account, AccountData, AccountType, StoreData};
pub use store::AccountStore;
