//! Microsoft account authentication for the launcher.
//!
//! One interactive login is turned into a chain of dependent token
//! exchanges:
//!
//! 1. OAuth2 authorization code with PKCE, acquired in an embedded
//!    browser surface
//! 2. Code → Microsoft tokens
//! 3. Microsoft token → Xbox Live token
//! 4. Xbox Live token → XSTS token
//! 5. XSTS token + user hash → Minecraft Services token
//! 6. Profile retrieval and entitlement check
//!
//! The finished credentials land in the [`vx_accounts`] store; later
//! sessions skip the interactive step by replaying the chain from the
//! stored refresh token.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vx_auth::{AuthBrowser, AuthConfig, AuthService};
//! use vx_accounts::AccountStore;
//!
//! # async fn example(browser: &dyn AuthBrowser) -> vx_auth::Result<()> {
//! let store = Arc::new(AccountStore::open_default()?);
//! let auth = AuthService::new(AuthConfig::default(), store)?;
//!
//! // Interactive sign-in (the window shell provides the browser)
//! let account = auth.login_with_microsoft(browser).await?;
//! println!("Signed in as {}", account.username);
//!
//! // Before launching, hand back fresh credentials
//! let account = auth.ensure_fresh(account.identifier()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Only one interactive login may run at a time; a second attempt fails
//! with [`AuthError::InProgress`] until the first settles.

pub mod acquirer;
pub mod browser;
pub mod client;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod flows;
pub mod models;
pub mod pkce;

pub use acquirer::{AuthCode, CodeAcquirer};
pub use browser::{AuthBrowser, BrowserSurface, SurfaceEvent};
pub use client::AuthClient;
pub use config::{AuthConfig, Endpoints};
pub use credentials::{MicrosoftCredentials, is_token_expired};
pub use errors::{AuthError, Result, XstsError};
pub use flows::AuthService;
pub use pkce::PkceChallenge;
