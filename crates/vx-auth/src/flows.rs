use std::sync::Arc;

use tracing::{info, instrument};
use vx_accounts::{Account, AccountStore, AccountType, StoreError};

use crate::acquirer::CodeAcquirer;
use crate::browser::AuthBrowser;
use crate::client::AuthClient;
use crate::config::AuthConfig;
use crate::credentials::is_token_expired;
use crate::errors::{AuthError, Result};

/// Consumer-facing entry point wiring the interactive acquirer, the
/// federation chain and the account store together.
///
/// Account management itself (add offline, select, remove, list) is the
/// store's own API; this service owns the flows that touch the network.
pub struct AuthService {
    client: AuthClient,
    acquirer: CodeAcquirer,
    store: Arc<AccountStore>,
}

impl AuthService {
    pub fn new(config: AuthConfig, store: Arc<AccountStore>) -> Result<Self> {
        Ok(Self {
            client: AuthClient::new(config.clone())?,
            acquirer: CodeAcquirer::new(config),
            store,
        })
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    /// Interactive Microsoft login: acquire a code, run the chain, persist
    /// the outcome. The account becomes selected if nothing was.
    #[instrument(skip(self, browser))]
    pub async fn login_with_microsoft(&self, browser: &dyn AuthBrowser) -> Result<Account> {
        let auth_code = self.acquirer.acquire(browser).await?;
        let creds = self.client.complete_login(&auth_code).await?;
        let uuid = creds.uuid.clone();

        let stored = self.store.update_microsoft_account(creds.into()).await?;
        let account = stored
            .find(&uuid)
            .cloned()
            .ok_or_else(|| AuthError::InvalidResponse("Stored account disappeared".to_string()))?;

        info!("Signed in as {}", account.username);
        Ok(account)
    }

    /// Re-run the chain from the stored refresh token and persist the
    /// merged outcome. Ownership is preserved from the original login.
    #[instrument(skip(self))]
    pub async fn refresh_account(&self, identifier: &str) -> Result<Account> {
        let data = self.store.load().await?;
        let account = data
            .find(identifier)
            .ok_or_else(|| StoreError::AccountNotFound {
                identifier: identifier.to_string(),
            })?;
        let refresh_token = account
            .refresh_token
            .as_deref()
            .ok_or(AuthError::MissingRefreshToken)?;

        let creds = self.client.refresh(refresh_token).await?;
        let uuid = creds.uuid.clone();

        let stored = self.store.update_microsoft_account(creds.into()).await?;
        stored
            .find(&uuid)
            .cloned()
            .ok_or_else(|| AuthError::InvalidResponse("Stored account disappeared".to_string()))
    }

    /// Hand back the account ready to launch with: offline accounts and
    /// unexpired microsoft accounts pass through, expired ones are
    /// refreshed first.
    #[instrument(skip(self))]
    pub async fn ensure_fresh(&self, identifier: &str) -> Result<Account> {
        let data = self.store.load().await?;
        let account = data
            .find(identifier)
            .cloned()
            .ok_or_else(|| StoreError::AccountNotFound {
                identifier: identifier.to_string(),
            })?;

        if account.kind == AccountType::Offline {
            return Ok(account);
        }

        let expired = account.expires_at.map(is_token_expired).unwrap_or(true);
        if expired {
            self.refresh_account(identifier).await
        } else {
            Ok(account)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserSurface, SurfaceEvent};
    use crate::config::Endpoints;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;
    use url::Url;
    use vx_accounts::{AccountData, CredentialCipher};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Emits one scripted redirect, then stays open until closed.
    struct RedirectBrowser {
        redirect: String,
    }

    struct OneShotSurface {
        event: Option<SurfaceEvent>,
    }

    #[async_trait::async_trait]
    impl BrowserSurface for OneShotSurface {
        async fn next_event(&mut self) -> Option<SurfaceEvent> {
            match self.event.take() {
                Some(event) => Some(event),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {}
    }

    #[async_trait::async_trait]
    impl AuthBrowser for RedirectBrowser {
        async fn open(&self, _url: Url) -> Result<Box<dyn BrowserSurface>> {
            Ok(Box::new(OneShotSurface {
                event: Some(SurfaceEvent::WillNavigate(self.redirect.clone())),
            }))
        }
    }

    fn temp_store() -> (Arc<AccountStore>, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = AccountStore::new(
            temp.path().join("accounts.json"),
            CredentialCipher::from_passphrase("test-passphrase"),
        );
        (Arc::new(store), temp)
    }

    fn service_against(server: &MockServer, store: Arc<AccountStore>) -> AuthService {
        let config = AuthConfig {
            endpoints: Endpoints::with_base(&server.uri()),
            ..AuthConfig::default()
        };
        AuthService::new(config, store).unwrap()
    }

    async fn mount_chain(server: &MockServer, with_entitlements: bool) {
        Mock::given(method("POST"))
            .and(path("/consumers/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ms-access",
                "refresh_token": "new-ms-refresh",
                "expires_in": 3600,
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Token": "xbl-token",
                "DisplayClaims": { "xui": [{ "uhs": "user-hash" }] },
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/xsts/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Token": "xsts-token",
                "DisplayClaims": { "xui": [{ "uhs": "user-hash" }] },
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/authentication/login_with_xbox"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-mc-token",
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/minecraft/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "uuid-1",
                "name": "Notch",
            })))
            .mount(server)
            .await;
        if with_entitlements {
            Mock::given(method("GET"))
                .and(path("/entitlements/mcstore"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "items": [{ "name": "product_minecraft" }],
                })))
                .mount(server)
                .await;
        }
    }

    fn stored_microsoft(expires_at: i64) -> AccountData {
        AccountData {
            kind: AccountType::Microsoft,
            username: "Notch".to_string(),
            uuid: Some("uuid-1".to_string()),
            access_token: Some("old-mc-token".to_string()),
            refresh_token: Some("stored-ms-refresh".to_string()),
            expires_at: Some(expires_at),
            owns_game: Some(true),
        }
    }

    #[tokio::test]
    async fn login_persists_and_selects_the_account() {
        let server = MockServer::start().await;
        mount_chain(&server, true).await;
        let (store, _temp) = temp_store();
        let service = service_against(&server, store.clone());

        let browser = RedirectBrowser {
            redirect: "https://login.live.com/oauth20_desktop.srf?code=abc".to_string(),
        };
        let account = service.login_with_microsoft(&browser).await.unwrap();

        assert_eq!(account.kind, AccountType::Microsoft);
        assert_eq!(account.username, "Notch");
        assert_eq!(account.access_token.as_deref(), Some("fresh-mc-token"));
        assert_eq!(account.owns_game, Some(true));

        let selected = store.selected_account().await.unwrap().unwrap();
        assert_eq!(selected.identifier(), "uuid-1");
    }

    #[tokio::test]
    async fn refresh_merges_new_tokens_and_keeps_ownership() {
        let server = MockServer::start().await;
        mount_chain(&server, false).await;
        let (store, _temp) = temp_store();
        store
            .update_microsoft_account(stored_microsoft(0))
            .await
            .unwrap();
        let service = service_against(&server, store.clone());

        let account = service.refresh_account("uuid-1").await.unwrap();

        assert_eq!(account.access_token.as_deref(), Some("fresh-mc-token"));
        assert_eq!(account.refresh_token.as_deref(), Some("new-ms-refresh"));
        // The refresh chain has no entitlement stage; the flag survives
        assert_eq!(account.owns_game, Some(true));
    }

    #[tokio::test]
    async fn ensure_fresh_skips_the_network_for_valid_tokens() {
        // No mocks mounted: any network call would fail the test
        let server = MockServer::start().await;
        let (store, _temp) = temp_store();
        let in_an_hour = Utc::now().timestamp_millis() + 60 * 60 * 1000;
        store
            .update_microsoft_account(stored_microsoft(in_an_hour))
            .await
            .unwrap();
        let service = service_against(&server, store);

        let account = service.ensure_fresh("uuid-1").await.unwrap();
        assert_eq!(account.access_token.as_deref(), Some("old-mc-token"));
    }

    #[tokio::test]
    async fn ensure_fresh_refreshes_tokens_inside_the_expiry_margin() {
        let server = MockServer::start().await;
        mount_chain(&server, false).await;
        let (store, _temp) = temp_store();
        let in_two_minutes = Utc::now().timestamp_millis() + 2 * 60 * 1000;
        store
            .update_microsoft_account(stored_microsoft(in_two_minutes))
            .await
            .unwrap();
        let service = service_against(&server, store);

        let account = service.ensure_fresh("uuid-1").await.unwrap();
        assert_eq!(account.access_token.as_deref(), Some("fresh-mc-token"));
    }

    #[tokio::test]
    async fn ensure_fresh_passes_offline_accounts_through() {
        let server = MockServer::start().await;
        let (store, _temp) = temp_store();
        store.add_offline_account("Steve").await.unwrap();
        let service = service_against(&server, store);

        let account = service.ensure_fresh("Steve").await.unwrap();
        assert_eq!(account.kind, AccountType::Offline);
    }

    #[tokio::test]
    async fn refresh_without_a_stored_refresh_token_fails() {
        let server = MockServer::start().await;
        let (store, _temp) = temp_store();
        let mut data = stored_microsoft(0);
        data.refresh_token = None;
        store.update_microsoft_account(data).await.unwrap();
        let service = service_against(&server, store);

        let result = service.refresh_account("uuid-1").await;
        assert!(matches!(result, Err(AuthError::MissingRefreshToken)));
    }

    #[tokio::test]
    async fn refresh_of_unknown_account_fails() {
        let server = MockServer::start().await;
        let (store, _temp) = temp_store();
        let service = service_against(&server, store);

        let result = service.refresh_account("nobody").await;
        assert!(matches!(
            result,
            Err(AuthError::Store(StoreError::AccountNotFound { .. }))
        ));
    }
}
