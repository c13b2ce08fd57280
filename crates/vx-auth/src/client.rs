use chrono::Utc;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::acquirer::AuthCode;
use crate::config::{AuthConfig, OWNERSHIP_ITEMS, RP_AUTH, RP_MINECRAFT};
use crate::credentials::MicrosoftCredentials;
use crate::errors::{AuthError, Result, XstsError};
use crate::models::*;

const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Executes the federation chain: Microsoft → Xbox Live → XSTS →
/// Minecraft Services → profile → entitlement.
///
/// The chain is strictly sequential; every token is scoped to and required
/// by the next authority, so no stage can be skipped or reordered.
#[derive(Debug, Clone)]
pub struct AuthClient {
    config: AuthConfig,
    http: Client,
}

impl AuthClient {
    pub fn new(config: AuthConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .user_agent(config.user_agent.as_deref().unwrap_or("voxel-launcher"))
            .build()?;

        Ok(Self { config, http })
    }

    /// Stage 1 (login): exchange the authorization code for Microsoft
    /// tokens via the PKCE-protected code grant.
    #[instrument(skip(self, auth_code))]
    pub async fn exchange_code(&self, auth_code: &AuthCode) -> Result<MsTokenResponse> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("code", auth_code.code.as_str()),
            ("code_verifier", auth_code.verifier.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        debug!("Exchanging authorization code for tokens");
        let response = self
            .http
            .post(&self.config.endpoints.ms_token)
            .form(&params)
            .send()
            .await?;

        Self::read_token_response(response).await
    }

    /// Stage 1 (refresh): trade a stored refresh token for fresh Microsoft
    /// tokens.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_ms_token(&self, refresh_token: &str) -> Result<MsTokenResponse> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        debug!("Refreshing Microsoft access token");
        let response = self
            .http
            .post(&self.config.endpoints.ms_token)
            .form(&params)
            .send()
            .await?;

        Self::read_token_response(response).await
    }

    async fn read_token_response(response: reqwest::Response) -> Result<MsTokenResponse> {
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<MsTokenError>(&body) {
                Ok(err) => err.error_description.unwrap_or(err.error),
                Err(_) => body.chars().take(200).collect(),
            };
            return Err(AuthError::TokenExchange { message });
        }

        Ok(response.json().await?)
    }

    /// Stage 2: authenticate to Xbox Live with the Microsoft access token
    /// wrapped in an RPS ticket.
    #[instrument(skip(self, ms_access_token))]
    pub async fn xbl_authenticate(&self, ms_access_token: &str) -> Result<XblAuthResponse> {
        let request = XblAuthRequest {
            properties: XblAuthProperties {
                auth_method: "RPS".to_string(),
                site_name: "user.auth.xboxlive.com".to_string(),
                rps_ticket: format!("d={ms_access_token}"),
            },
            relying_party: RP_AUTH.to_string(),
            token_type: "JWT".to_string(),
        };

        debug!("Authenticating with Xbox Live");
        let response = self
            .http
            .post(&self.config.endpoints.xbl_authenticate)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::http_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Stage 3: authorize the Xbox Live token against XSTS for the
    /// Minecraft relying party. Provider `XErr` codes are translated into
    /// errors the user can act on.
    #[instrument(skip(self, xbl_token))]
    pub async fn xsts_authorize(&self, xbl_token: &str) -> Result<XstsAuthResponse> {
        let request = XstsAuthRequest {
            properties: XstsAuthProperties {
                sandbox_id: "RETAIL".to_string(),
                user_tokens: vec![xbl_token.to_string()],
            },
            relying_party: RP_MINECRAFT.to_string(),
            token_type: "JWT".to_string(),
        };

        debug!("Authorizing with XSTS");
        let response = self
            .http
            .post(&self.config.endpoints.xsts_authorize)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let error: XstsErrorResponse = response.json().await?;
            return Err(XstsError::from_xerr(error.xerr).into());
        }

        if !response.status().is_success() {
            return Err(Self::http_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Stage 4: log in to Minecraft Services with the XSTS token and user
    /// hash.
    #[instrument(skip(self, xsts_token, uhs))]
    pub async fn mc_login(&self, xsts_token: &str, uhs: &str) -> Result<McLoginResponse> {
        let request = McLoginRequest {
            identity_token: format!("XBL3.0 x={uhs};{xsts_token}"),
        };

        debug!("Logging in to Minecraft Services");
        let response = self
            .http
            .post(&self.config.endpoints.mc_login)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::http_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Stage 5: fetch the player profile. A 404 means the account does not
    /// own the Java edition.
    #[instrument(skip(self, mc_access_token))]
    pub async fn fetch_profile(&self, mc_access_token: &str) -> Result<McProfile> {
        debug!("Fetching Minecraft profile");
        let response = self
            .http
            .get(&self.config.endpoints.mc_profile)
            .bearer_auth(mc_access_token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AuthError::GameNotOwned);
        }

        if !response.status().is_success() {
            return Err(Self::http_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Stage 6: check store entitlements for game ownership.
    ///
    /// Fail-closed: any request failure is "does not own", never an error.
    #[instrument(skip(self, mc_access_token))]
    pub async fn check_ownership(&self, mc_access_token: &str) -> bool {
        match self.fetch_entitlements(mc_access_token).await {
            Ok(entitlements) => entitlements
                .items
                .iter()
                .any(|item| OWNERSHIP_ITEMS.contains(&item.name.as_str())),
            Err(e) => {
                warn!("Entitlement check failed, assuming not owned: {}", e);
                false
            }
        }
    }

    async fn fetch_entitlements(&self, mc_access_token: &str) -> Result<EntitlementsResponse> {
        let response = self
            .http
            .get(&self.config.endpoints.mc_entitlements)
            .bearer_auth(mc_access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::http_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Complete login: authorization code to finished credentials.
    #[instrument(skip(self, auth_code))]
    pub async fn complete_login(&self, auth_code: &AuthCode) -> Result<MicrosoftCredentials> {
        debug!("Starting complete login chain");

        let ms = self.exchange_code(auth_code).await?;
        let assembled = self.run_console_chain(&ms).await?;
        let owns_game = self.check_ownership(&assembled.access_token).await;

        Ok(MicrosoftCredentials {
            owns_game: Some(owns_game),
            ..assembled
        })
    }

    /// Refresh: same chain with a refresh-token grant instead of the
    /// interactive step, and no entitlement stage.
    ///
    /// Every failure collapses into the uniform `RefreshFailed`; the user
    /// can only fix a broken refresh by logging in again, so the detail is
    /// logged rather than surfaced.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<MicrosoftCredentials> {
        debug!("Refreshing credentials");

        let result: Result<MicrosoftCredentials> = async {
            let ms = self.refresh_ms_token(refresh_token).await?;
            self.run_console_chain(&ms).await
        }
        .await;

        result.map_err(|e| {
            warn!("Token refresh failed: {}", e);
            AuthError::RefreshFailed
        })
    }

    /// Stages 2-5, shared by login and refresh.
    async fn run_console_chain(&self, ms: &MsTokenResponse) -> Result<MicrosoftCredentials> {
        let xbl = self.xbl_authenticate(&ms.access_token).await?;
        let uhs = xbl
            .display_claims
            .xui
            .first()
            .ok_or_else(|| AuthError::InvalidResponse("Missing XUI claims".to_string()))?
            .uhs
            .clone();

        let xsts = self.xsts_authorize(&xbl.token).await?;
        let mc = self.mc_login(&xsts.token, &uhs).await?;
        let profile = self.fetch_profile(&mc.access_token).await?;

        let expires_in = ms.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        Ok(MicrosoftCredentials {
            access_token: mc.access_token,
            refresh_token: ms.refresh_token.clone(),
            username: profile.name,
            uuid: profile.id,
            owns_game: None,
            expires_at: Utc::now().timestamp_millis() + expires_in as i64 * 1000,
        })
    }

    async fn http_error(response: reqwest::Response) -> AuthError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        AuthError::Http {
            status,
            body_snippet: body.chars().take(200).collect(),
        }
    }
}
