use std::time::Duration;

use url::Url;

/// Production endpoints for the federation chain
pub mod endpoints {
    pub const MS_AUTHORIZE: &str =
        "https://login.microsoftonline.com/consumers/oauth2/v2.0/authorize";
    pub const MS_TOKEN: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";
    pub const XBL_AUTHENTICATE: &str = "https://user.auth.xboxlive.com/user/authenticate";
    pub const XSTS_AUTHORIZE: &str = "https://xsts.auth.xboxlive.com/xsts/authorize";
    pub const MC_LOGIN: &str = "https://api.minecraftservices.com/authentication/login_with_xbox";
    pub const MC_PROFILE: &str = "https://api.minecraftservices.com/minecraft/profile";
    pub const MC_ENTITLEMENTS: &str = "https://api.minecraftservices.com/entitlements/mcstore";
}

/// Official Minecraft client ID
pub const CLIENT_ID: &str = "000000004C12AE6F";
pub const REDIRECT_URI: &str = "https://login.live.com/oauth20_desktop.srf";
pub const SCOPES: &str = "XboxLive.signin offline_access";

/// Relying parties
pub const RP_AUTH: &str = "http://auth.xboxlive.com";
pub const RP_MINECRAFT: &str = "rp://api.minecraftservices.com/";

/// Entitlement names that count as owning the game
pub const OWNERSHIP_ITEMS: &[&str] = &["product_minecraft", "game_minecraft"];

/// Refresh 5 minutes before the access token actually expires
pub const TOKEN_EXPIRY_SKEW_MS: i64 = 5 * 60 * 1000;

/// HTTP client timeouts
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            request: Duration::from_secs(30),
        }
    }
}

/// Endpoint set used by the chain; overridable so tests can point the
/// client at a mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub ms_token: String,
    pub xbl_authenticate: String,
    pub xsts_authorize: String,
    pub mc_login: String,
    pub mc_profile: String,
    pub mc_entitlements: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ms_token: endpoints::MS_TOKEN.to_string(),
            xbl_authenticate: endpoints::XBL_AUTHENTICATE.to_string(),
            xsts_authorize: endpoints::XSTS_AUTHORIZE.to_string(),
            mc_login: endpoints::MC_LOGIN.to_string(),
            mc_profile: endpoints::MC_PROFILE.to_string(),
            mc_entitlements: endpoints::MC_ENTITLEMENTS.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at `base` (for tests against a mock server).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            ms_token: format!("{base}/consumers/oauth2/v2.0/token"),
            xbl_authenticate: format!("{base}/user/authenticate"),
            xsts_authorize: format!("{base}/xsts/authorize"),
            mc_login: format!("{base}/authentication/login_with_xbox"),
            mc_profile: format!("{base}/minecraft/profile"),
            mc_entitlements: format!("{base}/entitlements/mcstore"),
        }
    }
}

/// Configuration for the authentication client and code acquirer
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client ID
    pub client_id: String,

    /// OAuth redirect URI watched for during the interactive flow
    pub redirect_uri: Url,

    /// Requested OAuth scopes
    pub scopes: String,

    /// Endpoints for the five authorities
    pub endpoints: Endpoints,

    /// HTTP client timeouts
    pub http_timeouts: HttpTimeouts,

    /// Upper bound on the whole interactive login step
    pub interactive_timeout: Duration,

    /// Custom user agent (optional)
    pub user_agent: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: CLIENT_ID.to_string(),
            redirect_uri: Url::parse(REDIRECT_URI).expect("valid redirect URI"),
            scopes: SCOPES.to_string(),
            endpoints: Endpoints::default(),
            http_timeouts: HttpTimeouts::default(),
            interactive_timeout: Duration::from_secs(300),
            user_agent: Some("voxel-launcher".to_string()),
        }
    }
}
