use thiserror::Error;

/// Authentication error types
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication already in progress")]
    InProgress,

    #[error("Authentication window closed")]
    Cancelled,

    #[error("Authentication timed out")]
    Timeout,

    #[error("Auth error: {0}")]
    Provider(String),

    #[error("Token exchange failed: {message}")]
    TokenExchange { message: String },

    #[error(transparent)]
    Xsts(#[from] XstsError),

    #[error("This Microsoft account doesn't own Minecraft Java Edition")]
    GameNotOwned,

    #[error("Token refresh failed. Please log in again.")]
    RefreshFailed,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body_snippet}")]
    Http {
        status: reqwest::StatusCode,
        body_snippet: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Account has no refresh token")]
    MissingRefreshToken,

    #[error(transparent)]
    Store(#[from] vx_accounts::StoreError),
}

/// XSTS `XErr` translation.
///
/// Both named cases require user action outside the launcher, so their
/// messages must reach the user verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XstsError {
    #[error("This Microsoft account doesn't have an Xbox account. Create one at xbox.com")]
    NoXboxAccount,

    #[error("This is a child account. It must be added to a Family by an adult")]
    ChildAccountNeedsFamily,

    #[error("Xbox security token service refused the sign-in (XErr: {0})")]
    Unknown(u64),
}

impl XstsError {
    pub fn from_xerr(code: u64) -> Self {
        match code {
            2148916233 => Self::NoXboxAccount,
            2148916238 => Self::ChildAccountNeedsFamily,
            code => Self::Unknown(code),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
