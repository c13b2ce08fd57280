use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, instrument, warn};
use url::Url;

use crate::browser::{AuthBrowser, BrowserSurface, SurfaceEvent};
use crate::config::{AuthConfig, endpoints};
use crate::errors::{AuthError, Result};
use crate::pkce::PkceChallenge;

/// Only one interactive login may run per process.
static LOGIN_IN_FLIGHT: AtomicBool = AtomicBool::new(false);

/// Authorization code plus the PKCE verifier it was issued against.
#[derive(Debug, Clone)]
pub struct AuthCode {
    pub code: String,
    pub verifier: String,
}

/// Drives an embedded browser surface to an authorization code.
///
/// The surface's navigation events race (redirects, failed loads, user
/// closing the window); the first event that matches the redirect target
/// settles the attempt and every later event is a no-op. The in-flight
/// flag is released on every exit path, including panics, so a failed
/// attempt can always be retried.
#[derive(Debug)]
pub struct CodeAcquirer {
    config: AuthConfig,
    in_flight: &'static AtomicBool,
}

impl CodeAcquirer {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            in_flight: &LOGIN_IN_FLIGHT,
        }
    }

    #[cfg(test)]
    fn with_flag(config: AuthConfig, in_flight: &'static AtomicBool) -> Self {
        Self { config, in_flight }
    }

    /// Run one interactive login attempt.
    #[instrument(skip(self, browser))]
    pub async fn acquire(&self, browser: &dyn AuthBrowser) -> Result<AuthCode> {
        let _flight = FlightGuard::claim(self.in_flight)?;

        let pkce = PkceChallenge::generate();
        let url = self.build_authorize_url(&pkce.challenge)?;

        debug!("Opening interactive login surface");
        let mut surface = browser.open(url).await?;

        let settlement = tokio::time::timeout(
            self.config.interactive_timeout,
            wait_for_settlement(surface.as_mut(), &self.config.redirect_uri),
        )
        .await;

        match settlement {
            Err(_) => {
                warn!("Interactive login timed out");
                surface.close().await;
                Err(AuthError::Timeout)
            }
            Ok(Settlement::Code(code)) => {
                debug!("Got authorization code");
                surface.close().await;
                Ok(AuthCode {
                    code,
                    verifier: pkce.verifier,
                })
            }
            Ok(Settlement::ProviderError(error)) => {
                surface.close().await;
                Err(AuthError::Provider(error))
            }
            Ok(Settlement::Closed) => Err(AuthError::Cancelled),
        }
    }

    fn build_authorize_url(&self, challenge: &str) -> Result<Url> {
        let mut url = Url::parse(endpoints::MS_AUTHORIZE)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &self.config.scopes)
            .append_pair("code_challenge", challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("prompt", "select_account");
        Ok(url)
    }
}

/// RAII claim on the process-wide in-flight flag.
struct FlightGuard {
    flag: &'static AtomicBool,
}

impl FlightGuard {
    fn claim(flag: &'static AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AuthError::InProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// How one interactive attempt ended.
enum Settlement {
    Code(String),
    ProviderError(String),
    Closed,
}

/// Consume surface events until the first qualifying one.
///
/// Returning settles the attempt exactly once; events that arrive after
/// that are never observed. A surface whose event stream ends counts as
/// closed by the user.
async fn wait_for_settlement(surface: &mut dyn BrowserSurface, redirect: &Url) -> Settlement {
    loop {
        let Some(event) = surface.next_event().await else {
            return Settlement::Closed;
        };

        let raw_url = match event {
            SurfaceEvent::ClosedByUser => return Settlement::Closed,
            SurfaceEvent::WillNavigate(url)
            | SurfaceEvent::DidNavigate(url)
            | SurfaceEvent::LoadFailed(url) => url,
        };

        if let Some(settlement) = evaluate_redirect(&raw_url, redirect) {
            return settlement;
        }
    }
}

/// Check a navigated URL against the redirect target.
///
/// Non-matching and unparsable URLs (intermediate navigation inside the
/// login pages) do not settle; a matching URL settles on its `code` or
/// `error` parameter, code winning when both appear.
fn evaluate_redirect(raw_url: &str, redirect: &Url) -> Option<Settlement> {
    let url = Url::parse(raw_url).ok()?;
    if url.host_str() != redirect.host_str() || url.path() != redirect.path() {
        return None;
    }

    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(code) = code {
        Some(Settlement::Code(code))
    } else {
        error.map(Settlement::ProviderError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{Mutex, mpsc};

    struct ChannelSurface {
        events: mpsc::UnboundedReceiver<SurfaceEvent>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl BrowserSurface for ChannelSurface {
        async fn next_event(&mut self) -> Option<SurfaceEvent> {
            self.events.recv().await
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Hands out one scripted surface per `open` call.
    struct ChannelBrowser {
        surfaces: Mutex<Vec<ChannelSurface>>,
    }

    #[async_trait::async_trait]
    impl AuthBrowser for ChannelBrowser {
        async fn open(&self, _url: Url) -> Result<Box<dyn BrowserSurface>> {
            let surface = self
                .surfaces
                .lock()
                .await
                .pop()
                .expect("no surface scripted");
            Ok(Box::new(surface))
        }
    }

    fn scripted_browser() -> (ChannelBrowser, mpsc::UnboundedSender<SurfaceEvent>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let surface = ChannelSurface {
            events: rx,
            closed: closed.clone(),
        };
        let browser = ChannelBrowser {
            surfaces: Mutex::new(vec![surface]),
        };
        (browser, tx, closed)
    }

    fn acquirer_with_own_flag(config: AuthConfig) -> CodeAcquirer {
        let flag: &'static AtomicBool = Box::leak(Box::new(AtomicBool::new(false)));
        CodeAcquirer::with_flag(config, flag)
    }

    const REDIRECT_WITH_CODE: &str =
        "https://login.live.com/oauth20_desktop.srf?code=M.R3_ABC.def456";
    const REDIRECT_WITH_ERROR: &str =
        "https://login.live.com/oauth20_desktop.srf?error=access_denied";

    #[tokio::test]
    async fn code_in_redirect_settles_with_success() {
        let acquirer = acquirer_with_own_flag(AuthConfig::default());
        let (browser, tx, closed) = scripted_browser();

        tx.send(SurfaceEvent::DidNavigate(
            "https://login.microsoftonline.com/consumers/oauth2/v2.0/authorize?x=1".to_string(),
        ))
        .unwrap();
        tx.send(SurfaceEvent::WillNavigate(REDIRECT_WITH_CODE.to_string()))
            .unwrap();

        let auth_code = acquirer.acquire(&browser).await.unwrap();
        assert_eq!(auth_code.code, "M.R3_ABC.def456");
        assert_eq!(auth_code.verifier.len(), 43);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_load_of_the_redirect_still_delivers_the_code() {
        let acquirer = acquirer_with_own_flag(AuthConfig::default());
        let (browser, tx, _closed) = scripted_browser();

        tx.send(SurfaceEvent::LoadFailed(REDIRECT_WITH_CODE.to_string()))
            .unwrap();

        let auth_code = acquirer.acquire(&browser).await.unwrap();
        assert_eq!(auth_code.code, "M.R3_ABC.def456");
    }

    #[tokio::test]
    async fn error_in_redirect_settles_with_provider_error() {
        let acquirer = acquirer_with_own_flag(AuthConfig::default());
        let (browser, tx, closed) = scripted_browser();

        tx.send(SurfaceEvent::WillNavigate(REDIRECT_WITH_ERROR.to_string()))
            .unwrap();

        let result = acquirer.acquire(&browser).await;
        assert!(matches!(result, Err(AuthError::Provider(e)) if e == "access_denied"));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn closing_the_surface_cancels() {
        let acquirer = acquirer_with_own_flag(AuthConfig::default());
        let (browser, tx, _closed) = scripted_browser();

        tx.send(SurfaceEvent::DidNavigate(
            "https://login.microsoftonline.com/some/page".to_string(),
        ))
        .unwrap();
        tx.send(SurfaceEvent::ClosedByUser).unwrap();

        let result = acquirer.acquire(&browser).await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[tokio::test]
    async fn second_concurrent_login_fails_and_guard_clears_after_settlement() {
        let acquirer = Arc::new(acquirer_with_own_flag(AuthConfig::default()));
        let (browser, tx, _closed) = scripted_browser();

        let first = {
            let acquirer = acquirer.clone();
            tokio::spawn(async move { acquirer.acquire(&browser).await })
        };

        // Let the first attempt claim the flag
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (second_browser, _tx2, _) = scripted_browser();
        let second = acquirer.acquire(&second_browser).await;
        assert!(matches!(second, Err(AuthError::InProgress)));

        tx.send(SurfaceEvent::ClosedByUser).unwrap();
        let first = first.await.unwrap();
        assert!(matches!(first, Err(AuthError::Cancelled)));

        // Settled (even unsuccessfully): a new attempt is accepted again
        let (third_browser, tx3, _) = scripted_browser();
        tx3.send(SurfaceEvent::WillNavigate(REDIRECT_WITH_CODE.to_string()))
            .unwrap();
        assert!(acquirer.acquire(&third_browser).await.is_ok());
    }

    #[tokio::test]
    async fn stalled_surface_times_out() {
        let config = AuthConfig {
            interactive_timeout: Duration::from_millis(50),
            ..AuthConfig::default()
        };
        let acquirer = acquirer_with_own_flag(config);
        let (browser, _tx, closed) = scripted_browser();

        let result = acquirer.acquire(&browser).await;
        assert!(matches!(result, Err(AuthError::Timeout)));
        assert!(closed.load(Ordering::SeqCst));

        // The guard is released after a timeout too
        let (browser, tx, _) = scripted_browser();
        tx.send(SurfaceEvent::ClosedByUser).unwrap();
        assert!(matches!(
            acquirer.acquire(&browser).await,
            Err(AuthError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn redirect_without_code_or_error_keeps_waiting() {
        let acquirer = acquirer_with_own_flag(AuthConfig::default());
        let (browser, tx, _closed) = scripted_browser();

        tx.send(SurfaceEvent::DidNavigate(
            "https://login.live.com/oauth20_desktop.srf".to_string(),
        ))
        .unwrap();
        tx.send(SurfaceEvent::WillNavigate(REDIRECT_WITH_CODE.to_string()))
            .unwrap();

        let auth_code = acquirer.acquire(&browser).await.unwrap();
        assert_eq!(auth_code.code, "M.R3_ABC.def456");
    }

    #[test]
    fn authorize_url_carries_the_pkce_challenge() {
        let acquirer = acquirer_with_own_flag(AuthConfig::default());
        let url = acquirer.build_authorize_url("the-challenge").unwrap();

        let query: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(query["client_id"], crate::config::CLIENT_ID);
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["code_challenge"], "the-challenge");
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["prompt"], "select_account");
        assert_eq!(query["scope"], crate::config::SCOPES);
    }
}
