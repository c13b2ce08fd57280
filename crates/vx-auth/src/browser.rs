use url::Url;

use crate::errors::Result;

/// Event observed on an open browser surface.
///
/// The three URL-bearing variants are treated identically by the acquirer:
/// a redirect to the OAuth desktop endpoint often fails to load, but its
/// URL still carries the authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    WillNavigate(String),
    DidNavigate(String),
    LoadFailed(String),
    ClosedByUser,
}

/// One open, isolated browsing context.
#[async_trait::async_trait]
pub trait BrowserSurface: Send {
    /// Next navigation event, or `None` once the surface is gone.
    async fn next_event(&mut self) -> Option<SurfaceEvent>;

    /// Close the surface programmatically. Must be idempotent.
    async fn close(&mut self);
}

/// Opens embedded browser surfaces for interactive login.
///
/// Implemented by the window shell; the surface must be a non-privileged
/// browsing context that reports every navigation, redirect and failed
/// load with the target URL.
#[async_trait::async_trait]
pub trait AuthBrowser: Send + Sync {
    async fn open(&self, url: Url) -> Result<Box<dyn BrowserSurface>>;
}
