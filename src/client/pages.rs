//! Client routes and page state.

use super::counter::Counter;
use super::probe::HealthProbe;

/// The three client routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// `/`: landing page.
    Home,
    /// `/app`: interactive page with the counter and health check.
    App,
    /// Any other path.
    NotFound,
}

impl Page {
    /// Resolve a location path to a page. Query and fragment are ignored, and
    /// a trailing slash is tolerated.
    pub fn resolve(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        match path.trim_end_matches('/') {
            "" => Self::Home,
            "/app" => Self::App,
            _ => Self::NotFound,
        }
    }

    /// Canonical path of the page, `None` for the catch-all.
    pub fn path(&self) -> Option<&'static str> {
        match self {
            Self::Home => Some("/"),
            Self::App => Some("/app"),
            Self::NotFound => None,
        }
    }
}

/// One mount of the `/app` page.
///
/// Holds the counter and the health message fetched at mount; both are
/// discarded when the page is dropped.
#[derive(Debug)]
pub struct AppPage {
    counter: Counter,
    health_message: String,
}

impl AppPage {
    /// Mount the page: fetch the health message once through `probe`.
    pub async fn mount(probe: &HealthProbe) -> Self {
        Self {
            counter: Counter::new(),
            health_message: probe.fetch_message().await,
        }
    }

    /// Handle a click on the counter button.
    pub fn click(&mut self) -> u64 {
        self.counter.increment()
    }

    /// Value currently displayed by the counter.
    pub fn count(&self) -> u64 {
        self.counter.value()
    }

    /// Health message or the fallback string.
    pub fn health_message(&self) -> &str {
        &self.health_message
    }
}
