//! HTTP clients for the external metadata sources.
//!
//! This crate provides:
//! - [`registry`]: package registry JSON API (release versions, publish times)
//! - [`hosting`]: source-hosting JSON API (stars, README) and repository pages
//! - [`meta`]: narrow "extract attribute by selector" capability for HTML
//!
//! Every fetch maps an HTTP 404 to [`EnricherError::NotFound`] so callers can
//! treat it as an expected, silent outcome.

pub mod hosting;
pub mod meta;
pub mod registry;

use std::time::Duration;

use enricher_shared::{AppConfig, EnricherError, Result, resolve_token};
use reqwest::{Client, RequestBuilder, Response, StatusCode};

pub use hosting::{HostingClient, RepoStars};
pub use meta::{AttributeExtractor, OG_IMAGE_SELECTOR, ScraperExtractor};
pub use registry::{RegistryClient, RegistryDocument};

/// User-Agent string for all outbound requests.
const USER_AGENT: &str = concat!("catalog-enricher/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// SourceConfig
// ---------------------------------------------------------------------------

/// Endpoints and credentials for every source, resolved once and passed
/// explicitly into the clients.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Registry metadata API base URL.
    pub registry_url: String,
    /// Dotted path of the minimum runtime version inside a version object.
    pub runtime_version_field: String,
    /// Hosting JSON API base URL.
    pub hosting_api_url: String,
    /// Hosting web base URL (repository pages).
    pub hosting_web_url: String,
    /// Bearer token for the hosting API, if configured.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl SourceConfig {
    /// Resolve from the application config, reading the token from the
    /// env var it names.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            registry_url: config.registry.url.clone(),
            runtime_version_field: config.registry.runtime_version_field.clone(),
            hosting_api_url: config.hosting.api_url.clone(),
            hosting_web_url: config.hosting.web_url.clone(),
            token: resolve_token(config),
            timeout: Duration::from_secs(config.hosting.timeout_secs),
        }
    }

    /// Every source pointed at one base URL (mock servers in tests).
    pub fn for_base_url(base: &str) -> Self {
        Self {
            registry_url: base.to_string(),
            runtime_version_field: "app_min_version".into(),
            hosting_api_url: base.to_string(),
            hosting_web_url: base.to_string(),
            token: None,
            timeout: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
pub fn build_client(config: &SourceConfig) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(config.timeout)
        .build()
        .map_err(|e| EnricherError::Network(format!("failed to build HTTP client: {e}")))
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Send a request and classify the status: 404 → `NotFound`, other
/// non-success → `Network`.
pub(crate) async fn send_checked(request: RequestBuilder, url: &str) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| EnricherError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(EnricherError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(EnricherError::Network(format!("{url}: HTTP {status}")));
    }
    Ok(response)
}

/// Read a response body as text.
pub(crate) async fn read_text(response: Response, url: &str) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| EnricherError::Network(format!("{url}: failed to read body: {e}")))
}
