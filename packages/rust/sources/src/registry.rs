//! Package registry metadata API.
//!
//! The registry answers `GET {url}/{name}` with a document shaped like
//! `{ "dist-tags": { "latest": v }, "versions": { v: {..} }, "time": { v: ts } }`.
//! Both the updated-time and runtime-version fetchers read that same document.

use chrono::DateTime;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use enricher_shared::{EnricherError, Result};

use url::Url;

use crate::{SourceConfig, build_client, read_text, send_checked};

/// Client for the registry metadata API.
#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.registry_url.clone(),
        })
    }

    /// Fetch and parse the metadata document for a registry package name.
    ///
    /// Returns [`EnricherError::NotFound`] if the registry does not know the
    /// package.
    #[instrument(skip(self))]
    pub async fn fetch_document(&self, name: &str) -> Result<RegistryDocument> {
        let url = self.document_url(name)?;

        let response = send_checked(
            self.client
                .get(&url)
                .header("Accept", "application/json"),
            &url,
        )
        .await?;
        let body = read_text(response, &url).await?;
        debug!(bytes = body.len(), "registry document fetched");

        RegistryDocument::parse(&body)
    }

    /// `{base}/{name}` with `name` escaped as a single path segment, so a
    /// scoped name `@scope/pkg` becomes `@scope%2Fpkg`.
    fn document_url(&self, name: &str) -> Result<String> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            EnricherError::config(format!("invalid registry url '{}': {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                EnricherError::config(format!("registry url '{}' cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .push(name);
        Ok(url.into())
    }
}

/// A parsed registry metadata document.
#[derive(Debug, Clone)]
pub struct RegistryDocument {
    value: Value,
}

impl RegistryDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| EnricherError::parse(format!("registry response parse error: {e}")))?;
        if !value.is_object() {
            return Err(EnricherError::parse("registry response is not a JSON object"));
        }
        Ok(Self { value })
    }

    /// The version the `latest` dist-tag points to.
    pub fn latest_version(&self) -> Result<&str> {
        self.value
            .get("dist-tags")
            .and_then(|tags| tags.get("latest"))
            .and_then(Value::as_str)
            .ok_or_else(|| EnricherError::parse("dist-tags.latest missing"))
    }

    /// Publish time of the latest version, in epoch milliseconds.
    pub fn latest_publish_time_ms(&self) -> Result<i64> {
        let latest = self.latest_version()?;
        let raw = self
            .value
            .get("time")
            .and_then(|t| t.get(latest))
            .and_then(Value::as_str)
            .ok_or_else(|| EnricherError::parse(format!("time.{latest} missing")))?;

        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.timestamp_millis())
            .map_err(|e| EnricherError::parse(format!("time.{latest} '{raw}' is not RFC 3339: {e}")))
    }

    /// Minimum runtime version declared by the latest version.
    ///
    /// `field` is a dotted path inside the version object. `Ok(None)` when the
    /// version does not declare it; a non-string value is a shape error.
    pub fn latest_runtime_version(&self, field: &str) -> Result<Option<String>> {
        let latest = self.latest_version()?;
        let version = self
            .value
            .get("versions")
            .and_then(|v| v.get(latest))
            .filter(|v| v.is_object())
            .ok_or_else(|| EnricherError::parse(format!("versions.{latest} missing")))?;

        let found = field
            .split('.')
            .try_fold(version, |node, key| node.get(key));

        match found {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(other) => Err(EnricherError::parse(format!(
                "versions.{latest}.{field} is not a string: {other}"
            ))),
        }
    }
}
