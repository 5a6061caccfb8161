//! Source-hosting service: JSON repository API and rendered repository pages.

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, instrument};

use enricher_shared::{EnricherError, RepoRef, Result};

use crate::{SourceConfig, build_client, join_url, read_text, send_checked};

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";

/// Star counts reported for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoStars {
    /// Stars on the repository itself.
    pub stars: u64,
    /// Stars on the fork parent, when the API reports one.
    pub parent_stars: Option<u64>,
}

/// Client for the hosting API and repository pages.
#[derive(Clone)]
pub struct HostingClient {
    client: Client,
    api_url: String,
    web_url: String,
    token: Option<String>,
}

impl HostingClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            api_url: config.hosting_api_url.clone(),
            web_url: config.hosting_web_url.clone(),
            token: config.token.clone(),
        })
    }

    /// Attach the bearer token when one is configured.
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    /// Fetch the star count of `repo` and of its fork parent, if any.
    #[instrument(skip_all, fields(repo = %repo))]
    pub async fn repo_stars(&self, repo: &RepoRef) -> Result<RepoStars> {
        let url = join_url(&self.api_url, &format!("repos/{}/{}", repo.owner, repo.name));
        let request = self.authorized(self.client.get(&url).header("Accept", ACCEPT_JSON));
        let response = send_checked(request, &url).await?;
        let body = read_text(response, &url).await?;
        parse_repo_stars(&body)
    }

    /// Fetch the raw README text of `repo`.
    #[instrument(skip_all, fields(repo = %repo))]
    pub async fn readme(&self, repo: &RepoRef) -> Result<String> {
        let url = join_url(
            &self.api_url,
            &format!("repos/{}/{}/readme", repo.owner, repo.name),
        );
        let request = self.authorized(self.client.get(&url).header("Accept", ACCEPT_RAW));
        let response = send_checked(request, &url).await?;
        let body = read_text(response, &url).await?;
        debug!(bytes = body.len(), "readme fetched");
        Ok(body)
    }

    /// Fetch the rendered HTML page of `repo`.
    #[instrument(skip_all, fields(repo = %repo))]
    pub async fn repo_page(&self, repo: &RepoRef) -> Result<String> {
        let url = join_url(&self.web_url, &format!("{}/{}", repo.owner, repo.name));
        let request = self.client.get(&url).header("Accept", "text/html");
        let response = send_checked(request, &url).await?;
        read_text(response, &url).await
    }
}

/// Parse the repository API response into star counts.
pub fn parse_repo_stars(text: &str) -> Result<RepoStars> {
    #[derive(Debug, Deserialize)]
    struct ParentResponse {
        stargazers_count: u64,
    }

    #[derive(Debug, Deserialize)]
    struct RepoResponse {
        stargazers_count: u64,
        #[serde(default)]
        parent: Option<ParentResponse>,
    }

    let parsed: RepoResponse = serde_json::from_str(text)
        .map_err(|e| EnricherError::parse(format!("repository response parse error: {e}")))?;

    Ok(RepoStars {
        stars: parsed.stargazers_count,
        parent_stars: parsed.parent.map(|p| p.stargazers_count),
    })
}
