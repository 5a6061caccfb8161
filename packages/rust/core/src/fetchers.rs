//! The five field fetchers.
//!
//! Each fetcher resolves one [`ExtraField`] for one package and writes it to
//! the store. Nothing propagates past [`FieldFetchers::fetch`]: every result,
//! including a failed store write, is folded into a [`FieldOutcome`] and a log
//! event. A not-found answer from a source is expected: no write, no log.

use regex::Regex;
use tracing::{debug, warn};

use enricher_shared::{
    EnricherError, ExtraField, FieldKind, PackageDescriptor, RepoRef, Result,
};
use enricher_sources::{
    AttributeExtractor, HostingClient, OG_IMAGE_SELECTOR, RegistryClient, ScraperExtractor,
    SourceConfig,
};

use crate::store::FieldStore;

/// What happened to one field of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// A value was stored.
    Written,
    /// The source does not know the package or repository.
    NotFound,
    /// The source answered but declares no value.
    Unavailable,
    /// Transport, shape, or store failure. The stored value is untouched.
    Failed(String),
}

/// Shared clients and settings for every field fetcher.
pub struct FieldFetchers {
    registry: RegistryClient,
    hosting: HostingClient,
    extractor: Box<dyn AttributeExtractor>,
    avatar: Regex,
    runtime_field: String,
}

impl FieldFetchers {
    /// Build the fetchers. `avatar_pattern` matches cover images that are
    /// auto-generated and should be discarded.
    pub fn new(config: &SourceConfig, avatar_pattern: &str) -> Result<Self> {
        let avatar = Regex::new(avatar_pattern)
            .map_err(|e| EnricherError::config(format!("invalid avatar pattern: {e}")))?;

        Ok(Self {
            registry: RegistryClient::new(config)?,
            hosting: HostingClient::new(config)?,
            extractor: Box::new(ScraperExtractor),
            avatar,
            runtime_field: config.runtime_version_field.clone(),
        })
    }

    /// Replace the HTML attribute extractor.
    pub fn with_extractor(mut self, extractor: impl AttributeExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Fetch one field and store it. Never fails; see [`FieldOutcome`].
    pub async fn fetch(
        &self,
        kind: FieldKind,
        store: &dyn FieldStore,
        package_id: &str,
        descriptor: &PackageDescriptor,
    ) -> FieldOutcome {
        let result = match kind {
            FieldKind::UpdatedTime => self.updated_time(package_id, descriptor).await,
            FieldKind::RuntimeVersion => self.runtime_version(package_id, descriptor).await,
            FieldKind::StarCount => self.star_count(descriptor).await,
            FieldKind::CoverImageUrl => self.cover_image(descriptor).await,
            FieldKind::ReadmeText => self.readme_text(descriptor).await,
        };
        record(kind, store, package_id, result).await
    }

    async fn updated_time(
        &self,
        package_id: &str,
        descriptor: &PackageDescriptor,
    ) -> Result<Option<ExtraField>> {
        let doc = self
            .registry
            .fetch_document(descriptor.registry_name_or(package_id))
            .await?;
        Ok(Some(ExtraField::UpdatedTime(doc.latest_publish_time_ms()?)))
    }

    async fn runtime_version(
        &self,
        package_id: &str,
        descriptor: &PackageDescriptor,
    ) -> Result<Option<ExtraField>> {
        let doc = self
            .registry
            .fetch_document(descriptor.registry_name_or(package_id))
            .await?;
        Ok(doc
            .latest_runtime_version(&self.runtime_field)?
            .map(ExtraField::RuntimeVersion))
    }

    async fn star_count(&self, descriptor: &PackageDescriptor) -> Result<Option<ExtraField>> {
        let stars = self.hosting.repo_stars(&descriptor.primary_repo).await?;
        let total = stars.stars.saturating_add(stars.parent_stars.unwrap_or(0));
        Ok(Some(ExtraField::StarCount(total)))
    }

    async fn cover_image(&self, descriptor: &PackageDescriptor) -> Result<Option<ExtraField>> {
        let mut image = self.usable_image(&descriptor.primary_repo).await?;
        if image.is_empty() {
            if let Some(parent) = &descriptor.parent_repo {
                image = match self.usable_image(parent).await {
                    Ok(image) => image,
                    Err(e) if e.is_not_found() => String::new(),
                    Err(e) => return Err(e),
                };
            }
        }
        Ok(Some(ExtraField::CoverImageUrl(image)))
    }

    /// Social-preview image of a repository page, or `""` when the page has
    /// no image or only an auto-generated one. A missing page is `NotFound`.
    async fn usable_image(&self, repo: &RepoRef) -> Result<String> {
        let html = self.hosting.repo_page(repo).await?;

        let image = self
            .extractor
            .extract(&html, OG_IMAGE_SELECTOR, "content")?
            .unwrap_or_default();

        if self.avatar.is_match(&image) {
            debug!(repo = %repo, image = %image, "discarding generated cover image");
            return Ok(String::new());
        }
        Ok(image)
    }

    async fn readme_text(&self, descriptor: &PackageDescriptor) -> Result<Option<ExtraField>> {
        let text = self.hosting.readme(&descriptor.primary_repo).await?;
        Ok(Some(ExtraField::ReadmeText(text)))
    }
}

/// Store a fetch result and classify it.
async fn record(
    kind: FieldKind,
    store: &dyn FieldStore,
    package_id: &str,
    result: Result<Option<ExtraField>>,
) -> FieldOutcome {
    match result {
        Ok(Some(value)) => match store.set_field(package_id, &value).await {
            Ok(()) => {
                debug!(package_id, field = %kind, "field written");
                FieldOutcome::Written
            }
            Err(e) => {
                warn!(package_id, field = %kind, error = %e, "failed to store field");
                FieldOutcome::Failed(e.to_string())
            }
        },
        Ok(None) => {
            debug!(package_id, field = %kind, "source declares no value");
            FieldOutcome::Unavailable
        }
        Err(e) if e.is_not_found() => FieldOutcome::NotFound,
        Err(e) => {
            warn!(package_id, field = %kind, error = %e, "fetch failed");
            FieldOutcome::Failed(e.to_string())
        }
    }
}
