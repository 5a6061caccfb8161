//! Core domain types for the catalog enricher.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EnricherError, Result};

/// Opaque unique key for a catalog package (e.g. `com.foo.bar`).
pub type PackageId = String;

// ---------------------------------------------------------------------------
// RepoRef
// ---------------------------------------------------------------------------

/// A repository on the source-hosting service, `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Build a reference from its two path segments.
    ///
    /// Trailing `.git` and surrounding slashes are stripped. Returns `None`
    /// if either segment ends up empty.
    pub fn new(owner: &str, name: &str) -> Option<Self> {
        let owner = owner.trim().trim_matches('/');
        let name = name.trim().trim_matches('/').trim_end_matches(".git");
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Parse a repository reference from a URL-like string.
    ///
    /// Supports:
    /// - `owner/name`
    /// - `https://github.com/owner/name`
    /// - `git+https://github.com/owner/name.git`
    /// - `git@github.com:owner/name.git`
    /// - `github.com/owner/name`
    pub fn parse(input: &str) -> Option<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return None;
        }

        let raw = raw.strip_prefix("git+").unwrap_or(raw);

        if let Some(rest) = raw.strip_prefix("git@") {
            // SCP-like: git@host:owner/name(.git)
            let (_host, path) = rest.split_once(':')?;
            return Self::from_path(path);
        }

        // Bare `owner/name` has no host segment in front.
        if !raw.contains("://") && raw.split('/').filter(|s| !s.is_empty()).count() <= 2 {
            return Self::from_path(raw);
        }

        let url_str = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };

        let url = Url::parse(&url_str).ok()?;
        let mut segments = url.path_segments()?.filter(|seg| !seg.is_empty());
        let owner = segments.next()?;
        let name = segments.next()?;
        Self::new(owner, name)
    }

    fn from_path(path: &str) -> Option<Self> {
        let mut parts = path.trim().trim_matches('/').split('/');
        let owner = parts.next()?;
        let name = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Self::new(owner, name)
    }

    /// `owner/name` form used in API paths and logs.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = EnricherError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
            .ok_or_else(|| EnricherError::validation(format!("invalid repository reference '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// PackageDescriptor
// ---------------------------------------------------------------------------

/// Where a package's source lives and under which name it is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// The repository the package is built from.
    pub primary_repo: RepoRef,
    /// Fork origin, present only when `primary_repo` is a fork.
    pub parent_repo: Option<RepoRef>,
    /// Registry package name. `None` means the package id is used.
    pub registry_name: Option<String>,
}

impl PackageDescriptor {
    /// Name to query on the registry for package `id`.
    pub fn registry_name_or<'a>(&'a self, id: &'a str) -> &'a str {
        self.registry_name.as_deref().unwrap_or(id)
    }
}

// ---------------------------------------------------------------------------
// Extra fields
// ---------------------------------------------------------------------------

/// The five independently stored metadata fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    UpdatedTime,
    RuntimeVersion,
    StarCount,
    CoverImageUrl,
    ReadmeText,
}

impl FieldKind {
    /// Every kind, in the order fetchers run.
    pub const ALL: [FieldKind; 5] = [
        Self::UpdatedTime,
        Self::RuntimeVersion,
        Self::StarCount,
        Self::CoverImageUrl,
        Self::ReadmeText,
    ];

    /// Storage key for the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpdatedTime => "updated_time",
            Self::RuntimeVersion => "runtime_version",
            Self::StarCount => "star_count",
            Self::CoverImageUrl => "cover_image_url",
            Self::ReadmeText => "readme_text",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = EnricherError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| EnricherError::validation(format!("unknown field kind '{s}'")))
    }
}

/// A single stored field value for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    /// Publish time of the latest release, epoch milliseconds.
    UpdatedTime(i64),
    /// Minimum runtime version declared by the latest release.
    RuntimeVersion(String),
    /// Repository stars (including the fork parent's).
    StarCount(u64),
    /// Social-preview image URL; empty when the repo has none.
    CoverImageUrl(String),
    /// Raw README text.
    ReadmeText(String),
}

impl ExtraField {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::UpdatedTime(_) => FieldKind::UpdatedTime,
            Self::RuntimeVersion(_) => FieldKind::RuntimeVersion,
            Self::StarCount(_) => FieldKind::StarCount,
            Self::CoverImageUrl(_) => FieldKind::CoverImageUrl,
            Self::ReadmeText(_) => FieldKind::ReadmeText,
        }
    }

    /// Text form written to the store.
    pub fn encode(&self) -> String {
        match self {
            Self::UpdatedTime(ms) => ms.to_string(),
            Self::StarCount(n) => n.to_string(),
            Self::RuntimeVersion(s) | Self::CoverImageUrl(s) | Self::ReadmeText(s) => s.clone(),
        }
    }

    /// Inverse of [`ExtraField::encode`].
    pub fn decode(kind: FieldKind, raw: &str) -> Result<Self> {
        let bad_number = |e: std::num::ParseIntError| {
            EnricherError::Storage(format!("stored {kind} value '{raw}' is not a number: {e}"))
        };
        Ok(match kind {
            FieldKind::UpdatedTime => Self::UpdatedTime(raw.parse().map_err(bad_number)?),
            FieldKind::StarCount => Self::StarCount(raw.parse().map_err(bad_number)?),
            FieldKind::RuntimeVersion => Self::RuntimeVersion(raw.to_string()),
            FieldKind::CoverImageUrl => Self::CoverImageUrl(raw.to_string()),
            FieldKind::ReadmeText => Self::ReadmeText(raw.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Aggregated summary
// ---------------------------------------------------------------------------

/// Denormalized per-package summary consumed downstream.
///
/// `cover_image_url` and `updated_time` serialize as `null` when the field was
/// never resolved, which is distinct from `""` and `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRecord {
    pub stars: u64,
    pub runtime_version: String,
    pub cover_image_url: Option<String>,
    pub updated_time: Option<i64>,
}

/// The complete aggregated mapping, ordered by package id.
pub type AggregatedSummary = BTreeMap<PackageId, AggregatedRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_ref_from_short_form() {
        let r = RepoRef::parse("foo/bar").unwrap();
        assert_eq!(r.owner, "foo");
        assert_eq!(r.name, "bar");
        assert_eq!(r.full_name(), "foo/bar");
    }

    #[test]
    fn repo_ref_from_urls() {
        for input in [
            "https://github.com/foo/bar",
            "https://github.com/foo/bar.git",
            "git+https://github.com/foo/bar.git",
            "git@github.com:foo/bar.git",
            "github.com/foo/bar",
            "  https://github.com/foo/bar/tree/main  ",
        ] {
            assert_eq!(
                RepoRef::parse(input),
                RepoRef::new("foo", "bar"),
                "input: {input}"
            );
        }
    }

    #[test]
    fn repo_ref_rejects_garbage() {
        assert!(RepoRef::parse("").is_none());
        assert!(RepoRef::parse("   ").is_none());
        assert!(RepoRef::parse("just-a-name").is_none());
        assert!(RepoRef::parse("a/b/c").is_none());
        assert!("https://github.com/only-owner".parse::<RepoRef>().is_err());
    }

    #[test]
    fn field_kind_round_trips_through_storage_key() {
        for kind in FieldKind::ALL {
            assert_eq!(kind.as_str().parse::<FieldKind>().unwrap(), kind);
        }
        assert!("stars".parse::<FieldKind>().is_err());
    }

    #[test]
    fn numeric_fields_reject_non_numbers() {
        assert_eq!(
            ExtraField::decode(FieldKind::StarCount, "42").unwrap(),
            ExtraField::StarCount(42)
        );
        assert!(ExtraField::decode(FieldKind::StarCount, "-1").is_err());
        assert!(ExtraField::decode(FieldKind::UpdatedTime, "yesterday").is_err());
        // Empty cover image is a legitimate stored value.
        assert_eq!(
            ExtraField::decode(FieldKind::CoverImageUrl, "").unwrap(),
            ExtraField::CoverImageUrl(String::new())
        );
    }

    #[test]
    fn aggregated_record_uses_null_for_absent() {
        let record = AggregatedRecord {
            stars: 0,
            runtime_version: "1.0.0".into(),
            cover_image_url: None,
            updated_time: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["stars"], 0);
        assert_eq!(json["runtimeVersion"], "1.0.0");
        assert!(json["coverImageUrl"].is_null());
        assert!(json["updatedTime"].is_null());
    }

    #[test]
    fn descriptor_falls_back_to_package_id() {
        let desc = PackageDescriptor {
            primary_repo: RepoRef::new("foo", "bar").unwrap(),
            parent_repo: None,
            registry_name: None,
        };
        assert_eq!(desc.registry_name_or("com.foo.bar"), "com.foo.bar");

        let named = PackageDescriptor {
            registry_name: Some("foo-bar".into()),
            ..desc
        };
        assert_eq!(named.registry_name_or("com.foo.bar"), "foo-bar");
    }
}
