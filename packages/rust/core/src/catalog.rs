//! Package catalog: which packages exist and where their source lives.
//!
//! The pipeline only sees the [`Catalog`] trait. [`TomlCatalog`] is the
//! file-backed implementation used by the CLI:
//!
//! ```toml
//! [[packages]]
//! id = "com.foo.bar"
//! repository = "foo/bar"
//! parent_repository = "upstream/bar"   # forks only
//! registry_name = "foo-bar"            # defaults to id
//! ```

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use enricher_shared::{EnricherError, PackageDescriptor, PackageId, RepoRef, Result};

/// Enumerates known packages and loads their descriptors.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Every known package id, in catalog order.
    async fn list_all(&self) -> Result<Vec<PackageId>>;

    /// Whether `id` is a known package.
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Repository references for `id`.
    async fn load_descriptor(&self, id: &str) -> Result<PackageDescriptor>;
}

/// One `[[packages]]` entry as written in the catalog file.
#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    id: String,
    repository: String,
    #[serde(default)]
    parent_repository: Option<String>,
    #[serde(default)]
    registry_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    packages: Vec<CatalogEntry>,
}

/// Catalog loaded from a TOML file.
#[derive(Debug, Clone)]
pub struct TomlCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl TomlCatalog {
    /// Load a catalog file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EnricherError::io(path, e))?;
        Self::from_toml_str(&content).map_err(|e| match e {
            EnricherError::Catalog(msg) => {
                EnricherError::Catalog(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parse catalog TOML. Duplicate or empty ids are rejected.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| EnricherError::Catalog(format!("invalid catalog: {e}")))?;

        let mut index = HashMap::with_capacity(file.packages.len());
        for (pos, entry) in file.packages.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(EnricherError::Catalog(format!(
                    "package #{} has an empty id",
                    pos + 1
                )));
            }
            if index.insert(entry.id.clone(), pos).is_some() {
                return Err(EnricherError::Catalog(format!(
                    "duplicate package id '{}'",
                    entry.id
                )));
            }
        }

        Ok(Self {
            entries: file.packages,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Catalog for TomlCatalog {
    async fn list_all(&self) -> Result<Vec<PackageId>> {
        Ok(self.entries.iter().map(|e| e.id.clone()).collect())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.index.contains_key(id))
    }

    async fn load_descriptor(&self, id: &str) -> Result<PackageDescriptor> {
        let entry = self
            .index
            .get(id)
            .map(|&pos| &self.entries[pos])
            .ok_or_else(|| EnricherError::Catalog(format!("unknown package '{id}'")))?;

        let primary_repo: RepoRef = entry.repository.parse()?;
        let parent_repo = entry
            .parent_repository
            .as_deref()
            .map(str::parse::<RepoRef>)
            .transpose()?;

        Ok(PackageDescriptor {
            primary_repo,
            parent_repo,
            registry_name: entry.registry_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[[packages]]
id = "com.foo.bar"
repository = "foo/bar"

[[packages]]
id = "org.fork.plugin"
repository = "https://github.com/someone/plugin.git"
parent_repository = "original/plugin"
registry_name = "joplin-plugin-fork"

[[packages]]
id = "net.broken"
repository = "not a repo"
"#;

    #[tokio::test]
    async fn lists_in_file_order() {
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.list_all().await.unwrap(),
            vec!["com.foo.bar", "org.fork.plugin", "net.broken"]
        );
    }

    #[tokio::test]
    async fn existence_check() {
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        assert!(catalog.exists("com.foo.bar").await.unwrap());
        assert!(!catalog.exists("com.unknown").await.unwrap());
    }

    #[tokio::test]
    async fn loads_descriptors() {
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();

        let plain = catalog.load_descriptor("com.foo.bar").await.unwrap();
        assert_eq!(plain.primary_repo.full_name(), "foo/bar");
        assert!(plain.parent_repo.is_none());
        assert!(plain.registry_name.is_none());

        let fork = catalog.load_descriptor("org.fork.plugin").await.unwrap();
        assert_eq!(fork.primary_repo.full_name(), "someone/plugin");
        assert_eq!(fork.parent_repo.unwrap().full_name(), "original/plugin");
        assert_eq!(fork.registry_name.as_deref(), Some("joplin-plugin-fork"));
    }

    #[tokio::test]
    async fn bad_repository_fails_only_that_descriptor() {
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        assert!(catalog.load_descriptor("net.broken").await.is_err());
        assert!(catalog.load_descriptor("com.unknown").await.is_err());
    }

    #[test]
    fn rejects_duplicates() {
        let err = TomlCatalog::from_toml_str(
            r#"
[[packages]]
id = "a"
repository = "x/a"

[[packages]]
id = "a"
repository = "x/b"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate package id 'a'"));
    }

    #[test]
    fn empty_file_is_empty_catalog() {
        let catalog = TomlCatalog::from_toml_str("").unwrap();
        assert!(catalog.is_empty());
    }
}
