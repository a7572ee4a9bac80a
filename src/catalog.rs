//! Catalog file I/O
//!
//! Every data file is pretty-printed JSON with two-space indentation and is
//! fully overwritten on save.

use crate::schema::{MetadataMap, ToolsFile};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_DATA_DIR: &str = "src/data";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize {}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Well-known file locations inside the data directory
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog(&self) -> PathBuf {
        self.root.join("tools.json")
    }

    pub fn split_dir(&self) -> PathBuf {
        self.root.join("tools")
    }

    pub fn metadata(&self) -> PathBuf {
        self.root.join("metadata.json")
    }

    pub fn slug_map(&self) -> PathBuf {
        self.root.join("slug-map.json")
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub async fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CatalogError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| CatalogError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    tokio::fs::write(path, json)
        .await
        .map_err(|source| CatalogError::Write {
            path: path.to_path_buf(),
            source,
        })
}

pub async fn load_catalog(path: &Path) -> Result<ToolsFile, CatalogError> {
    load_json(path).await
}

pub async fn save_catalog(path: &Path, catalog: &ToolsFile) -> Result<(), CatalogError> {
    save_json(path, catalog).await
}

/// Load the previous metadata cache. A missing or corrupt cache starts fresh.
pub async fn load_metadata_or_default(path: &Path) -> MetadataMap {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return MetadataMap::new();
    }
    match load_json(path).await {
        Ok(map) => map,
        Err(e) => {
            warn!("Could not read existing metadata, starting fresh: {e}");
            MetadataMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MetadataEntry;
    use tempfile::tempdir;

    #[test]
    fn test_data_paths() {
        let paths = DataPaths::new("data");
        assert_eq!(paths.catalog(), PathBuf::from("data/tools.json"));
        assert_eq!(paths.split_dir(), PathBuf::from("data/tools"));
        assert_eq!(paths.metadata(), PathBuf::from("data/metadata.json"));
        assert_eq!(paths.slug_map(), PathBuf::from("data/slug-map.json"));
    }

    #[tokio::test]
    async fn test_load_missing_catalog() {
        let dir = tempdir().unwrap();
        let err = load_catalog(&dir.path().join("tools.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
        assert!(err.to_string().starts_with("Failed to read"));
    }

    #[tokio::test]
    async fn test_load_malformed_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tools.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_catalog(&path).await.unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_save_is_two_space_pretty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tools.json");
        save_catalog(&path, &ToolsFile::default()).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\n  \"tools\": []\n}");
    }

    #[tokio::test]
    async fn test_metadata_missing_or_corrupt_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        assert!(load_metadata_or_default(&path).await.is_empty());

        std::fs::write(&path, "[1, 2").unwrap();
        assert!(load_metadata_or_default(&path).await.is_empty());

        let mut map = MetadataMap::new();
        map.insert(
            "a".to_string(),
            MetadataEntry {
                slug: "a".to_string(),
                title: Some("A".to_string()),
                ..Default::default()
            },
        );
        save_json(&path, &map).await.unwrap();
        assert_eq!(load_metadata_or_default(&path).await, map);
    }
}
