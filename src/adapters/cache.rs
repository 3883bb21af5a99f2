use crate::config::toml_config::CacheConfig;
use crate::domain::model::Profile;
use crate::domain::ports::ProfileCache;
use crate::utils::error::{DiscoveryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, Profile>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Profile)>,
    {
        Self {
            entries: Arc::new(RwLock::new(entries.into_iter().collect())),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, identifier: &str) -> bool {
        self.entries.read().await.contains_key(identifier)
    }
}

impl ProfileCache for InMemoryCache {
    async fn get(&self, identifier: &str) -> Result<Option<Profile>> {
        Ok(self.entries.read().await.get(identifier).cloned())
    }

    async fn put(&self, identifier: &str, profile: &Profile) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(identifier.to_string(), profile.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub profile: Profile,
    pub cached_at: DateTime<Utc>,
}

/// 以 JSON 檔保存的快取；每次寫入都會重寫整個檔案，不做過期處理
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl JsonFileCache {
    /// Loads the cache file if it exists; a missing file starts an empty cache.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();

        let entries = if path.exists() {
            let raw = std::fs::read(&path)?;
            if raw.is_empty() {
                HashMap::new()
            } else {
                serde_json::from_slice(&raw).map_err(|e| {
                    DiscoveryError::cache(format!("corrupt cache file {}: {}", path.display(), e))
                })?
            }
        } else {
            HashMap::new()
        };

        tracing::debug!("Opened profile cache {} ({} entries)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn entry(&self, identifier: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(identifier).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn persist(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let data = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }
}

impl ProfileCache for JsonFileCache {
    async fn get(&self, identifier: &str) -> Result<Option<Profile>> {
        Ok(self
            .entries
            .read()
            .await
            .get(identifier)
            .map(|entry| entry.profile.clone()))
    }

    async fn put(&self, identifier: &str, profile: &Profile) -> Result<()> {
        // 持有寫鎖直到檔案寫完，避免交錯寫入
        let mut entries = self.entries.write().await;
        entries.insert(
            identifier.to_string(),
            CacheEntry {
                profile: profile.clone(),
                cached_at: Utc::now(),
            },
        );
        self.persist(&entries).await
    }
}

/// Cache selected from `[cache]` configuration.
#[derive(Debug)]
pub enum CacheBackend {
    Disabled,
    Memory(InMemoryCache),
    File(JsonFileCache),
}

impl CacheBackend {
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::Disabled);
        }

        match &config.path {
            Some(path) => Ok(Self::File(JsonFileCache::open(path)?)),
            None => Ok(Self::Memory(InMemoryCache::new())),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Disabled => "disabled".to_string(),
            Self::Memory(_) => "in-memory".to_string(),
            Self::File(cache) => format!("file ({})", cache.path().display()),
        }
    }
}

impl ProfileCache for CacheBackend {
    async fn get(&self, identifier: &str) -> Result<Option<Profile>> {
        match self {
            Self::Disabled => Ok(None),
            Self::Memory(cache) => cache.get(identifier).await,
            Self::File(cache) => cache.get(identifier).await,
        }
    }

    async fn put(&self, identifier: &str, profile: &Profile) -> Result<()> {
        match self {
            Self::Disabled => Ok(()),
            Self::Memory(cache) => cache.put(identifier, profile).await,
            Self::File(cache) => cache.put(identifier, profile).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn profile(name: &str) -> Profile {
        Profile::from_json(serde_json::json!({ "name": name }))
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let cache = InMemoryCache::new();
        assert!(cache.get("ACLU").await.unwrap().is_none());

        cache.put("ACLU", &profile("ACLU")).await.unwrap();
        assert_eq!(cache.get("ACLU").await.unwrap(), Some(profile("ACLU")));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_file_cache_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("profiles.json");

        let cache = JsonFileCache::open(&path).unwrap();
        assert!(cache.is_empty().await);
        cache.put("Sierra Club", &profile("Sierra Club")).await.unwrap();
        assert!(path.exists());

        let reopened = JsonFileCache::open(&path).unwrap();
        assert_eq!(
            reopened.get("Sierra Club").await.unwrap(),
            Some(profile("Sierra Club"))
        );
        let entry = reopened.entry("Sierra Club").await.unwrap();
        assert!(entry.cached_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_cache_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("profiles.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = tokio_test::assert_err!(JsonFileCache::open(&path));
        assert!(matches!(err, DiscoveryError::CacheError { .. }));
    }

    #[tokio::test]
    async fn test_disabled_backend_never_hits() {
        let config = CacheConfig {
            enabled: false,
            path: None,
        };
        let cache = tokio_test::assert_ok!(CacheBackend::from_config(&config));
        cache.put("ACLU", &profile("ACLU")).await.unwrap();
        assert!(cache.get("ACLU").await.unwrap().is_none());
        assert_eq!(cache.describe(), "disabled");
    }
}
