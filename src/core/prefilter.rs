use crate::domain::model::Profile;
use crate::domain::ports::ProfileCache;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    /// Position in the caller's input list.
    pub position: usize,
    pub identifier: String,
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheMiss {
    pub position: usize,
    pub identifier: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub hits: Vec<CacheHit>,
    pub misses: Vec<CacheMiss>,
}

impl Partition {
    pub fn miss_identifiers(&self) -> Vec<String> {
        self.misses.iter().map(|m| m.identifier.clone()).collect()
    }
}

/// 依快取將識別碼分成命中與未命中兩組，各自保持輸入順序。
///
/// Lookups run one at a time. A cache error counts as a miss.
pub async fn prefilter<C: ProfileCache>(identifiers: &[String], cache: &C) -> Partition {
    let mut partition = Partition::default();

    for (position, identifier) in identifiers.iter().enumerate() {
        match cache.get(identifier).await {
            Ok(Some(profile)) => partition.hits.push(CacheHit {
                position,
                identifier: identifier.clone(),
                profile,
            }),
            Ok(None) => partition.misses.push(CacheMiss {
                position,
                identifier: identifier.clone(),
            }),
            Err(e) => {
                tracing::warn!("⚠️ Cache lookup failed for '{}', treating as miss: {}", identifier, e);
                partition.misses.push(CacheMiss {
                    position,
                    identifier: identifier.clone(),
                });
            }
        }
    }

    tracing::debug!(
        "Cache prefilter: {} hits, {} misses",
        partition.hits.len(),
        partition.misses.len()
    );
    partition
}
