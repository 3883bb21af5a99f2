use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::time::Duration;

/// 解析後的實體資料（組織、決策者等），內容對引擎不透明
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub data: HashMap<String, serde_json::Value>,
}

impl Profile {
    pub fn new(data: HashMap<String, serde_json::Value>) -> Self {
        Self { data }
    }

    /// Builds a profile from a JSON object; any other JSON value is stored under `value`.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(obj) => Self {
                data: obj.into_iter().collect(),
            },
            other => {
                let mut data = HashMap::new();
                data.insert("value".to_string(), other);
                Self { data }
            }
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

/// One successful remote lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub profile: Profile,
    /// Credits consumed by the remote service.
    pub cost: u64,
}

impl LookupResult {
    pub fn new(profile: Profile, cost: u64) -> Self {
        Self { profile, cost }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome<T> {
    Success(T),
    Failure(String),
}

impl<T> ItemOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(message) => Some(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult<T> {
    pub identifier: String,
    pub outcome: ItemOutcome<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedProfile {
    pub identifier: String,
    pub profile: Profile,
    pub cost: u64,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub identifier: String,
    pub error: String,
}

/// 批次最終結果，所有項目進入終止狀態後一次建立
#[derive(Debug, Clone, Serialize)]
pub struct BatchAggregateResult {
    pub successes: Vec<ResolvedProfile>,
    pub failures: Vec<BatchFailure>,
    #[serde(rename = "total_elapsed_ms", serialize_with = "serialize_millis")]
    pub total_elapsed: Duration,
    pub total_cost: u64,
}

impl BatchAggregateResult {
    pub fn total_items(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn cache_hits(&self) -> usize {
        self.successes.iter().filter(|s| s.cache_hit).count()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
