use crate::config::toml_config::SourceConfig;
use crate::domain::model::{LookupResult, Profile};
use crate::domain::ports::ProfileLookup;
use crate::utils::error::{DiscoveryError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_IDENTIFIER_PARAM: &str = "name";
const DEFAULT_COST_FIELD: &str = "credits_used";
const ERROR_BODY_EXCERPT: usize = 200;

/// `ProfileLookup` backed by a remote research/discovery HTTP service.
///
/// GET sends the identifier as a query parameter, POST as a JSON body. A JSON
/// object response becomes the profile; the cost is read from `cost_field`.
pub struct HttpProfileLookup {
    client: Client,
    endpoint: String,
    method: Method,
    identifier_param: String,
    cost_field: String,
    profile_field: Option<String>,
    headers: HashMap<String, String>,
}

impl HttpProfileLookup {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            method: Method::GET,
            identifier_param: DEFAULT_IDENTIFIER_PARAM.to_string(),
            cost_field: DEFAULT_COST_FIELD.to_string(),
            profile_field: None,
            headers: HashMap::new(),
        }
    }

    pub fn from_config(source: &SourceConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(seconds) = source.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }

        let method = match source.method.as_deref() {
            Some(m) if m.eq_ignore_ascii_case("POST") => Method::POST,
            Some(m) if m.eq_ignore_ascii_case("GET") => Method::GET,
            None => Method::GET,
            Some(other) => {
                return Err(DiscoveryError::InvalidConfigValueError {
                    field: "source.method".to_string(),
                    value: other.to_string(),
                    reason: "Allowed values: GET, POST".to_string(),
                })
            }
        };

        Ok(Self {
            client: builder.build()?,
            endpoint: source.endpoint.clone(),
            method,
            identifier_param: source
                .identifier_param
                .clone()
                .unwrap_or_else(|| DEFAULT_IDENTIFIER_PARAM.to_string()),
            cost_field: source
                .cost_field
                .clone()
                .unwrap_or_else(|| DEFAULT_COST_FIELD.to_string()),
            profile_field: source.profile_field.clone(),
            headers: source.headers.clone().unwrap_or_default(),
        })
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_profile_field(mut self, field: impl Into<String>) -> Self {
        self.profile_field = Some(field.into());
        self
    }

    pub fn with_cost_field(mut self, field: impl Into<String>) -> Self {
        self.cost_field = field.into();
        self
    }

    fn parse_response(&self, identifier: &str, body: serde_json::Value) -> Result<LookupResult> {
        let serde_json::Value::Object(mut body) = body else {
            return Err(DiscoveryError::operation(
                identifier,
                "expected a JSON object in the response",
            ));
        };

        let cost = body
            .get(&self.cost_field)
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let profile = match &self.profile_field {
            Some(field) => body.remove(field).ok_or_else(|| {
                DiscoveryError::operation(identifier, format!("response has no '{}' field", field))
            })?,
            None => {
                body.remove(&self.cost_field);
                serde_json::Value::Object(body)
            }
        };

        Ok(LookupResult::new(Profile::from_json(profile), cost))
    }
}

#[async_trait]
impl ProfileLookup for HttpProfileLookup {
    async fn lookup(&self, identifier: &str) -> Result<LookupResult> {
        let mut request = self.client.request(self.method.clone(), &self.endpoint);

        request = if self.method == Method::POST {
            let mut payload = serde_json::Map::new();
            payload.insert(
                self.identifier_param.clone(),
                serde_json::Value::String(identifier.to_string()),
            );
            request.json(&payload)
        } else {
            request.query(&[(self.identifier_param.as_str(), identifier)])
        };

        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::debug!("📡 Looking up '{}' via {} {}", identifier, self.method, self.endpoint);
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::HttpStatusError {
                status: status.as_u16(),
                message: body.chars().take(ERROR_BODY_EXCERPT).collect(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        self.parse_response(identifier, body)
    }
}
