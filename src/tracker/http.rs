//! Bugzilla REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::TrackerConfig;
use crate::error::{AppError, AppResult};
use crate::tracker::client::TrackerClient;
use crate::tracker::types::{Bug, BugId, BugUpdate, Comment, HistoryEntry, SearchQuery};

const API_KEY_HEADER: &str = "X-BUGZILLA-API-KEY";

/// Fields requested on every bug read
const BUG_FIELDS: &str = "id,summary,status,resolution,severity,priority,product,component,\
                          assigned_to,creator,keywords,creation_time,last_change_time";

#[derive(Debug, Deserialize)]
struct BugsResponse {
    #[serde(default)]
    bugs: Vec<Bug>,
}

#[derive(Debug, Deserialize)]
struct HistoryBug {
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    bugs: Vec<HistoryBug>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: Option<String>,
}

pub struct HttpTrackerClient {
    http: reqwest::Client,
    base: Url,
    api_key: String,
    product: Option<String>,
}

impl HttpTrackerClient {
    pub fn new(config: &TrackerConfig) -> AppResult<Self> {
        let mut endpoint = config.endpoint.trim_end_matches('/').to_string();
        endpoint.push_str("/rest/");
        let base = Url::parse(&endpoint).map_err(|e| AppError::Validation {
            field: "tracker.endpoint".to_string(),
            reason: e.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("tracker-operator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;

        Ok(Self {
            http,
            base,
            api_key: config.api_key.clone(),
            product: config.product.clone(),
        })
    }

    fn url(&self, path: &str, params: &[(String, String)]) -> AppResult<Url> {
        let url = self
            .base
            .join(path)
            .map_err(|e| AppError::remote(path.to_string(), e))?;
        if params.is_empty() {
            return Ok(url);
        }
        Url::parse_with_params(url.as_str(), params).map_err(|e| AppError::remote(path.to_string(), e))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        if self.api_key.is_empty() {
            request
        } else {
            request.header(API_KEY_HEADER, &self.api_key)
        }
    }

    async fn send<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> AppResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::remote(operation, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::remote(operation, e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            return Err(AppError::remote(
                operation,
                anyhow::anyhow!("HTTP {}: {}", status.as_u16(), message),
            ));
        }

        // Bugzilla reports some failures with a 200 and an error flag
        if let Ok(ErrorBody { error: true, message }) = serde_json::from_str::<ErrorBody>(&body) {
            return Err(AppError::remote(
                operation,
                anyhow::anyhow!(message.unwrap_or_else(|| "unknown tracker error".to_string())),
            ));
        }

        serde_json::from_str(&body).map_err(|e| AppError::remote(operation, e))
    }

    fn search_params(&self, query: &SearchQuery) -> Vec<(String, String)> {
        let mut params = vec![("include_fields".to_string(), BUG_FIELDS.to_string())];
        let push_all = |params: &mut Vec<(String, String)>, key: &str, values: &[String]| {
            params.extend(values.iter().map(|v| (key.to_string(), v.clone())));
        };

        if let Some(product) = query.product.as_ref().or(self.product.as_ref()) {
            params.push(("product".to_string(), product.clone()));
        }
        push_all(&mut params, "component", &query.components);
        push_all(&mut params, "bug_status", &query.statuses);
        push_all(&mut params, "bug_severity", &query.severities);

        if !query.keywords.is_empty() {
            params.push(("keywords".to_string(), query.keywords.join(",")));
            params.push(("keywords_type".to_string(), "allwords".to_string()));
        }

        // Custom search terms for the remaining conditions
        let mut term = 1;
        let mut custom = |params: &mut Vec<(String, String)>, field: &str, op: &str, value: String| {
            params.push((format!("f{}", term), field.to_string()));
            params.push((format!("o{}", term), op.to_string()));
            params.push((format!("v{}", term), value));
            term += 1;
        };
        if !query.without_keywords.is_empty() {
            custom(&mut params, "keywords", "nowords", query.without_keywords.join(","));
        }
        if let Some(days) = query.changed_within_days {
            custom(&mut params, "delta_ts", "greaterthaneq", format!("-{}d", days));
        }
        if let Some(days) = query.unchanged_for_days {
            custom(&mut params, "delta_ts", "lessthan", format!("-{}d", days));
        }
        if let Some(days) = query.created_within_days {
            custom(&mut params, "creation_ts", "greaterthaneq", format!("-{}d", days));
        }

        params
    }
}

#[async_trait]
impl TrackerClient for HttpTrackerClient {
    async fn get_bug(&self, id: BugId) -> AppResult<Bug> {
        let operation = format!("get_bug({})", id);
        let url = self.url(
            &format!("bug/{}", id),
            &[("include_fields".to_string(), BUG_FIELDS.to_string())],
        )?;
        let response: BugsResponse = self.send(&operation, self.request(Method::GET, url)).await?;
        response.bugs.into_iter().next().ok_or_else(|| AppError::NotFound {
            entity: "Bug".to_string(),
            field: "id".to_string(),
            value: id.to_string(),
        })
    }

    async fn search(&self, query: &SearchQuery) -> AppResult<Vec<Bug>> {
        let url = self.url("bug", &self.search_params(query))?;
        let response: BugsResponse = self.send("search", self.request(Method::GET, url)).await?;
        tracing::debug!(count = response.bugs.len(), "Tracker search returned");
        Ok(response.bugs)
    }

    async fn get_comments(&self, id: BugId) -> AppResult<Vec<Comment>> {
        let operation = format!("get_comments({})", id);
        let url = self.url(&format!("bug/{}/comment", id), &[])?;
        let response: Value = self.send(&operation, self.request(Method::GET, url)).await?;

        // {"bugs": {"<id>": {"comments": [...]}}}
        let comments = response
            .get("bugs")
            .and_then(|bugs| bugs.get(id.to_string()))
            .and_then(|bug| bug.get("comments"))
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(comments).map_err(|e| AppError::remote(operation, e))
    }

    async fn get_history(&self, id: BugId) -> AppResult<Vec<HistoryEntry>> {
        let operation = format!("get_history({})", id);
        let url = self.url(&format!("bug/{}/history", id), &[])?;
        let response: HistoryResponse = self.send(&operation, self.request(Method::GET, url)).await?;
        Ok(response
            .bugs
            .into_iter()
            .next()
            .map(|bug| bug.history)
            .unwrap_or_default())
    }

    async fn update_bug(&self, id: BugId, update: &BugUpdate) -> AppResult<()> {
        let operation = format!("update_bug({})", id);
        let url = self.url(&format!("bug/{}", id), &[])?;

        let mut body = serde_json::Map::new();
        if let Some(status) = &update.status {
            body.insert("status".to_string(), json!(status));
        }
        if let Some(resolution) = &update.resolution {
            body.insert("resolution".to_string(), json!(resolution));
        }
        if !update.keywords_add.is_empty() || !update.keywords_remove.is_empty() {
            body.insert(
                "keywords".to_string(),
                json!({ "add": update.keywords_add, "remove": update.keywords_remove }),
            );
        }
        if let Some(comment) = &update.comment {
            body.insert("comment".to_string(), json!({ "body": comment }));
        }

        let request = self.request(Method::PUT, url).json(&Value::Object(body));
        let _: Value = self.send(&operation, request).await?;
        tracing::info!(bug_id = id, change = %update.describe(), "Updated bug");
        Ok(())
    }

    async fn add_comment(&self, id: BugId, text: &str) -> AppResult<()> {
        let operation = format!("add_comment({})", id);
        let url = self.url(&format!("bug/{}/comment", id), &[])?;
        let request = self.request(Method::POST, url).json(&json!({ "comment": text }));
        let _: Value = self.send(&operation, request).await?;
        tracing::info!(bug_id = id, "Commented on bug");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(product: Option<&str>) -> HttpTrackerClient {
        let config = TrackerConfig {
            endpoint: "https://bugzilla.example.com/".to_string(),
            product: product.map(str::to_string),
            ..Default::default()
        };
        HttpTrackerClient::new(&config).unwrap()
    }

    #[test]
    fn test_urls_are_rooted_at_rest() {
        let client = client(None);
        let url = client.url("bug/42/comment", &[]).unwrap();
        assert_eq!(url.as_str(), "https://bugzilla.example.com/rest/bug/42/comment");
    }

    #[test]
    fn test_search_params_use_configured_product() {
        let client = client(Some("Platform"));
        let query = SearchQuery::new()
            .components(["Storage"])
            .statuses(["NEW", "ASSIGNED"])
            .without_keyword("LifecycleStale")
            .unchanged_for_days(30);
        let params = client.search_params(&query);

        let has = |k: &str, v: &str| params.iter().any(|(pk, pv)| pk == k && pv == v);
        assert!(has("product", "Platform"));
        assert!(has("component", "Storage"));
        assert!(has("bug_status", "NEW"));
        assert!(has("bug_status", "ASSIGNED"));
        assert!(has("f1", "keywords"));
        assert!(has("o1", "nowords"));
        assert!(has("v2", "-30d"));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = TrackerConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };
        assert!(HttpTrackerClient::new(&config).is_err());
    }
}
