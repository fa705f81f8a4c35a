use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::core::config::OpenAiConfig;
use crate::core::models::cost::{CostSource, ModelCost};
use crate::core::models::record::DayWindow;
use crate::core::models::usage::{ModelUsage, ServiceUsage};
use crate::core::providers::fetch::{validate_endpoint, FetchFuture, ProviderUsage};
use crate::core::providers::{Provider, ProviderError, UsageProvider};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const USAGE_SERVICES: &[(&str, &str)] = &[
    ("completions", "/v1/organization/usage/completions"),
    ("embeddings", "/v1/organization/usage/embeddings"),
];
const COSTS_PATH: &str = "/v1/organization/costs";

// --- Response types ---

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<Bucket<T>>,
    next_page: Option<String>,
}

#[derive(Deserialize)]
struct Bucket<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Deserialize)]
struct UsageResult {
    model: Option<String>,
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    input_cached_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    num_model_requests: u64,
}

/// `value` can be a JSON number or a JSON string; both are accepted.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("amount out of f64 range")),
        serde_json::Value::String(s) => s.parse::<f64>().map_err(serde::de::Error::custom),
        serde_json::Value::Null => Ok(0.0),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string for amount, got {:?}",
            other
        ))),
    }
}

#[derive(Deserialize, Default)]
struct Amount {
    #[serde(deserialize_with = "deserialize_amount", default)]
    value: f64,
}

#[derive(Deserialize)]
struct CostResult {
    line_item: Option<String>,
    #[serde(default)]
    amount: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CostMetric {
    Input,
    Output,
    Cached,
}

/// Split a cost line item like `"gpt-4o-mini, cached input"` into model and
/// metric. Line items that are not token charges yield `None`.
fn parse_line_item(line_item: &str) -> Option<(String, CostMetric)> {
    let mut parts = line_item.split(',').map(str::trim).filter(|p| !p.is_empty());
    let model = parts.next()?;
    let metric = parts.next()?.to_lowercase();
    let metric = if metric.contains("cached") {
        CostMetric::Cached
    } else if metric.contains("input") {
        CostMetric::Input
    } else if metric.contains("output") {
        CostMetric::Output
    } else {
        return None;
    };
    Some((model.to_string(), metric))
}

fn collect_usage(service: &str, results: Vec<UsageResult>, into: &mut BTreeMap<String, ModelUsage>) {
    for r in results {
        let model = r
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        into.entry(model.clone())
            .or_insert_with(|| ModelUsage::new(model))
            .add_service(
                service,
                ServiceUsage {
                    input_tokens: r.input_tokens,
                    output_tokens: r.output_tokens,
                    cached_tokens: r.input_cached_tokens,
                    requests: r.num_model_requests,
                },
            );
    }
}

/// Sum token line items per model. Returns the dollars of line items that
/// are not token charges and therefore stay out of the record.
fn collect_costs(results: Vec<CostResult>, into: &mut BTreeMap<String, (f64, f64, f64)>) -> f64 {
    let mut skipped = 0.0;
    for r in results {
        let line_item = r.line_item.unwrap_or_default();
        let Some((model, metric)) = parse_line_item(&line_item) else {
            tracing::debug!(line_item = %line_item, amount = r.amount.value, "skipping non-token cost line item");
            skipped += r.amount.value;
            continue;
        };
        let entry = into.entry(model).or_insert((0.0, 0.0, 0.0));
        match metric {
            CostMetric::Input => entry.0 += r.amount.value,
            CostMetric::Output => entry.1 += r.amount.value,
            CostMetric::Cached => entry.2 += r.amount.value,
        }
    }
    skipped
}

// --- Provider ---

/// Primary provider: the OpenAI organization usage and costs APIs.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    admin_key: String,
    project_id: Option<String>,
}

fn read_key_file(path: &Path) -> Result<String, ProviderError> {
    let key = std::fs::read_to_string(path).map_err(|e| {
        ProviderError::auth(
            Provider::OpenAi,
            format!("admin key not found at {}: {}", path.display(), e),
        )
    })?;
    Ok(key.trim().to_string())
}

impl OpenAiProvider {
    pub fn from_config(config: &OpenAiConfig) -> Result<Self, ProviderError> {
        let admin_key = match (&config.admin_key, &config.admin_key_path) {
            (Some(key), _) => key.trim().to_string(),
            (None, Some(path)) => read_key_file(path)?,
            (None, None) => {
                return Err(ProviderError::auth(
                    Provider::OpenAi,
                    format!("no admin key configured ({})", Provider::OpenAi.auth_hint()),
                ))
            }
        };
        if admin_key.is_empty() {
            return Err(ProviderError::auth(Provider::OpenAi, "admin key is empty"));
        }

        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        validate_endpoint(&base_url, Provider::OpenAi)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ProviderError::unavailable(Provider::OpenAi, format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            admin_key,
            project_id: config.project_id.clone().filter(|p| !p.is_empty()),
        })
    }

    fn base_query(&self, window: &DayWindow) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("start_time", window.start.timestamp().to_string()),
            ("end_time", window.end.timestamp().to_string()),
            ("bucket_width", "1d".to_string()),
        ];
        if let Some(project) = &self.project_id {
            query.push(("project_ids", project.clone()));
        }
        query
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
        page: Option<&str>,
    ) -> Result<Page<T>, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&self.admin_key)
            .header("Accept", "application/json")
            .query(query);
        if let Some(cursor) = page {
            request = request.query(&[("page", cursor)]);
        }

        let response = request.send().await.map_err(|e| {
            ProviderError::unavailable(Provider::OpenAi, format!("request to {} failed: {}", path, e))
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::auth(
                Provider::OpenAi,
                format!("HTTP {} from {} - check the admin key", status.as_u16(), path),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::unavailable(
                Provider::OpenAi,
                format!("HTTP {} from {}: {}", status.as_u16(), path, body),
            ));
        }

        response.json::<Page<T>>().await.map_err(|e| {
            ProviderError::unavailable(Provider::OpenAi, format!("failed to parse {} response: {}", path, e))
        })
    }

    /// Follow `next_page` cursors until exhausted.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<Vec<T>, ProviderError> {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page: Page<T> = self.get_page(path, query, cursor.as_deref()).await?;
            for bucket in page.data {
                results.extend(bucket.results);
            }
            match page.next_page.filter(|p| !p.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(results)
    }

    async fn fetch_usage(&self, window: &DayWindow) -> Result<Vec<ModelUsage>, ProviderError> {
        let mut query = self.base_query(window);
        query.push(("group_by", "model".to_string()));
        query.push(("limit", "7".to_string()));

        let mut by_model = BTreeMap::new();
        for (service, path) in USAGE_SERVICES {
            let results: Vec<UsageResult> = self.get_all(path, &query).await?;
            collect_usage(service, results, &mut by_model);
        }
        Ok(by_model.into_values().collect())
    }

    async fn fetch_costs(
        &self,
        window: &DayWindow,
    ) -> Result<BTreeMap<String, ModelCost>, ProviderError> {
        let mut query = self.base_query(window);
        query.push(("group_by", "line_item".to_string()));
        query.push(("limit", "100".to_string()));

        let results: Vec<CostResult> = self.get_all(COSTS_PATH, &query).await?;
        let mut totals = BTreeMap::new();
        let skipped = collect_costs(results, &mut totals);
        if skipped > 0.0 {
            tracing::warn!(
                date = %window.label(),
                amount = skipped,
                "OpenAI spend outside token line items is not included in the record"
            );
        }
        Ok(totals
            .into_iter()
            .map(|(model, (input, output, cached))| {
                (model, ModelCost::new(input, output, cached, CostSource::Native))
            })
            .collect())
    }

    async fn fetch_day(&self, window: &DayWindow) -> Result<ProviderUsage, ProviderError> {
        let usage = self.fetch_usage(window).await?;
        let fetched = ProviderUsage::new(Provider::OpenAi, usage);

        match self.fetch_costs(window).await {
            Ok(costs) => Ok(fetched.with_native_costs(costs)),
            Err(e) => {
                tracing::warn!(date = %window.label(), error = %e, "OpenAI costs unavailable, pricing from table");
                Ok(fetched)
            }
        }
    }
}

impl UsageProvider for OpenAiProvider {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn fetch<'a>(&'a self, window: &'a DayWindow) -> FetchFuture<'a> {
        Box::pin(self.fetch_day(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_item_classifies_metrics() {
        assert_eq!(
            parse_line_item("gpt-4o-mini, input"),
            Some(("gpt-4o-mini".to_string(), CostMetric::Input))
        );
        assert_eq!(
            parse_line_item("gpt-4o-mini, cached input"),
            Some(("gpt-4o-mini".to_string(), CostMetric::Cached))
        );
        assert_eq!(
            parse_line_item(" gpt-5.1 , Output "),
            Some(("gpt-5.1".to_string(), CostMetric::Output))
        );
    }

    #[test]
    fn parse_line_item_rejects_non_token_items() {
        assert!(parse_line_item("web search tool calls").is_none());
        assert!(parse_line_item("gpt-4o, file search").is_none());
        assert!(parse_line_item("").is_none());
    }

    #[test]
    fn deserialize_usage_page() {
        let json = r#"{
            "object": "page",
            "data": [{
                "object": "bucket",
                "start_time": 1770422400,
                "end_time": 1770508800,
                "results": [
                    {"model": "gpt-5.1-codex-mini", "input_tokens": 18429385, "input_cached_tokens": 120000,
                     "output_tokens": 77666, "num_model_requests": 279},
                    {"model": null, "input_tokens": 10, "num_model_requests": 1}
                ]
            }],
            "has_more": false,
            "next_page": null
        }"#;
        let page: Page<UsageResult> = serde_json::from_str(json).unwrap();
        assert!(page.next_page.is_none());

        let mut by_model = BTreeMap::new();
        let results = page.data.into_iter().flat_map(|b| b.results).collect();
        collect_usage("completions", results, &mut by_model);

        let mini = &by_model["gpt-5.1-codex-mini"];
        assert_eq!(mini.input_tokens, 18_429_385);
        assert_eq!(mini.cached_tokens, 120_000);
        assert_eq!(mini.output_tokens, 77_666);
        assert_eq!(mini.requests, 279);
        assert_eq!(mini.services["completions"].requests, 279);
        assert_eq!(by_model["unknown"].input_tokens, 10);
    }

    #[test]
    fn usage_from_two_services_is_summed_per_model() {
        let mut by_model = BTreeMap::new();
        collect_usage(
            "completions",
            vec![UsageResult {
                model: Some("text-embedding-3-small".into()),
                input_tokens: 5,
                input_cached_tokens: 0,
                output_tokens: 0,
                num_model_requests: 1,
            }],
            &mut by_model,
        );
        collect_usage(
            "embeddings",
            vec![UsageResult {
                model: Some("text-embedding-3-small".into()),
                input_tokens: 500,
                input_cached_tokens: 0,
                output_tokens: 0,
                num_model_requests: 4,
            }],
            &mut by_model,
        );
        let u = &by_model["text-embedding-3-small"];
        assert_eq!(u.input_tokens, 505);
        assert_eq!(u.requests, 5);
        assert_eq!(u.services.len(), 2);
    }

    #[test]
    fn deserialize_cost_page_with_string_and_number_amounts() {
        let json = r#"{
            "data": [{
                "results": [
                    {"line_item": "gpt-5.1, input", "amount": {"value": 1.25, "currency": "usd"}},
                    {"line_item": "gpt-5.1, output", "amount": {"value": "0.5", "currency": "usd"}},
                    {"line_item": "gpt-5.1, cached input", "amount": {"value": 0.01, "currency": "usd"}},
                    {"line_item": "gpt-5.1, input", "amount": {"value": 0.25, "currency": "usd"}},
                    {"line_item": "web search", "amount": {"value": 9.0, "currency": "usd"}},
                    {"line_item": null}
                ]
            }],
            "next_page": "page_abc"
        }"#;
        let page: Page<CostResult> = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_page.as_deref(), Some("page_abc"));

        let mut totals = BTreeMap::new();
        let skipped =
            collect_costs(page.data.into_iter().flat_map(|b| b.results).collect(), &mut totals);
        assert!((skipped - 9.0).abs() < 1e-12);
        assert_eq!(totals.len(), 1);
        let (input, output, cached) = totals["gpt-5.1"];
        assert!((input - 1.5).abs() < 1e-12);
        assert!((output - 0.5).abs() < 1e-12);
        assert!((cached - 0.01).abs() < 1e-12);
    }

    #[test]
    fn from_config_requires_key() {
        let config = OpenAiConfig::default();
        let err = OpenAiProvider::from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::Auth { .. }));
    }

    #[test]
    fn from_config_rejects_plain_http() {
        let config = OpenAiConfig {
            admin_key: Some("sk-admin".into()),
            base_url: Some("http://localhost:8080".into()),
            ..Default::default()
        };
        assert!(OpenAiProvider::from_config(&config).is_err());
    }

    #[test]
    fn from_config_reads_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openai_admin_key");
        std::fs::write(&path, "sk-admin-from-file\n").unwrap();
        let config = OpenAiConfig {
            admin_key_path: Some(path),
            project_id: Some(String::new()),
            ..Default::default()
        };
        let provider = OpenAiProvider::from_config(&config).unwrap();
        assert_eq!(provider.admin_key, "sk-admin-from-file");
        assert!(provider.project_id.is_none());
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn base_query_includes_window_and_project() {
        let config = OpenAiConfig {
            admin_key: Some("sk-admin".into()),
            project_id: Some("proj_1".into()),
            ..Default::default()
        };
        let provider = OpenAiProvider::from_config(&config).unwrap();
        let window = DayWindow::utc(chrono::NaiveDate::from_ymd_opt(2026, 2, 7).unwrap());
        let query = provider.base_query(&window);
        assert!(query.contains(&("start_time", window.start.timestamp().to_string())));
        assert!(query.contains(&("end_time", (window.start.timestamp() + 86_400).to_string())));
        assert!(query.contains(&("project_ids", "proj_1".to_string())));
    }
}
