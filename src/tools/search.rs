//! Web search tool backed by SerpApi
//!
//! Picks the most direct answer available in a Google result page: answer
//! box, then knowledge graph, then the top organic snippets.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::ToolsConfig;
use crate::core::{AgentError, Result, ToolOutput};
use crate::tools::registry::Tool;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ORGANIC_RESULTS: usize = 3;

/// Google search through SerpApi
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    api_key: String,
    country: String,
    language: String,
}

impl WebSearchTool {
    /// Create the tool from the search settings in `config`
    pub fn from_config(api_key: impl Into<String>, config: &ToolsConfig) -> Result<Self> {
        let client = Client::builder().timeout(SEARCH_TIMEOUT).build()?;

        Ok(Self {
            client,
            endpoint: config.serpapi_url.clone(),
            api_key: api_key.into(),
            country: config.search_country.clone(),
            language: config.search_language.clone(),
        })
    }

    fn request_url(&self, query: &str) -> Result<url::Url> {
        url::Url::parse_with_params(
            &self.endpoint,
            &[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("gl", self.country.as_str()),
                ("hl", self.language.as_str()),
            ],
        )
        .map_err(|e| AgentError::config(format!("invalid SerpApi URL: {}", e)))
    }
}

/// Reduce a SerpApi response to the most direct answer it contains
pub fn summarize_results(results: &Value, query: &str) -> String {
    if let Some(list) = results.get("answer_box_list").and_then(|v| v.as_array()) {
        let lines: Vec<String> = list
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        return lines.join("\n");
    }

    if let Some(answer) = results
        .pointer("/answer_box/answer")
        .and_then(|v| v.as_str())
    {
        return answer.to_string();
    }

    if let Some(description) = results
        .pointer("/knowledge_graph/description")
        .and_then(|v| v.as_str())
    {
        return description.to_string();
    }

    if let Some(organic) = results
        .get("organic_results")
        .and_then(|v| v.as_array())
        .filter(|items| !items.is_empty())
    {
        return organic
            .iter()
            .take(MAX_ORGANIC_RESULTS)
            .enumerate()
            .map(|(i, item)| {
                let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("");
                let snippet = item.get("snippet").and_then(|v| v.as_str()).unwrap_or("");
                format!("[{}] {}\n{}", i + 1, title, snippet)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
    }

    format!("Sorry, no information was found for '{}'.", query)
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web with Google and return the most direct answer found."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::other("missing 'query' argument"))?;

        tracing::info!(query, "web_search");

        // The request URL carries the API key; keep it out of error text.
        let response = self
            .client
            .get(self.request_url(query)?)
            .send()
            .await
            .map_err(|e| AgentError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let results: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Http(e.without_url()))?;
        if let Some(error) = results.get("error").and_then(|v| v.as_str()) {
            return Ok(ToolOutput::failure(format!("SerpApi: {}", error)));
        }

        Ok(ToolOutput::Text(summarize_results(&results, query)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolCall;
    use crate::tools::ToolRegistry;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_answer_box_list_wins() {
        let results = json!({
            "answer_box_list": ["first", "second"],
            "answer_box": {"answer": "ignored"},
        });
        assert_eq!(summarize_results(&results, "q"), "first\nsecond");
    }

    #[test]
    fn test_answer_box_then_knowledge_graph() {
        let results = json!({
            "answer_box": {"answer": "42"},
            "knowledge_graph": {"description": "ignored"},
        });
        assert_eq!(summarize_results(&results, "q"), "42");

        let results = json!({
            "answer_box": {"title": "no answer field"},
            "knowledge_graph": {"description": "A computer architecture"},
        });
        assert_eq!(summarize_results(&results, "q"), "A computer architecture");
    }

    #[test]
    fn test_organic_results_top_three() {
        let results = json!({
            "organic_results": [
                {"title": "One", "snippet": "s1"},
                {"title": "Two"},
                {"title": "Three", "snippet": "s3"},
                {"title": "Four", "snippet": "s4"},
            ]
        });
        assert_eq!(
            summarize_results(&results, "q"),
            "[1] One\ns1\n\n[2] Two\n\n\n[3] Three\ns3"
        );
    }

    #[test]
    fn test_no_results() {
        let text = summarize_results(&json!({"organic_results": []}), "von neumann");
        assert!(text.contains("von neumann"));
    }

    #[tokio::test]
    async fn test_execute_against_mock_server() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("engine", "google"))
            .and(query_param("q", "rust language"))
            .and(query_param("api_key", "serp-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "knowledge_graph": {"description": "A systems programming language"}
            })))
            .mount(&mock_server)
            .await;

        let config = ToolsConfig {
            serpapi_url: format!("{}/search", mock_server.uri()),
            ..ToolsConfig::default()
        };
        let tool = WebSearchTool::from_config("serp-key", &config).unwrap();

        let output = tool.execute(json!({"query": "rust language"})).await.unwrap();
        assert_eq!(output, ToolOutput::text("A systems programming language"));
    }

    #[tokio::test]
    async fn test_execute_reports_api_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "Invalid API key."
            })))
            .mount(&mock_server)
            .await;

        let config = ToolsConfig {
            serpapi_url: format!("{}/search", mock_server.uri()),
            ..ToolsConfig::default()
        };
        let tool = WebSearchTool::from_config("bad", &config).unwrap();

        let output = tool.execute(json!({"query": "x"})).await.unwrap();
        assert_eq!(output, ToolOutput::failure("SerpApi: Invalid API key."));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_does_not_expose_api_key() {
        let config = ToolsConfig {
            serpapi_api_key: Some("SECRET-SERP-KEY".to_string()),
            serpapi_url: "http://127.0.0.1:9/search".to_string(),
            ..ToolsConfig::default()
        };
        let registry = ToolRegistry::with_builtin_tools(&config).unwrap();

        let call = ToolCall::new("c1", "web_search", json!({"query": "rust"}));
        let message = registry.execute(&call).await.unwrap_err().to_string();

        assert!(message.contains("web_search"));
        assert!(!message.contains("SECRET-SERP-KEY"));
        assert!(!message.contains("api_key"));
    }

    #[tokio::test]
    async fn test_malformed_body_does_not_expose_api_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let config = ToolsConfig {
            serpapi_url: format!("{}/search", mock_server.uri()),
            ..ToolsConfig::default()
        };
        let tool = WebSearchTool::from_config("SECRET-SERP-KEY", &config).unwrap();

        let err = tool.execute(json!({"query": "x"})).await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-SERP-KEY"));
    }
}
