//! 网页检索：Google Programmable Search JSON API
//!
//! GET {endpoint}?key=..&cx=..&q=..&num=..，带超时；结果渲染为 `标题 – 摘要 (链接)`，条目之间空行分隔。
//! 响应中没有 items 视为合法的空结果；非 2xx 状态返回错误。Key 不写入日志。

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::MAX_WEB_RESULTS;
use crate::tools::retriever::Retriever;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

/// 将搜索结果渲染为纯文本
fn render_items(items: &[SearchItem]) -> String {
    items
        .iter()
        .map(|it| format!("{} – {} ({})", it.title.trim(), it.snippet.trim(), it.link.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 解析 API 响应体
fn parse_response(body: &str) -> Result<String, String> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| format!("Invalid search response: {}", e))?;
    Ok(render_items(&parsed.items))
}

/// Google 自定义搜索检索器
pub struct GoogleSearchRetriever {
    client: Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
}

impl GoogleSearchRetriever {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| format!("HTTP client: {}", e))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
        })
    }
}

#[async_trait]
impl Retriever for GoogleSearchRetriever {
    fn name(&self) -> &str {
        "google_search"
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<String, String> {
        // 空 q 会被 API 以 400 拒绝；没有可搜的内容时直接视为无结果
        if query.trim().is_empty() {
            return Ok(String::new());
        }
        let num = k.clamp(1, MAX_WEB_RESULTS).to_string();
        tracing::info!(query = %query, num = %num, "web search");
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            // reqwest 的错误信息包含完整 URL（含 key），只保留类别
            .map_err(|e| {
                if e.is_timeout() {
                    "Search request timed out".to_string()
                } else {
                    "Search request failed".to_string()
                }
            })?;
        if !resp.status().is_success() {
            return Err(format!("Search API returned HTTP {}", resp.status()));
        }
        let body = resp
            .text()
            .await
            .map_err(|_| "Failed to read search response".to_string())?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_items() {
        let body = r#"{"items":[
            {"title":"OIQ Admission","snippet":"Steps to become an engineer.","link":"https://www.oiq.qc.ca/admission"},
            {"title":"Exam fees","snippet":"The exam costs $200.","link":"https://example.org/fees"}
        ]}"#;
        let out = parse_response(body).unwrap();
        assert_eq!(
            out,
            "OIQ Admission – Steps to become an engineer. (https://www.oiq.qc.ca/admission)\n\n\
             Exam fees – The exam costs $200. (https://example.org/fees)"
        );
    }

    #[test]
    fn test_missing_items_is_empty_result() {
        assert_eq!(parse_response(r#"{"kind":"customsearch#search"}"#).unwrap(), "");
    }

    #[test]
    fn test_malformed_body_is_error() {
        assert!(parse_response("<html>quota</html>").is_err());
    }

    #[test]
    fn test_new_builds_client() {
        let r = GoogleSearchRetriever::new("https://example.org/search", "k", "cx", 10).unwrap();
        assert_eq!(r.name(), "google_search");
    }

    #[tokio::test]
    async fn test_empty_query_skips_request() {
        // 端点不可达，若真的发出请求会返回错误
        let r = GoogleSearchRetriever::new("http://127.0.0.1:9/search", "k", "cx", 1).unwrap();
        assert_eq!(r.retrieve("  ", 5).await.unwrap(), "");
    }
}
