//! Gemini 客户端（Google 提供的 OpenAI 兼容端点）
//!
//! - Base URL: https://generativelanguage.googleapis.com/v1beta/openai/
//! - 对话模型默认 gemini-2.5-flash，嵌入模型默认 text-embedding-004

use crate::llm::{OpenAiClient, OpenAiEmbedder};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_FLASH: &str = "gemini-2.5-flash";
pub const GEMINI_EMBEDDING: &str = "text-embedding-004";

/// 创建 Gemini 对话客户端
pub fn create_gemini_client(model: Option<&str>, api_key: &str, timeout_secs: u64) -> OpenAiClient {
    let model = model.unwrap_or(GEMINI_FLASH);
    OpenAiClient::new(Some(GEMINI_BASE_URL), model, api_key, timeout_secs)
}

/// 创建 Gemini 嵌入客户端
pub fn create_gemini_embedder(model: Option<&str>, api_key: &str) -> OpenAiEmbedder {
    let model = model.unwrap_or(GEMINI_EMBEDDING);
    OpenAiEmbedder::new(Some(GEMINI_BASE_URL), model, api_key)
}
