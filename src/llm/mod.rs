//! LLM 层：客户端抽象与实现（Gemini / OpenAI / DeepSeek 的 OpenAI 兼容端点、Mock、重试包装）

pub mod deepseek;
pub mod embedding;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod retry;
pub mod traits;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT};
pub use embedding::{EmbeddingProvider, OpenAiEmbedder};
pub use gemini::{create_gemini_client, create_gemini_embedder, GEMINI_FLASH};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use retry::{RetryConfig, RetryingLlmClient};
pub use traits::LlmClient;
