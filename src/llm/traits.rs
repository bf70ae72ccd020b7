//! LLM 客户端抽象（推理/生成能力）
//!
//! 所有后端（Gemini / OpenAI / DeepSeek 的 OpenAI 兼容端点、Mock）实现 LlmClient。
//! 规划循环只用 generate：一段提示词进，一段文本出。

use async_trait::async_trait;

use crate::memory::Message;

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 单条提示词生成，返回去掉首尾空白的文本
    async fn generate(&self, prompt: &str) -> Result<String, String> {
        let text = self.complete(&[Message::user(prompt)]).await?;
        Ok(text.trim().to_string())
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
