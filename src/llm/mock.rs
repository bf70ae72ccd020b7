//! Mock LLM 客户端（用于测试与离线演示，无需 API）
//!
//! 按顺序返回预置回复，并记录收到的每条提示词，便于断言规划循环交给 LLM 的内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// 脚本化 Mock 客户端：回复用完后返回错误
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条成功回复
    pub fn push_response(&self, text: impl Into<String>) {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(Ok(text.into()));
        }
    }

    /// 追加一次失败回复（模拟推理后端报错）
    pub fn push_failure(&self, error: impl Into<String>) {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(Err(error.into()));
        }
    }

    /// 已收到的提示词（按调用顺序）
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.clone())
            .unwrap_or_default();
        if let Ok(mut p) = self.prompts.lock() {
            p.push(last_user);
        }

        self.responses
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front()
            .unwrap_or_else(|| Err("mock script exhausted".to_string()))
    }
}
