//! 检索能力抽象
//!
//! 向量检索与网页检索都实现 Retriever：给定查询与 k，返回一段有界文本。
//! 上游故障（缺凭据、网络错误、空语料）必须返回 Err；真正没有命中时返回空字符串。

use async_trait::async_trait;

/// 检索 trait：无会话状态，结果只取决于 (query, k)
#[async_trait]
pub trait Retriever: Send + Sync {
    /// 名称（日志与 Action 描述使用）
    fn name(&self) -> &str;

    /// 执行检索
    async fn retrieve(&self, query: &str, k: usize) -> Result<String, String>;
}

/// 按字符截断（UTF-8 安全）
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
