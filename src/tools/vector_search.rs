//! 向量检索：在预构建的语料快照上按余弦相似度取前 k 块
//!
//! 每块截断到 max_chunk_chars 字符，块之间以空行分隔。

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::EmbeddingProvider;
use crate::memory::VectorStore;
use crate::tools::retriever::{truncate_chars, Retriever};

/// 向量检索器：快照只读，可在多个会话间共享
pub struct VectorSearchRetriever {
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    max_chunk_chars: usize,
}

impl VectorSearchRetriever {
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        max_chunk_chars: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            max_chunk_chars,
        }
    }
}

#[async_trait]
impl Retriever for VectorSearchRetriever {
    fn name(&self) -> &str {
        "vector_search"
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<String, String> {
        if self.store.is_empty() {
            return Err("Corpus is empty".to_string());
        }
        // 空查询不是上游故障：没有可嵌入的内容，按无命中处理
        if query.trim().is_empty() {
            tracing::debug!(k, "empty query, no hits");
            return Ok(String::new());
        }
        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| format!("Embedding failed: {}", e))?;
        if query_embedding.is_empty() {
            return Err("Empty query embedding".to_string());
        }
        let results = self.store.search(&query_embedding, k);
        tracing::debug!(
            query = %query,
            k,
            hits = results.len(),
            top_score = results.first().map(|r| r.score).unwrap_or(0.0),
            "vector search"
        );
        Ok(results
            .iter()
            .map(|r| truncate_chars(&r.chunk.text, self.max_chunk_chars))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
