//! RAG 语料：分块、向量化、快照与检索
//!
//! 会话开始前一次性构建：抓取页面 -> 分块（字符数 + 重叠，按分隔符断开）-> 嵌入 -> 写入快照。
//! 会话期间只读快照，检索时仅对查询做一次嵌入。

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::llm::EmbeddingProvider;

/// 文档块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 块 ID
    pub id: String,
    /// 原始文本
    pub text: String,
    /// 来源文档 ID（页面 URL）
    pub source_id: String,
    /// 在原文档中的位置（字节偏移）
    pub offset: usize,
    /// 元数据（如 title）
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_id: source_id.into(),
            offset: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// 分块策略
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// 目标块大小（字符数）
    pub chunk_size: usize,
    /// 块之间的重叠（字符数）
    pub chunk_overlap: usize,
    /// 分隔符优先级（从高到低）
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ". ".to_string(),
                "! ".to_string(),
                "? ".to_string(),
                " ".to_string(),
            ],
        }
    }
}

/// 文档分块器
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// 将文档分割为块（UTF-8 安全）
    pub fn chunk(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        if total_chars == 0 || self.config.chunk_size == 0 {
            return chunks;
        }

        let mut current_idx = 0;
        let mut chunk_idx = 0;

        while current_idx < total_chars {
            let target_end = (current_idx + self.config.chunk_size).min(total_chars);
            let mut actual_end = target_end;

            // 不是文档末尾时，尝试在分隔符处断开
            if target_end < total_chars {
                let slice: String = chars[current_idx..target_end].iter().collect();
                for sep in &self.config.separators {
                    if let Some(pos) = slice.rfind(sep.as_str()) {
                        let chars_to_sep = slice[..pos].chars().count() + sep.chars().count();
                        // 断点太靠前时块会很碎，继续尝试更细的分隔符
                        if chars_to_sep > self.config.chunk_overlap {
                            actual_end = current_idx + chars_to_sep;
                            break;
                        }
                    }
                }
            }

            if actual_end <= current_idx {
                actual_end = (current_idx + 1).min(total_chars);
            }

            let chunk_text: String = chars[current_idx..actual_end].iter().collect();
            let trimmed = chunk_text.trim();

            if !trimmed.is_empty() {
                let byte_offset: usize = chars[..current_idx].iter().map(|c| c.len_utf8()).sum();
                chunks.push(
                    Chunk::new(format!("{}_{}", doc_id, chunk_idx), trimmed, doc_id)
                        .with_offset(byte_offset),
                );
                chunk_idx += 1;
            }

            if actual_end >= total_chars {
                break;
            }

            let overlap = self.config.chunk_overlap.min(actual_end - current_idx);
            let next_start = actual_end.saturating_sub(overlap);
            current_idx = if next_start > current_idx {
                next_start
            } else {
                actual_end
            };
        }

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}

/// 抓取得到的页面（语料源文件中的一条）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePage {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub text: String,
}

/// 读取页面列表 JSON：[{url, title, text}, ...]
pub fn load_source_pages(path: &Path) -> anyhow::Result<Vec<SourcePage>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("read source pages {}", path.display()))?;
    let pages: Vec<SourcePage> = serde_json::from_str(&data)
        .with_context(|| format!("parse source pages {}", path.display()))?;
    Ok(pages)
}

/// 快照中的一条：块 + 向量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// 预构建的语料快照
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    /// 构建时使用的嵌入模型（检索时须一致）
    #[serde(default)]
    pub embedding_model: String,
    pub entries: Vec<EmbeddedChunk>,
}

impl CorpusSnapshot {
    /// 分块并嵌入所有页面；任一块嵌入失败即返回错误
    pub async fn build(
        pages: &[SourcePage],
        chunker: &Chunker,
        embedder: &dyn EmbeddingProvider,
        embedding_model: &str,
    ) -> Result<Self, String> {
        let mut entries = Vec::new();
        for page in pages {
            for chunk in chunker.chunk(&page.url, &page.text) {
                let chunk = chunk.with_metadata("title", page.title.clone());
                let embedding = embedder.embed(&chunk.text).await?;
                if embedding.is_empty() {
                    return Err(format!("empty embedding for chunk {}", chunk.id));
                }
                entries.push(EmbeddedChunk { chunk, embedding });
            }
            tracing::debug!(url = %page.url, total = entries.len(), "page indexed");
        }
        Ok(Self {
            embedding_model: embedding_model.to_string(),
            entries,
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read corpus snapshot {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&data)
            .with_context(|| format!("parse corpus snapshot {}", path.display()))?;
        Ok(snapshot)
    }

    /// 写入快照；父目录不存在时自动创建
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(self)?)
            .with_context(|| format!("write corpus snapshot {}", path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 检索结果
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// 检索到的块
    pub chunk: Chunk,
    /// 相似度分数
    pub score: f32,
}

/// 只读向量存储（快照加载后不再修改，可跨会话共享）
pub struct VectorStore {
    entries: Vec<EmbeddedChunk>,
}

impl VectorStore {
    pub fn new(snapshot: CorpusSnapshot) -> Self {
        Self {
            entries: snapshot.entries,
        }
    }

    /// 按与查询向量的余弦相似度取前 k 个块（语料不少于 k 块时总是返回 k 条）
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<RetrievalResult> {
        let mut scored: Vec<(f32, &Chunk)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), &e.chunk))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(score, chunk)| RetrievalResult {
                chunk: chunk.clone(),
                score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 余弦相似度
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
