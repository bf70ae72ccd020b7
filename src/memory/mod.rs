//! 记忆层：LLM 消息、RAG 语料与向量存储、会话轨迹持久化

pub mod conversation;
pub mod persistence;
pub mod rag;

pub use conversation::{Message, Role};
pub use persistence::{InMemoryRecorder, JsonFileRecorder, SessionRecord, SessionRecorder};
pub use rag::{
    load_source_pages, Chunk, Chunker, ChunkingConfig, CorpusSnapshot, SourcePage, VectorStore,
};
