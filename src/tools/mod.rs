//! 检索工具：Retriever 抽象、语料向量检索、Google 网页检索

pub mod google_search;
pub mod retriever;
pub mod vector_search;

pub use google_search::GoogleSearchRetriever;
pub use retriever::Retriever;
pub use vector_search::VectorSearchRetriever;
