//! 规划器错误类型
//!
//! MissingCredential 在任何会话工作开始前即失败；RetrievalFailure / ReasoningFailure 中止当前会话，
//! 已持久化的轨迹保留供事后查看；PersistenceFailure 只记录并告知调用方，不中止循环。

use thiserror::Error;

/// 规划会话运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum PlannerError {
    /// 检索或推理后端未配置凭据
    #[error("Missing credential for {backend}: set {variable}")]
    MissingCredential {
        backend: &'static str,
        variable: &'static str,
    },

    #[error("Retrieval failed: {0}")]
    RetrievalFailure(String),

    #[error("Reasoning failed: {0}")]
    ReasoningFailure(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailure(String),

    #[error("Config error: {0}")]
    Config(String),

    /// 语料快照缺失、为空或格式错误
    #[error("Corpus error: {0}")]
    Corpus(String),
}

impl PlannerError {
    /// 是否在会话开始前就应终止（配置类错误）
    pub fn is_fatal_setup(&self) -> bool {
        matches!(
            self,
            PlannerError::MissingCredential { .. } | PlannerError::Config(_) | PlannerError::Corpus(_)
        )
    }
}
