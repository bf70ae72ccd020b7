//! 规划过程事件：供 CLI / 前端展示每一步的思考、检索与观察

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 会话开始
    SessionStarted { session_id: String },
    /// 进入第几步
    StepUpdate { step: usize, max_steps: usize },
    /// 本步思考
    Thought { step: usize, text: String },
    /// 本步检索查询
    Action { step: usize, query: String },
    /// 检索返回（预览，避免过长）
    Observation { step: usize, preview: String },
    /// 轨迹已写入记录器
    Persisted { history_len: usize },
    /// 持久化失败：磁盘上的轨迹可能不完整
    PersistenceWarning { detail: String },
    /// 开始最终合成
    Synthesizing { observations: usize },
    /// 最终路线图
    FinalAnswer { text: String },
    /// 会话中止
    Error { text: String },
}
