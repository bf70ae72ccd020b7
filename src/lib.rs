//! Roadmap - 技术移民执业认证路线规划智能体
//!
//! 模块划分：
//! - **agent**: 无头运行时，按配置与凭据构建组件并执行会话
//! - **config**: 应用配置加载（TOML + 环境变量）与凭据
//! - **core**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（Gemini / OpenAI / DeepSeek / Mock）、嵌入、重试包装
//! - **memory**: LLM 消息、RAG 语料与向量存储、会话轨迹持久化
//! - **profile**: 用户档案
//! - **react**: 会话轨迹、Planner、有界规划主循环
//! - **tools**: 检索能力（语料向量检索 / Google 网页检索）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod profile;
pub mod react;
pub mod tools;

pub use agent::{build_components, PlannerComponents};
pub use crate::core::PlannerError;
pub use profile::{Language, UserProfile};
pub use react::{react_planner, PlannerOutcome, ReactSession};
