//! 会话与轨迹
//!
//! 轨迹只追加：每步一次性写入 Thought -> Action -> Observation 三条，步号从 1 连续递增；
//! 会话结束时追加唯一的 Final Answer，随后会话只读。

use crate::memory::SessionRecord;
use crate::profile::UserProfile;

/// 轨迹条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEntry {
    Thought { step: usize, text: String },
    Action { step: usize, query: String },
    Observation { step: usize, text: String },
    FinalAnswer { text: String },
}

impl TraceEntry {
    /// 渲染为持久化与提示词中使用的文本行
    pub fn render(&self) -> String {
        match self {
            TraceEntry::Thought { step, text } => format!("Thought {}: {}", step, text),
            TraceEntry::Action { step, query } => format!("Action {}: Search('{}')", step, query),
            TraceEntry::Observation { step, text } => format!("Observation {}: {}", step, text),
            TraceEntry::FinalAnswer { text } => format!("Final Answer:\n{}", text),
        }
    }
}

/// 有序、只追加的轨迹
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    entries: Vec<TraceEntry>,
    steps: usize,
}

impl Trace {
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// 已完成的 Thought/Action/Observation 三元组数量
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn render_lines(&self) -> Vec<String> {
        self.entries.iter().map(TraceEntry::render).collect()
    }

    /// 全部 Observation 的渲染行（按步序）
    pub fn observation_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| matches!(e, TraceEntry::Observation { .. }))
            .map(TraceEntry::render)
            .collect()
    }

    fn push_step(&mut self, thought: String, query: String, observation: String) -> usize {
        let step = self.steps + 1;
        self.entries.push(TraceEntry::Thought { step, text: thought });
        self.entries.push(TraceEntry::Action { step, query });
        self.entries.push(TraceEntry::Observation {
            step,
            text: observation,
        });
        self.steps = step;
        step
    }
}

/// 进行中的会话：持有 ID 与轨迹
#[derive(Debug)]
pub struct Session {
    id: String,
    trace: Trace,
}

impl Session {
    /// 新会话，ID 为随机 UUID
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            trace: Trace::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// 追加一步完整三元组，返回该步步号
    pub fn record_step(
        &mut self,
        thought: impl Into<String>,
        query: impl Into<String>,
        observation: impl Into<String>,
    ) -> usize {
        self.trace
            .push_step(thought.into(), query.into(), observation.into())
    }

    pub fn snapshot(&self, profile: &UserProfile) -> SessionRecord {
        SessionRecord::new(self.id.clone(), profile.clone(), self.trace.render_lines())
    }

    /// 追加 Final Answer 并结束会话
    pub fn finish(mut self, answer: impl Into<String>) -> CompletedSession {
        let answer = answer.into();
        self.trace.entries.push(TraceEntry::FinalAnswer {
            text: answer.clone(),
        });
        CompletedSession {
            id: self.id,
            trace: self.trace,
            answer,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// 已结束的会话：只读，仅供审计与日志
#[derive(Debug)]
pub struct CompletedSession {
    id: String,
    trace: Trace,
    answer: String,
}

impl CompletedSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn final_answer(&self) -> &str {
        &self.answer
    }

    pub fn snapshot(&self, profile: &UserProfile) -> SessionRecord {
        SessionRecord::new(self.id.clone(), profile.clone(), self.trace.render_lines())
    }
}
