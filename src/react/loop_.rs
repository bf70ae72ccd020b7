//! 规划主循环
//!
//! Think -> Act (Retrieve) -> Observe -> Persist，每步一次；思考中出现结束短语或到达步数上限即停止，
//! 然后用全部观察合成最终路线图。步数上限固定为 5，循环不存在无界分支。
//! 推理或检索失败不重试，直接中止会话；此前每步已持久化的轨迹保留在记录器中。

use tokio::sync::mpsc::UnboundedSender;

use crate::config::{FirstStep, MAX_PLANNER_STEPS};
use crate::core::PlannerError;
use crate::memory::{SessionRecord, SessionRecorder};
use crate::profile::UserProfile;
use crate::react::planner::{extract_action_query, is_final_decision, TEMPLATED_FIRST_THOUGHT};
use crate::react::{Planner, ReactEvent, Session};
use crate::tools::Retriever;

/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 循环为何停止
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 思考中出现结束短语
    Decision,
    /// 到达步数上限
    Exhausted,
}

/// 循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    Running(usize),
    Done(StopReason),
}

/// 第 step 步结束后的状态转移
pub fn next_state(step: usize, thought: &str, max_steps: usize) -> PlannerState {
    if is_final_decision(thought) {
        PlannerState::Done(StopReason::Decision)
    } else if step >= max_steps {
        PlannerState::Done(StopReason::Exhausted)
    } else {
        PlannerState::Running(step + 1)
    }
}

/// 规划会话的依赖与参数
pub struct ReactSession<'a> {
    pub planner: &'a Planner,
    pub retriever: &'a dyn Retriever,
    pub recorder: &'a dyn SessionRecorder,
    /// 步数上限（不超过 MAX_PLANNER_STEPS）
    pub max_steps: usize,
    /// 每步检索条数
    pub k: usize,
    pub first_step: FirstStep,
    /// 可选：事件推送通道
    pub event_tx: Option<&'a UnboundedSender<ReactEvent>>,
}

impl<'a> ReactSession<'a> {
    /// 创建默认配置的 ReactSession：5 步、k=2、模板化第一步
    pub fn new(
        planner: &'a Planner,
        retriever: &'a dyn Retriever,
        recorder: &'a dyn SessionRecorder,
    ) -> Self {
        Self {
            planner,
            retriever,
            recorder,
            max_steps: MAX_PLANNER_STEPS,
            k: 2,
            first_step: FirstStep::Templated,
            event_tx: None,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.clamp(1, MAX_PLANNER_STEPS);
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn with_first_step(mut self, first_step: FirstStep) -> Self {
        self.first_step = first_step;
        self
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, ev: ReactEvent) {
        if let Some(t) = self.event_tx {
            let _ = t.send(ev);
        }
    }

    /// 写入快照；失败只记录，不中止循环
    fn persist(&self, record: &SessionRecord, errors: &mut Vec<String>) {
        match self.recorder.persist(record) {
            Ok(()) => self.send_event(ReactEvent::Persisted {
                history_len: record.history.len(),
            }),
            Err(e) => {
                let detail = PlannerError::PersistenceFailure(format!("{:#}", e)).to_string();
                tracing::warn!(session_id = %record.session_id, error = %detail, "session record not written");
                self.send_event(ReactEvent::PersistenceWarning {
                    detail: detail.clone(),
                });
                errors.push(detail);
            }
        }
    }
}

/// 会话结果
#[derive(Debug, Clone)]
pub struct PlannerOutcome {
    pub session_id: String,
    /// 最终路线图
    pub roadmap: String,
    /// 完整轨迹（含 Final Answer 行）
    pub history: Vec<String>,
    /// 执行的步数（1..=5）
    pub steps: usize,
    pub stop_reason: StopReason,
    /// 持久化失败信息；非空时磁盘上的轨迹可能不完整
    pub persistence_errors: Vec<String>,
}

impl PlannerOutcome {
    pub fn fully_persisted(&self) -> bool {
        self.persistence_errors.is_empty()
    }
}

/// 执行一次规划会话
pub async fn react_planner(
    session: &ReactSession<'_>,
    profile: &UserProfile,
) -> Result<PlannerOutcome, PlannerError> {
    let mut state_session = Session::new();
    let mut persistence_errors = Vec::new();
    let max_steps = session.max_steps.clamp(1, MAX_PLANNER_STEPS);
    tracing::info!(session_id = %state_session.id(), max_steps, retriever = session.retriever.name(), "planner session started");
    session.send_event(ReactEvent::SessionStarted {
        session_id: state_session.id().to_string(),
    });

    let mut state = PlannerState::Running(1);
    let stop_reason = loop {
        let step = match state {
            PlannerState::Running(step) => step,
            PlannerState::Done(reason) => break reason,
        };
        session.send_event(ReactEvent::StepUpdate { step, max_steps });

        // Think
        let (thought, query) = if step == 1 && session.first_step == FirstStep::Templated {
            (TEMPLATED_FIRST_THOUGHT.to_string(), profile.initial_query())
        } else {
            let thought = match session.planner.think(state_session.trace(), step).await {
                Ok(t) => t,
                Err(e) => return Err(abort(session, state_session.id(), step, e)),
            };
            let query = extract_action_query(&thought);
            (thought, query)
        };
        tracing::info!(step, thought = %thought, "thought");
        session.send_event(ReactEvent::Thought {
            step,
            text: thought.clone(),
        });
        session.send_event(ReactEvent::Action {
            step,
            query: query.clone(),
        });

        // Act
        let observation = match session.retriever.retrieve(&query, session.k).await {
            Ok(o) => o,
            Err(e) => {
                return Err(abort(
                    session,
                    state_session.id(),
                    step,
                    PlannerError::RetrievalFailure(e),
                ))
            }
        };
        let preview: String = observation.chars().take(OBSERVATION_PREVIEW_CHARS).collect();
        let preview = if observation.chars().count() > OBSERVATION_PREVIEW_CHARS {
            format!("{}...", preview)
        } else {
            preview
        };
        tracing::debug!(step, query = %query, observation = %preview, "observation");
        session.send_event(ReactEvent::Observation { step, preview });

        // Append & persist
        state_session.record_step(thought.clone(), query, observation);
        session.persist(&state_session.snapshot(profile), &mut persistence_errors);

        state = next_state(step, &thought, max_steps);
    };

    let steps = state_session.trace().steps();
    tracing::info!(steps, ?stop_reason, "planner loop finished, synthesizing roadmap");
    session.send_event(ReactEvent::Synthesizing {
        observations: steps,
    });

    let roadmap = match session.planner.synthesize(profile, state_session.trace()).await {
        Ok(r) => r,
        Err(e) => return Err(abort(session, state_session.id(), steps, e)),
    };

    let completed = state_session.finish(roadmap);
    session.persist(&completed.snapshot(profile), &mut persistence_errors);
    session.send_event(ReactEvent::FinalAnswer {
        text: completed.final_answer().to_string(),
    });

    let (prompt_tokens, completion_tokens, total_tokens) = session.planner.token_usage();
    tracing::info!(
        session_id = %completed.id(),
        steps,
        prompt_tokens,
        completion_tokens,
        total_tokens,
        "planner session completed"
    );

    Ok(PlannerOutcome {
        session_id: completed.id().to_string(),
        roadmap: completed.final_answer().to_string(),
        history: completed.trace().render_lines(),
        steps,
        stop_reason,
        persistence_errors,
    })
}

fn abort(session: &ReactSession<'_>, session_id: &str, step: usize, e: PlannerError) -> PlannerError {
    tracing::error!(session_id = %session_id, step, error = %e, "planner session aborted");
    session.send_event(ReactEvent::Error { text: e.to_string() });
    e
}
