//! 认知层：会话轨迹、Planner、有界规划主循环

pub mod events;
pub mod loop_;
pub mod planner;
pub mod trace;

pub use events::ReactEvent;
pub use loop_::{next_state, react_planner, PlannerOutcome, PlannerState, ReactSession, StopReason};
pub use planner::{extract_action_query, is_final_decision, Planner};
pub use trace::{CompletedSession, Session, Trace, TraceEntry};
