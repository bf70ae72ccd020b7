//! Planner：思考提示词、检索查询提取、停止判断与最终合成提示词
//!
//! 只负责与 LLM 的交互和纯文本变换；步进与持久化由 loop_ 驱动。

use std::sync::Arc;

use crate::core::PlannerError;
use crate::llm::LlmClient;
use crate::profile::UserProfile;
use crate::react::trace::Trace;

/// 每步思考时追加的固定问题
pub const THOUGHT_INSTRUCTION: &str = "What should I find next to help this user?";

/// 模板化第一步使用的固定思考
pub const TEMPLATED_FIRST_THOUGHT: &str = "I should gather general licensing steps";

/// 出现即结束循环的短语（大小写不敏感）
pub const STOP_PHRASE: &str = "generate final roadmap";

/// 从思考中去掉的前导短语，按表顺序逐个尝试
const FILLER_PHRASES: &[&str] = &[
    "I should find",
    "I need to find",
    "I should search for",
    "I need to search for",
    "I should look up",
    "I need to look up",
];

/// 从思考文本得到检索查询：去掉前导套话并去首尾空白
///
/// 纯启发式：思考不符合套话模板时原样（去空白后）作为查询。
pub fn extract_action_query(thought: &str) -> String {
    let mut rest = thought.trim();
    for phrase in FILLER_PHRASES {
        if let Some(head) = rest.get(..phrase.len()) {
            if head.eq_ignore_ascii_case(phrase) {
                rest = rest[phrase.len()..].trim_start();
                break;
            }
        }
    }
    rest.trim().to_string()
}

/// 思考中是否包含结束短语
pub fn is_final_decision(thought: &str) -> bool {
    thought.to_lowercase().contains(STOP_PHRASE)
}

/// 思考提示词：已有轨迹逐行拼接 + 本步的固定问题
pub fn build_thought_prompt(trace: &Trace, step: usize) -> String {
    format!(
        "{}\nThought {}: {}",
        trace.render_lines().join("\n"),
        step,
        THOUGHT_INSTRUCTION
    )
}

/// 合成上下文：全部 Observation 行按步序以空行拼接
pub fn observation_context(trace: &Trace) -> String {
    trace.observation_lines().join("\n\n")
}

/// 最终合成提示词：档案字段 + 格式要求 + 检索上下文
pub fn build_synthesis_prompt(profile: &UserProfile, context: &str) -> String {
    format!(
        r#"You are a supportive and knowledgeable career integration coach helping skilled immigrants become licensed professionals in {jurisdiction}.

Using the following context gathered from official regulatory and licensing sources, write a personalized roadmap for the following person:

- Name: {name}
- Country: {country}
- Profession: {profession}
- Education: {education}
- Experience: {years} years
- Target jurisdiction: {jurisdiction}

INSTRUCTIONS:

1. Start with a friendly greeting like:
   "Hi {name}, as a {profession} from {country} with {years} years of experience and a {education} degree, I'm here to guide you through the process of becoming licensed in {jurisdiction}."

2. Then break the process into exactly three numbered phases, each with a clear title, and 3-5 bullet points inside each phase:
   - Use `### Phase 1: [Title]`
   - Use bullet points `•` for the steps

3. Avoid repetition such as naming the regulatory body in every step; assume it is understood.

4. End with a friendly suggestion:
   "Would you like me to generate a checklist or calendar roadmap to help you keep track?"

5. Keep the tone encouraging and informative.

6. Write the roadmap in {language}.

---
If there is any important URL in the context, include it.
If the context mentions costs or fees for any exam or application, state them; otherwise omit them.

Context:
==========
{context}
==========
"#,
        name = profile.name,
        country = profile.country,
        profession = profile.profession,
        education = profile.education_level,
        years = profile.years_experience,
        jurisdiction = profile.jurisdiction,
        language = profile.language.display_name(),
        context = context,
    )
}

/// Planner：持有推理后端，负责思考与最终合成两类调用
pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 基于已有轨迹决定本步要找什么
    pub async fn think(&self, trace: &Trace, step: usize) -> Result<String, PlannerError> {
        let prompt = build_thought_prompt(trace, step);
        tracing::debug!(step, prompt_chars = prompt.len(), "thought prompt");
        self.llm
            .generate(&prompt)
            .await
            .map_err(PlannerError::ReasoningFailure)
    }

    /// 基于档案与全部观察生成路线图
    pub async fn synthesize(
        &self,
        profile: &UserProfile,
        trace: &Trace,
    ) -> Result<String, PlannerError> {
        let prompt = build_synthesis_prompt(profile, &observation_context(trace));
        self.llm
            .generate(&prompt)
            .await
            .map_err(PlannerError::ReasoningFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Language;
    use crate::react::Session;

    fn profile() -> UserProfile {
        UserProfile {
            name: "Ana".into(),
            country: "Brazil".into(),
            profession: "Engineer".into(),
            education_level: "Master's".into(),
            years_experience: 7,
            jurisdiction: "Quebec".into(),
            language: Language::Fr,
        }
    }

    #[test]
    fn test_extract_strips_leading_phrase() {
        assert_eq!(
            extract_action_query("I should find the licensing exam fee"),
            "the licensing exam fee"
        );
        assert_eq!(
            extract_action_query("  I need to find   equivalency rules  "),
            "equivalency rules"
        );
        assert_eq!(
            extract_action_query("i should look up temporary permits"),
            "temporary permits"
        );
    }

    #[test]
    fn test_extract_leaves_unmatched_thoughts() {
        assert_eq!(
            extract_action_query("Next, I should find the fee"),
            "Next, I should find the fee"
        );
        assert_eq!(extract_action_query("   "), "");
        assert_eq!(extract_action_query("I should"), "I should");
    }

    #[test]
    fn test_stop_phrase_is_case_insensitive() {
        assert!(is_final_decision("Now I can Generate Final Roadmap."));
        assert!(!is_final_decision("I should find the final exam date"));
    }

    #[test]
    fn test_thought_prompt_renders_trace_then_question() {
        let mut session = Session::with_id("s");
        session.record_step("t1", "q1", "o1");
        assert_eq!(
            build_thought_prompt(session.trace(), 2),
            "Thought 1: t1\nAction 1: Search('q1')\nObservation 1: o1\nThought 2: What should I find next to help this user?"
        );
    }

    #[test]
    fn test_synthesis_prompt_contains_profile_and_context() {
        let prompt = build_synthesis_prompt(&profile(), "Observation 1: fees are $200");
        assert!(prompt.contains("- Name: Ana"));
        assert!(prompt.contains("- Experience: 7 years"));
        assert!(prompt.contains("- Target jurisdiction: Quebec"));
        assert!(prompt.contains("exactly three numbered phases"));
        assert!(prompt.contains("checklist or calendar roadmap"));
        assert!(prompt.contains("Write the roadmap in French."));
        assert!(prompt.contains("==========\nObservation 1: fees are $200\n=========="));
    }
}
