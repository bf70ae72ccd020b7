//! 规划循环集成测试：脚本化的 LLM 与检索替身

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use roadmap::config::FirstStep;
    use roadmap::llm::{EmbeddingProvider, MockLlmClient};
    use roadmap::memory::rag::EmbeddedChunk;
    use roadmap::memory::{
        Chunk, CorpusSnapshot, InMemoryRecorder, JsonFileRecorder, SessionRecord, SessionRecorder,
        VectorStore,
    };
    use roadmap::react::{Planner, ReactEvent, StopReason};
    use roadmap::tools::{Retriever, VectorSearchRetriever};
    use roadmap::{react_planner, Language, PlannerError, ReactSession, UserProfile};

    /// 按顺序返回预置观察，并记录查询
    #[derive(Default)]
    struct ScriptedRetriever {
        responses: Mutex<VecDeque<Result<String, String>>>,
        queries: Mutex<Vec<(String, usize)>>,
    }

    impl ScriptedRetriever {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|r| Ok(r.to_string())).collect()),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn fail_next(&self, error: &str) {
            self.responses.lock().unwrap().push_front(Err(error.to_string()));
        }

        fn fail_after(&self, error: &str) {
            self.responses.lock().unwrap().push_back(Err(error.to_string()));
        }

        fn queries(&self) -> Vec<(String, usize)> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Retriever for ScriptedRetriever {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn retrieve(&self, query: &str, k: usize) -> Result<String, String> {
            self.queries.lock().unwrap().push((query.to_string(), k));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    /// 永远写入失败的记录器
    struct BrokenRecorder;

    impl SessionRecorder for BrokenRecorder {
        fn persist(&self, _record: &SessionRecord) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    /// 与 OpenAI 兼容嵌入一致：空文本得到空向量，其余文本映射到固定方向
    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
            if text.trim().is_empty() {
                Ok(vec![])
            } else {
                Ok(vec![1.0, 0.0])
            }
        }
    }

    fn profile() -> UserProfile {
        UserProfile {
            name: "Ana".into(),
            country: "Brazil".into(),
            profession: "Engineer".into(),
            education_level: "Master's".into(),
            years_experience: 7,
            jurisdiction: "Quebec".into(),
            language: Language::En,
        }
    }

    fn context_block(prompt: &str) -> &str {
        let start = prompt.find("==========\n").unwrap() + "==========\n".len();
        let end = prompt.rfind("\n==========").unwrap();
        &prompt[start..end]
    }

    #[tokio::test]
    async fn test_stops_on_final_roadmap_phrase() {
        let llm = Arc::new(MockLlmClient::new([
            "I should find the licensing exam fee",
            "I have enough. Generate final roadmap.",
            "Hi Ana, here is your roadmap",
        ]));
        let planner = Planner::new(llm.clone());
        let retriever = ScriptedRetriever::new(&["general steps", "fee is $200", "more"]);
        let recorder = InMemoryRecorder::new();

        let outcome = react_planner(&ReactSession::new(&planner, &retriever, &recorder), &profile())
            .await
            .unwrap();

        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.stop_reason, StopReason::Decision);
        assert_eq!(outcome.roadmap, "Hi Ana, here is your roadmap");
        assert_eq!(llm.call_count(), 3);

        let queries: Vec<String> = retriever.queries().into_iter().map(|(q, _)| q).collect();
        assert_eq!(
            queries,
            vec![
                profile().initial_query(),
                "the licensing exam fee".to_string(),
                "I have enough. Generate final roadmap.".to_string(),
            ]
        );
        assert!(retriever.queries().iter().all(|(_, k)| *k == 2));

        // 每步一个完整三元组，最后一次写入多一条 Final Answer
        assert_eq!(recorder.history_lengths(), vec![3, 6, 9, 10]);
        let record = recorder.get(&outcome.session_id).unwrap();
        assert_eq!(record.history, outcome.history);
        assert_eq!(record.history[0], "Thought 1: I should gather general licensing steps");
        assert_eq!(record.history[4], "Action 2: Search('the licensing exam fee')");
        assert_eq!(record.history[9], "Final Answer:\nHi Ana, here is your roadmap");
        assert!(outcome.fully_persisted());
    }

    #[tokio::test]
    async fn test_step_ceiling_forces_termination() {
        let llm = Arc::new(MockLlmClient::new([
            "I should find a", "I should find b", "I should find c", "I should find d",
            "I should find e", "roadmap",
        ]));
        let planner = Planner::new(llm.clone());
        let retriever = ScriptedRetriever::new(&["o1", "o2", "o3", "o4", "o5"]);
        let recorder = InMemoryRecorder::new();
        let session = ReactSession::new(&planner, &retriever, &recorder)
            .with_first_step(FirstStep::Reasoning);

        let outcome = react_planner(&session, &profile()).await.unwrap();

        assert_eq!(outcome.steps, 5);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(llm.call_count(), 6);
        assert_eq!(outcome.history.len(), 16);
        assert_eq!(
            outcome.history.iter().filter(|l| l.starts_with("Final Answer")).count(),
            1
        );
        // 第一步也走推理时，首个提示词只含固定问题
        assert_eq!(
            llm.prompts()[0],
            "\nThought 1: What should I find next to help this user?"
        );
        assert!(llm.prompts()[1].starts_with("Thought 1: I should find a\nAction 1: Search('a')\nObservation 1: o1\n"));
    }

    #[tokio::test]
    async fn test_lower_step_limit_is_honored() {
        let llm = Arc::new(MockLlmClient::new(["I should find x", "done"]));
        let planner = Planner::new(llm.clone());
        let retriever = ScriptedRetriever::new(&["o1", "o2"]);
        let recorder = InMemoryRecorder::new();
        let session = ReactSession::new(&planner, &retriever, &recorder).with_max_steps(2);

        let outcome = react_planner(&session, &profile()).await.unwrap();
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn test_synthesis_context_is_exact_observation_sequence() {
        let llm = Arc::new(MockLlmClient::new([
            "I should find exam dates",
            "generate final roadmap",
            "final",
        ]));
        let planner = Planner::new(llm.clone());
        let retriever = ScriptedRetriever::new(&["Obs A", "Obs B", "Obs C", "Obs D"]);
        let recorder = InMemoryRecorder::new();

        react_planner(&ReactSession::new(&planner, &retriever, &recorder), &profile())
            .await
            .unwrap();

        let prompts = llm.prompts();
        let synthesis = prompts.last().unwrap();
        assert_eq!(
            context_block(synthesis),
            "Observation 1: Obs A\n\nObservation 2: Obs B\n\nObservation 3: Obs C"
        );
        assert!(!synthesis.contains("Obs D"));
        assert!(synthesis.contains("- Name: Ana"));
        assert!(synthesis.contains("Write the roadmap in English."));
    }

    #[tokio::test]
    async fn test_trace_is_reproducible_with_canned_responses() {
        async fn run() -> Vec<String> {
            let llm = Arc::new(MockLlmClient::new([
                "I need to find equivalency rules",
                "generate final roadmap",
                "roadmap text",
            ]));
            let planner = Planner::new(llm);
            let retriever = ScriptedRetriever::new(&["r1", "r2", "r3"]);
            let recorder = InMemoryRecorder::new();
            react_planner(&ReactSession::new(&planner, &retriever, &recorder), &profile())
                .await
                .unwrap()
                .history
        }

        assert_eq!(run().await, run().await);
    }

    #[tokio::test]
    async fn test_retrieval_failure_aborts_and_keeps_persisted_steps() {
        let llm = Arc::new(MockLlmClient::new(["I should find fees", "unused"]));
        let planner = Planner::new(llm.clone());
        // 第一步成功后，第二步检索失败
        let retriever = ScriptedRetriever::new(&["step one"]);
        retriever.fail_after("network down");
        let recorder = InMemoryRecorder::new();
        let session = ReactSession::new(&planner, &retriever, &recorder);

        let err = react_planner(&session, &profile()).await.unwrap_err();
        assert!(matches!(err, PlannerError::RetrievalFailure(ref m) if m == "network down"));

        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.history_lengths(), vec![3]);
        // 失败后不会合成路线图
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_first_retrieval_failure_persists_nothing() {
        let llm = Arc::new(MockLlmClient::new(["unused"]));
        let planner = Planner::new(llm.clone());
        let retriever = ScriptedRetriever::new(&[]);
        retriever.fail_next("missing corpus");
        let recorder = InMemoryRecorder::new();

        let err = react_planner(&ReactSession::new(&planner, &retriever, &recorder), &profile())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::RetrievalFailure(_)));
        assert!(recorder.is_empty());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reasoning_failure_at_synthesis() {
        let llm = Arc::new(MockLlmClient::new(["generate final roadmap"]));
        llm.push_failure("503 Service Unavailable");
        let planner = Planner::new(llm.clone());
        let retriever = ScriptedRetriever::new(&["a", "b"]);
        let recorder = InMemoryRecorder::new();

        let err = react_planner(&ReactSession::new(&planner, &retriever, &recorder), &profile())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::ReasoningFailure(_)));

        assert_eq!(recorder.history_lengths(), vec![3, 6]);
        let lengths_have_no_final = recorder
            .history_lengths()
            .iter()
            .all(|len| len % 3 == 0);
        assert!(lengths_have_no_final);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_abort() {
        let llm = Arc::new(MockLlmClient::new(["generate final roadmap", "the roadmap"]));
        let planner = Planner::new(llm);
        let retriever = ScriptedRetriever::new(&["a", "b"]);
        let recorder = BrokenRecorder;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let session = ReactSession::new(&planner, &retriever, &recorder).with_event_tx(&tx);

        let outcome = react_planner(&session, &profile()).await.unwrap();
        drop(tx);

        assert_eq!(outcome.roadmap, "the roadmap");
        assert!(!outcome.fully_persisted());
        // 两步 + Final Answer 各写入一次
        assert_eq!(outcome.persistence_errors.len(), 3);
        assert!(outcome.persistence_errors[0].contains("disk full"));

        let mut warnings = 0;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev, ReactEvent::PersistenceWarning { .. }) {
                warnings += 1;
            }
        }
        assert_eq!(warnings, 3);
    }

    #[tokio::test]
    async fn test_events_follow_loop_order() {
        let llm = Arc::new(MockLlmClient::new(["generate final roadmap", "roadmap"]));
        let planner = Planner::new(llm);
        let retriever = ScriptedRetriever::new(&["a", "b"]);
        let recorder = InMemoryRecorder::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let session = ReactSession::new(&planner, &retriever, &recorder).with_event_tx(&tx);

        react_planner(&session, &profile()).await.unwrap();
        drop(tx);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert!(matches!(events.first(), Some(ReactEvent::SessionStarted { .. })));
        assert_eq!(events[1], ReactEvent::StepUpdate { step: 1, max_steps: 5 });
        assert_eq!(
            events[2],
            ReactEvent::Thought {
                step: 1,
                text: "I should gather general licensing steps".into()
            }
        );
        assert!(matches!(events[3], ReactEvent::Action { step: 1, .. }));
        assert!(matches!(events[4], ReactEvent::Observation { step: 1, .. }));
        assert_eq!(events[5], ReactEvent::Persisted { history_len: 3 });
        assert!(events.contains(&ReactEvent::Synthesizing { observations: 2 }));
        assert_eq!(
            events.last(),
            Some(&ReactEvent::FinalAnswer {
                text: "roadmap".into()
            })
        );
    }

    #[tokio::test]
    async fn test_file_recorder_holds_final_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let llm = Arc::new(MockLlmClient::new(["generate final roadmap", "roadmap"]));
        let planner = Planner::new(llm);
        let retriever = ScriptedRetriever::new(&["a", "b"]);
        let recorder = JsonFileRecorder::new(dir.path());

        let outcome = react_planner(&ReactSession::new(&planner, &retriever, &recorder), &profile())
            .await
            .unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let record = recorder.load(&outcome.session_id).unwrap().unwrap();
        assert_eq!(record.session_id, outcome.session_id);
        assert_eq!(record.user_profile, profile());
        assert_eq!(record.history, outcome.history);
    }

    #[tokio::test]
    async fn test_empty_extracted_query_does_not_abort() {
        let store = VectorStore::new(CorpusSnapshot {
            embedding_model: "fixed".into(),
            entries: vec![EmbeddedChunk {
                chunk: Chunk::new("oiq_0", "Submit your diploma for evaluation.", "oiq"),
                embedding: vec![1.0, 0.0],
            }],
        });
        let retriever = VectorSearchRetriever::new(Arc::new(store), Arc::new(FixedEmbedder), 700);
        // 第二步思考只有套话，提取出的查询为空
        let llm = Arc::new(MockLlmClient::new([
            "I should find",
            "generate final roadmap",
            "roadmap",
        ]));
        let planner = Planner::new(llm.clone());
        let recorder = InMemoryRecorder::new();

        let outcome = react_planner(&ReactSession::new(&planner, &retriever, &recorder), &profile())
            .await
            .unwrap();

        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.roadmap, "roadmap");
        assert_eq!(outcome.history[1], format!("Action 1: Search('{}')", profile().initial_query()));
        assert_eq!(outcome.history[2], "Observation 1: Submit your diploma for evaluation.");
        assert_eq!(outcome.history[4], "Action 2: Search('')");
        assert_eq!(outcome.history[5], "Observation 2: ");
        assert_eq!(recorder.history_lengths(), vec![3, 6, 9, 10]);
    }

    #[tokio::test]
    async fn test_reasoning_failure_while_thinking_aborts() {
        let llm = Arc::new(MockLlmClient::new(["I should find exam dates"]));
        llm.push_failure("429 Too Many Requests");
        let planner = Planner::new(llm.clone());
        let retriever = ScriptedRetriever::new(&["a", "b", "c"]);
        let recorder = InMemoryRecorder::new();

        let err = react_planner(&ReactSession::new(&planner, &retriever, &recorder), &profile())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::ReasoningFailure(ref m) if m.contains("429")));

        // 前两步已落盘，第三步没有检索，也没有合成
        assert_eq!(recorder.history_lengths(), vec![3, 6]);
        assert_eq!(retriever.queries().len(), 2);
        assert_eq!(llm.call_count(), 2);
        assert!(llm.prompts().iter().all(|p| !p.contains("==========")));
        assert!(llm.prompts()[1].ends_with("Thought 3: What should I find next to help this user?"));
    }
}
