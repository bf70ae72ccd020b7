//! Headless 规划运行时
//!
//! build_components 根据配置与凭据构建 Planner / Retriever / Recorder：
//! 凭据缺失、语料快照不可用等问题在这里就失败，不会创建任何会话或调用任何后端。
//! PlannerComponents::run 对单个用户档案跑一次规划会话并返回路线图。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::{AppConfig, Credentials, FirstStep, RetrievalBackend};
use crate::core::PlannerError;
use crate::llm::{
    create_deepseek_client, create_gemini_client, create_gemini_embedder, EmbeddingProvider,
    LlmClient, OpenAiClient, OpenAiEmbedder, RetryConfig, RetryingLlmClient, DEEPSEEK_CHAT,
    GEMINI_FLASH,
};
use crate::memory::{CorpusSnapshot, JsonFileRecorder, SessionRecorder, VectorStore};
use crate::profile::UserProfile;
use crate::react::{react_planner, Planner, PlannerOutcome, ReactEvent, ReactSession};
use crate::tools::{GoogleSearchRetriever, Retriever, VectorSearchRetriever};

const OPENAI_CHAT: &str = "gpt-4o-mini";
const OPENAI_EMBEDDING: &str = "text-embedding-3-small";

/// 预构建的规划组件；检索语料只读，可多会话共享，每次 run 都是独立会话
pub struct PlannerComponents {
    pub planner: Planner,
    pub retriever: Arc<dyn Retriever>,
    pub recorder: Arc<dyn SessionRecorder>,
    pub max_steps: usize,
    pub k: usize,
    pub first_step: FirstStep,
}

impl PlannerComponents {
    /// 以当前组件组装一次会话参数
    pub fn session<'a>(&'a self, event_tx: Option<&'a UnboundedSender<ReactEvent>>) -> ReactSession<'a> {
        let session = ReactSession::new(&self.planner, self.retriever.as_ref(), self.recorder.as_ref())
            .with_max_steps(self.max_steps)
            .with_k(self.k)
            .with_first_step(self.first_step);
        match event_tx {
            Some(tx) => session.with_event_tx(tx),
            None => session,
        }
    }

    /// 跑一次规划会话
    pub async fn run(
        &self,
        profile: &UserProfile,
        event_tx: Option<&UnboundedSender<ReactEvent>>,
    ) -> Result<PlannerOutcome, PlannerError> {
        react_planner(&self.session(event_tx), profile).await
    }
}

/// 根据配置与凭据选择推理后端（Gemini / OpenAI / DeepSeek）
pub fn create_llm(cfg: &AppConfig, creds: &Credentials) -> Result<Arc<dyn LlmClient>, PlannerError> {
    let provider = cfg.llm.provider.to_lowercase();
    let default_model = match provider.as_str() {
        "gemini" => GEMINI_FLASH,
        "openai" => OPENAI_CHAT,
        "deepseek" => DEEPSEEK_CHAT,
        other => return Err(PlannerError::Config(format!("unknown llm provider: {}", other))),
    };
    let (variable, key) = creds.llm_key(&provider);
    let key = key.ok_or(PlannerError::MissingCredential {
        backend: "reasoning",
        variable,
    })?;

    let model = cfg.llm.model.as_deref();
    let timeout = cfg.llm.timeout_secs;
    let client = match (cfg.llm.base_url.as_deref(), provider.as_str()) {
        (Some(url), _) => OpenAiClient::new(Some(url), model.unwrap_or(default_model), key, timeout),
        (None, "gemini") => create_gemini_client(model, key, timeout),
        (None, "deepseek") => create_deepseek_client(model, key, timeout),
        (None, _) => OpenAiClient::new(None, model.unwrap_or(default_model), key, timeout),
    };
    tracing::info!(provider = %provider, model = client.model(), "reasoning backend ready");
    let client: Arc<dyn LlmClient> = Arc::new(client);

    if cfg.llm.max_retries > 0 {
        let retry = RetryConfig {
            max_retries: cfg.llm.max_retries,
            ..Default::default()
        };
        return Ok(Arc::new(RetryingLlmClient::new(client, retry)));
    }
    Ok(client)
}

/// 嵌入后端（语料索引与向量检索共用）
pub fn create_embedder(
    cfg: &AppConfig,
    creds: &Credentials,
) -> Result<(Arc<dyn EmbeddingProvider>, String), PlannerError> {
    let vector = &cfg.retrieval.vector;
    let provider = vector.embedding_provider.to_lowercase();
    let (variable, key) = match provider.as_str() {
        "gemini" | "openai" => creds.llm_key(&provider),
        other => {
            return Err(PlannerError::Config(format!(
                "unsupported embedding provider: {}",
                other
            )))
        }
    };
    let key = key.ok_or(PlannerError::MissingCredential {
        backend: "embedding",
        variable,
    })?;
    let model = vector.embedding_model.as_deref();
    if provider == "gemini" {
        let embedder = create_gemini_embedder(model, key);
        let name = model.unwrap_or(crate::llm::gemini::GEMINI_EMBEDDING).to_string();
        Ok((Arc::new(embedder), name))
    } else {
        let name = model.unwrap_or(OPENAI_EMBEDDING).to_string();
        Ok((Arc::new(OpenAiEmbedder::new(None, &name, key)), name))
    }
}

/// 检索后端：向量检索先校验嵌入凭据再加载快照；网页检索需要 Key 与搜索引擎 ID
pub fn create_retriever(cfg: &AppConfig, creds: &Credentials) -> Result<Arc<dyn Retriever>, PlannerError> {
    match cfg.retrieval.backend {
        RetrievalBackend::Vector => {
            let (embedder, model) = create_embedder(cfg, creds)?;
            let path = &cfg.retrieval.vector.corpus_path;
            let snapshot = CorpusSnapshot::load(path)
                .map_err(|e| PlannerError::Corpus(format!("{:#}", e)))?;
            if snapshot.is_empty() {
                return Err(PlannerError::Corpus(format!(
                    "corpus snapshot {} has no chunks",
                    path.display()
                )));
            }
            if !snapshot.embedding_model.is_empty() && snapshot.embedding_model != model {
                tracing::warn!(
                    snapshot_model = %snapshot.embedding_model,
                    query_model = %model,
                    "corpus was embedded with a different model"
                );
            }
            tracing::info!(chunks = snapshot.len(), path = %path.display(), "corpus snapshot loaded");
            Ok(Arc::new(VectorSearchRetriever::new(
                Arc::new(VectorStore::new(snapshot)),
                embedder,
                cfg.retrieval.vector.max_chunk_chars,
            )))
        }
        RetrievalBackend::Web => {
            let api_key = creds
                .search_api_key
                .as_deref()
                .ok_or(PlannerError::MissingCredential {
                    backend: "web search",
                    variable: "GOOGLE_CSE_KEY",
                })?;
            let engine_id = creds
                .search_engine_id
                .as_deref()
                .ok_or(PlannerError::MissingCredential {
                    backend: "web search",
                    variable: "GOOGLE_CSE_ID",
                })?;
            let web = &cfg.retrieval.web;
            let retriever =
                GoogleSearchRetriever::new(web.endpoint.clone(), api_key, engine_id, web.timeout_secs)
                    .map_err(PlannerError::Config)?;
            Ok(Arc::new(retriever))
        }
    }
}

/// 构建全部组件；任何凭据缺失都在此返回 MissingCredential
pub fn build_components(cfg: &AppConfig, creds: &Credentials) -> Result<PlannerComponents, PlannerError> {
    let llm = create_llm(cfg, creds)?;
    let retriever = create_retriever(cfg, creds)?;
    Ok(PlannerComponents {
        planner: Planner::new(llm),
        retriever,
        recorder: Arc::new(JsonFileRecorder::new(&cfg.app.log_dir)),
        max_steps: cfg.planner.effective_max_steps(),
        k: cfg.retrieval.effective_k(),
        first_step: cfg.planner.first_step,
    })
}
