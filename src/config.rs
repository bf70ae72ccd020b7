//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ROADMAP__*` 覆盖（双下划线表示嵌套，如 `ROADMAP__LLM__PROVIDER=openai`）。
//! API Key 不进入配置文件，只从环境变量读取为 [`Credentials`]，由调用方显式传给组件构建函数。

use std::path::PathBuf;

use serde::Deserialize;

/// 规划循环的步数上限（硬上限，配置只能调低）
pub const MAX_PLANNER_STEPS: usize = 5;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
}

/// [app] 段：会话日志目录
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("react_logs")
}

/// 第一步的思考方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FirstStep {
    /// 固定思考 + 由用户档案拼出的初始查询，不调用 LLM（可复现）
    #[default]
    Templated,
    /// 与后续步骤一致，调用 LLM 决定第一次查询
    Reasoning,
}

/// [planner] 段：步数上限、第一步策略、默认输出语言
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub first_step: FirstStep,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            first_step: FirstStep::default(),
            language: default_language(),
        }
    }
}

impl PlannerSection {
    /// 实际生效的步数上限：限制在 1..=MAX_PLANNER_STEPS
    pub fn effective_max_steps(&self) -> usize {
        self.max_steps.clamp(1, MAX_PLANNER_STEPS)
    }
}

fn default_max_steps() -> usize {
    MAX_PLANNER_STEPS
}

fn default_language() -> String {
    "en".to_string()
}

/// [llm] 段：后端选择、模型、超时与调用方重试
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / openai / deepseek
    #[serde(default = "default_provider")]
    pub provider: String,
    /// 未设置时使用各后端的默认模型
    pub model: Option<String>,
    /// 覆盖后端的 OpenAI 兼容端点
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
    /// 调用方重试次数；0 表示不重试（规划循环本身从不重试）
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            timeout_secs: default_request_timeout(),
            max_retries: 0,
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

/// 检索后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalBackend {
    /// 本地语料快照上的向量检索
    #[default]
    Vector,
    /// Google Programmable Search 实时检索
    Web,
}

impl std::str::FromStr for RetrievalBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "web" => Ok(Self::Web),
            other => Err(format!("unknown retrieval backend: {}", other)),
        }
    }
}

/// [retrieval] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RetrievalSection {
    #[serde(default)]
    pub backend: RetrievalBackend,
    /// 每步检索条数；未设置时向量检索取 2，网页检索取 web.num_results
    pub k: Option<usize>,
    #[serde(default)]
    pub vector: VectorSection,
    #[serde(default)]
    pub web: WebSection,
}

impl RetrievalSection {
    /// 当前后端实际使用的 k
    pub fn effective_k(&self) -> usize {
        match self.backend {
            RetrievalBackend::Vector => self.k.unwrap_or(DEFAULT_VECTOR_K).max(1),
            RetrievalBackend::Web => self
                .k
                .unwrap_or(self.web.num_results)
                .clamp(1, MAX_WEB_RESULTS),
        }
    }
}

const DEFAULT_VECTOR_K: usize = 2;
/// 网页检索单次最多返回条数
pub const MAX_WEB_RESULTS: usize = 8;

/// [retrieval.vector] 段：语料快照路径、分块参数、单块截断长度、嵌入模型
#[derive(Debug, Clone, Deserialize)]
pub struct VectorSection {
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    /// 嵌入后端：gemini / openai（DeepSeek 没有嵌入端点）
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,
    pub embedding_model: Option<String>,
}

impl Default for VectorSection {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_chunk_chars: default_max_chunk_chars(),
            embedding_provider: default_embedding_provider(),
            embedding_model: None,
        }
    }
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/corpus.json")
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_max_chunk_chars() -> usize {
    700
}

fn default_embedding_provider() -> String {
    "gemini".to_string()
}

/// [retrieval.web] 段
#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_num_results")]
    pub num_results: usize,
    #[serde(default = "default_web_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            num_results: default_num_results(),
            timeout_secs: default_web_timeout(),
            endpoint: default_endpoint(),
        }
    }
}

fn default_num_results() -> usize {
    5
}

fn default_web_timeout() -> u64 {
    10
}

fn default_endpoint() -> String {
    "https://www.googleapis.com/customsearch/v1".to_string()
}

/// 后端凭据：只来自环境变量，不写入配置文件或日志
#[derive(Clone, Default)]
pub struct Credentials {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub search_engine_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &self.gemini_api_key.is_some())
            .field("openai_api_key", &self.openai_api_key.is_some())
            .field("deepseek_api_key", &self.deepseek_api_key.is_some())
            .field("search_api_key", &self.search_api_key.is_some())
            .field("search_engine_id", &self.search_engine_id.is_some())
            .finish()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Credentials {
    /// 从环境变量读取：GEMINI_API_KEY / OPENAI_API_KEY / DEEPSEEK_API_KEY / GOOGLE_CSE_KEY / GOOGLE_CSE_ID
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: non_empty_env("GEMINI_API_KEY"),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            deepseek_api_key: non_empty_env("DEEPSEEK_API_KEY"),
            search_api_key: non_empty_env("GOOGLE_CSE_KEY"),
            search_engine_id: non_empty_env("GOOGLE_CSE_ID"),
        }
    }

    /// 指定 LLM 后端对应的 (环境变量名, Key)
    pub fn llm_key(&self, provider: &str) -> (&'static str, Option<&str>) {
        match provider.to_lowercase().as_str() {
            "openai" => ("OPENAI_API_KEY", self.openai_api_key.as_deref()),
            "deepseek" => ("DEEPSEEK_API_KEY", self.deepseek_api_key.as_deref()),
            _ => ("GEMINI_API_KEY", self.gemini_api_key.as_deref()),
        }
    }
}

/// 从 config 目录加载配置，环境变量 ROADMAP__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ROADMAP__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ROADMAP")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
