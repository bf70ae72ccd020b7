//! Roadmap - 技术移民执业认证路线规划
//!
//! 入口：初始化日志、加载配置与凭据，然后
//! - `roadmap plan`：读取用户档案（文件或交互输入），跑一次规划会话并打印路线图
//! - `roadmap index`：把抓取页面分块、嵌入，写出语料快照供向量检索使用

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use roadmap::config::{load_config, AppConfig, Credentials, RetrievalBackend};
use roadmap::memory::{load_source_pages, Chunker, ChunkingConfig, CorpusSnapshot};
use roadmap::react::ReactEvent;
use roadmap::{build_components, Language, PlannerError, UserProfile};

#[derive(Parser, Debug)]
#[command(name = "roadmap", version, about = "Personalized licensing roadmap for skilled immigrants")]
struct Cli {
    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 生成个性化路线图
    Plan {
        /// JSON 格式的用户档案；缺省时交互输入
        #[arg(long)]
        profile: Option<PathBuf>,
        /// 检索后端：vector / web
        #[arg(long)]
        backend: Option<RetrievalBackend>,
        /// 路线图语言：en / es / fr / pt
        #[arg(long)]
        language: Option<String>,
        /// 会话日志目录
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// 构建向量检索语料快照
    Index {
        /// 抓取页面 JSON：[{url, title, text}]
        #[arg(long)]
        source: PathBuf,
        /// 输出快照路径，缺省为配置中的 corpus_path
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    roadmap::observability::init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let creds = Credentials::from_env();
    tracing::debug!(?creds, "credentials detected");

    match cli.command {
        Command::Plan {
            profile,
            backend,
            language,
            log_dir,
        } => run_plan(cfg, creds, profile, backend, language, log_dir).await,
        Command::Index { source, out } => run_index(cfg, creds, source, out).await,
    }
}

async fn run_plan(
    mut cfg: AppConfig,
    creds: Credentials,
    profile_path: Option<PathBuf>,
    backend: Option<RetrievalBackend>,
    language: Option<String>,
    log_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(b) = backend {
        cfg.retrieval.backend = b;
    }
    if let Some(dir) = log_dir {
        cfg.app.log_dir = dir;
    }

    // 凭据与语料在读取档案前校验，缺失时不进入任何交互
    let components =
        build_components(&cfg, &creds).map_err(|e| describe_failure(e, &cfg.app.log_dir))?;

    // 语言优先级：--language > 档案中的 language > [planner] language
    let default_language = Language::from_code(&cfg.planner.language);
    let mut profile = match profile_path {
        Some(path) => {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("read profile {}", path.display()))?;
            UserProfile::from_json(&data, default_language)
                .with_context(|| format!("parse profile {}", path.display()))?
        }
        None => {
            println!("Welcome to the Skilled Immigrant Licensing Assistant!\n");
            read_profile_interactive(default_language)?
        }
    };
    if let Some(code) = language {
        profile.language = Language::from_code(&code);
    }

    println!("\nSearching and generating your roadmap...\n");
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(ev) = event_rx.recv().await {
            match ev {
                ReactEvent::StepUpdate { step, max_steps } => eprintln!("[step {}/{}]", step, max_steps),
                ReactEvent::Thought { text, .. } => eprintln!("  thought: {}", text),
                ReactEvent::Action { query, .. } => eprintln!("  search:  {}", query),
                ReactEvent::PersistenceWarning { detail } => eprintln!("  warning: {}", detail),
                _ => {}
            }
        }
    });

    let result = components.run(&profile, Some(&event_tx)).await;
    drop(event_tx);
    let _ = printer.await;
    let outcome = result.map_err(|e| describe_failure(e, &cfg.app.log_dir))?;

    println!("Personalized Roadmap\n");
    println!("{}", outcome.roadmap);
    if !outcome.fully_persisted() {
        eprintln!(
            "\nwarning: session log {} may be incomplete",
            cfg.app.log_dir.join(format!("{}.json", outcome.session_id)).display()
        );
    }
    Ok(())
}

async fn run_index(
    cfg: AppConfig,
    creds: Credentials,
    source: PathBuf,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (embedder, model) =
        roadmap::agent::create_embedder(&cfg, &creds).context("Failed to set up embeddings")?;
    let pages = load_source_pages(&source)?;
    if pages.is_empty() {
        bail!("no pages in {}", source.display());
    }
    let chunker = Chunker::new(ChunkingConfig {
        chunk_size: cfg.retrieval.vector.chunk_size,
        chunk_overlap: cfg.retrieval.vector.chunk_overlap,
        ..Default::default()
    });
    let snapshot = CorpusSnapshot::build(&pages, &chunker, embedder.as_ref(), &model)
        .await
        .map_err(|e| anyhow::anyhow!("indexing failed: {}", e))?;

    let out = out.unwrap_or_else(|| cfg.retrieval.vector.corpus_path.clone());
    snapshot.save(&out)?;
    tracing::info!(pages = pages.len(), chunks = snapshot.len(), out = %out.display(), "corpus snapshot written");
    Ok(())
}

/// 配置类错误提示检查配置与环境变量；会话中止时指出已落盘的轨迹位置
fn describe_failure(e: PlannerError, log_dir: &Path) -> anyhow::Error {
    if e.is_fatal_setup() {
        anyhow::anyhow!(
            "Failed to set up planner: {} (check config/default.toml and the API key variables)",
            e
        )
    } else {
        anyhow::anyhow!(
            "Roadmap generation failed: {} (completed steps are logged under {})",
            e,
            log_dir.display()
        )
    }
}

fn prompt_line(input: &mut impl BufRead, label: &str) -> anyhow::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("input closed");
    }
    Ok(line.trim().to_string())
}

fn read_profile_interactive(language: Language) -> anyhow::Result<UserProfile> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let name = prompt_line(&mut input, "Enter your name: ")?;
    let country = prompt_line(&mut input, "Country of origin: ")?;
    let profession = prompt_line(&mut input, "Profession (e.g., Engineer): ")?;
    let education_level = prompt_line(
        &mut input,
        "Highest education level (e.g., Bachelor's, Master's): ",
    )?;
    let years_experience = loop {
        let raw = prompt_line(&mut input, "Years of professional experience: ")?;
        match raw.parse::<u32>() {
            Ok(y) => break y,
            Err(_) => println!("Please enter a whole number."),
        }
    };
    let jurisdiction = prompt_line(&mut input, "Target province or jurisdiction (e.g., Quebec): ")?;
    Ok(UserProfile {
        name,
        country,
        profession,
        education_level,
        years_experience,
        jurisdiction,
        language,
    })
}
