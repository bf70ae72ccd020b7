//! 会话轨迹持久化
//!
//! 每个会话一个 JSON 文件（`{log_dir}/{session_id}.json`），每次调用都整体重写快照，不做增量追加。
//! 规划循环每步结束后调用一次，终止后写入 Final Answer 再调用一次。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::profile::UserProfile;

/// 持久化的会话快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_profile: UserProfile,
    /// 最后一次写入时间（ISO-8601）
    pub timestamp: String,
    /// 按顺序渲染的轨迹行（Thought / Action / Observation / Final Answer）
    pub history: Vec<String>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, user_profile: UserProfile, history: Vec<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_profile,
            timestamp: chrono::Local::now().to_rfc3339(),
            history,
        }
    }
}

/// 会话轨迹记录器：同一 session_id 重复调用为覆盖语义
pub trait SessionRecorder: Send + Sync {
    fn persist(&self, record: &SessionRecord) -> anyhow::Result<()>;
}

/// JSON 文件记录器
#[derive(Debug)]
pub struct JsonFileRecorder {
    dir: PathBuf,
}

impl JsonFileRecorder {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", session_id))
    }

    /// 读取已持久化的会话；文件不存在时返回 None
    pub fn load(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("read session record {}", path.display()))?;
        Ok(Some(serde_json::from_str(&data)?))
    }
}

impl SessionRecorder for JsonFileRecorder {
    /// 整体写入快照；目录不存在时自动创建
    fn persist(&self, record: &SessionRecord) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create log dir {}", self.dir.display()))?;
        let path = self.path_for(&record.session_id);
        std::fs::write(&path, serde_json::to_string_pretty(record)?)
            .with_context(|| format!("write session record {}", path.display()))?;
        Ok(())
    }
}

/// 内存记录器（测试与嵌入式调用方使用）
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    records: Mutex<HashMap<String, SessionRecord>>,
    writes: Mutex<Vec<usize>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.records.lock().ok()?.get(session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 每次 persist 时的轨迹行数（按调用顺序）
    pub fn history_lengths(&self) -> Vec<usize> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl SessionRecorder for InMemoryRecorder {
    fn persist(&self, record: &SessionRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .map_err(|e| anyhow::anyhow!("recorder lock poisoned: {}", e))?
            .insert(record.session_id.clone(), record.clone());
        self.writes
            .lock()
            .map_err(|e| anyhow::anyhow!("recorder lock poisoned: {}", e))?
            .push(record.history.len());
        Ok(())
    }
}
