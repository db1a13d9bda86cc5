//! 隔离登记服务 - 业务能力层
//!
//! 只负责"记录永久失败的单元"能力，不关心流程。
//! 每个单元一个文本文件，方便人工查看；被隔离的单元不会被自动重试，
//! 但也不算完成，删除记录后下次运行会重新处理。

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::models::UnitKey;
use crate::utils::fs::retry_transient;

/// 一条隔离记录
#[derive(Debug, Clone)]
pub struct QuarantineRecord {
    pub key: UnitKey,
    pub reason: String,
    pub at: Option<DateTime<FixedOffset>>,
}

/// 隔离登记服务
#[derive(Debug, Clone)]
pub struct QuarantineRegistry {
    root: PathBuf,
}

impl QuarantineRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn record_path(&self, key: &UnitKey) -> PathBuf {
        self.root.join(format!("{}.txt", key.file_stem()))
    }

    /// 写入隔离记录
    ///
    /// 已有记录时保持原样，返回 `Ok(false)`。
    pub async fn quarantine(&self, key: &UnitKey, reason: &str) -> Result<bool, StorageError> {
        retry_transient(&self.root, || fs::create_dir_all(&self.root)).await?;

        let path = self.record_path(key);
        let body = format!(
            "key: {}\nreason: {}\nat: {}\n",
            key,
            reason.replace(['\r', '\n'], " "),
            chrono::Local::now().to_rfc3339()
        );
        let created = retry_transient(&path, || create_record(&path, &body)).await?;

        if created {
            debug!("写入隔离记录: {} ({})", key, reason);
        }
        Ok(created)
    }

    pub async fn is_quarantined(&self, key: &UnitKey) -> Result<bool, StorageError> {
        let path = self.record_path(key);
        retry_transient(&path, || fs::try_exists(&path)).await
    }

    /// 删除一条记录，供人工修复后重放
    pub async fn clear(&self, key: &UnitKey) -> Result<bool, StorageError> {
        let path = self.record_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from_io(&path, e)),
        }
    }

    /// 列出全部隔离记录
    pub async fn list(&self) -> Result<Vec<QuarantineRecord>, StorageError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::from_io(&self.root, e)),
        };

        let mut records = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(StorageError::from_io(&self.root, e)),
            };
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("txt") {
                continue;
            }
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| StorageError::from_io(&path, e))?;
            match parse_record(&content) {
                Some(record) => records.push(record),
                None => warn!("无法解析隔离记录: {}", path.display()),
            }
        }

        records.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));
        Ok(records)
    }
}

async fn create_record(path: &Path, body: &str) -> io::Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path).await {
        Ok(mut file) => {
            file.write_all(body.as_bytes()).await?;
            file.flush().await?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

fn parse_record(content: &str) -> Option<QuarantineRecord> {
    let mut key = None;
    let mut reason = String::new();
    let mut at = None;

    for line in content.lines() {
        if let Some(value) = line.strip_prefix("key: ") {
            key = value.parse::<UnitKey>().ok();
        } else if let Some(value) = line.strip_prefix("reason: ") {
            reason = value.to_string();
        } else if let Some(value) = line.strip_prefix("at: ") {
            at = DateTime::parse_from_rfc3339(value.trim()).ok();
        }
    }

    Some(QuarantineRecord { key: key?, reason, at })
}
