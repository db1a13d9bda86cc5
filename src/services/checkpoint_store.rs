//! 检查点存储 - 业务能力层
//!
//! 只负责"某个单元是否已完成"，用标记文件表示。
//!
//! 标记文件布局：
//! - 年份：`{root}/{year}/done/year`
//! - 组合：`{root}/{year}/{combo-id}/done/combo`
//! - 文件号：`{root}/{year}/{combo-id}/done/file_num_{n}`
//!
//! 写入使用 `create_new`（O_EXCL），多个 worker 甚至多个进程同时标记
//! 同一个键时只会有一个创建成功，其余视为已完成，不报错。

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StorageError;
use crate::models::UnitKey;
use crate::utils::fs::retry_transient;

/// 检查点存储
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 键对应的标记文件路径
    pub fn marker_path(&self, key: &UnitKey) -> PathBuf {
        let year_dir = self.root.join(key.year_value().to_string());
        match key.combo_id() {
            None => year_dir.join("done").join(key.marker_name()),
            Some(combo_id) => year_dir.join(combo_id).join("done").join(key.marker_name()),
        }
    }

    /// 是否已完成
    pub async fn is_done(&self, key: &UnitKey) -> Result<bool, StorageError> {
        let path = self.marker_path(key);
        retry_transient(&path, || fs::try_exists(&path)).await
    }

    /// 标记为已完成
    ///
    /// 幂等：标记已存在时返回 `Ok(false)`，新建时返回 `Ok(true)`。
    pub async fn mark_done(&self, key: &UnitKey) -> Result<bool, StorageError> {
        let path = self.marker_path(key);
        if let Some(parent) = path.parent() {
            retry_transient(parent, || fs::create_dir_all(parent)).await?;
        }

        let created = retry_transient(&path, || create_marker(&path)).await?;
        if created {
            debug!("写入检查点: {}", key);
        } else {
            debug!("检查点已存在: {}", key);
        }
        Ok(created)
    }
}

async fn create_marker(path: &Path) -> io::Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path).await {
        Ok(mut file) => {
            let body = format!("done at {}\n", chrono::Local::now().to_rfc3339());
            file.write_all(body.as_bytes()).await?;
            file.flush().await?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Combo;

    fn combo() -> Combo {
        Combo::new("LIMA", "JUZGADO DE PAZ LETRADO", "CIVIL")
    }

    #[tokio::test]
    async fn test_mark_done_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());
        let key = UnitKey::file(2019, &combo(), 3);

        assert!(!store.is_done(&key).await.unwrap());
        assert!(store.mark_done(&key).await.unwrap());
        assert!(store.is_done(&key).await.unwrap());
        assert!(!store.mark_done(&key).await.unwrap());
        assert!(store.is_done(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_marker_layout() {
        let store = CheckpointStore::new("archive");
        assert_eq!(
            store.marker_path(&UnitKey::file(2019, &combo(), 3)),
            PathBuf::from("archive/2019/LIMA_JUZGADO-DE-PAZ-LETRADO_CIVIL/done/file_num_3")
        );
        assert_eq!(
            store.marker_path(&UnitKey::combo(2019, &combo())),
            PathBuf::from("archive/2019/LIMA_JUZGADO-DE-PAZ-LETRADO_CIVIL/done/combo")
        );
        assert_eq!(
            store.marker_path(&UnitKey::year(2019)),
            PathBuf::from("archive/2019/done/year")
        );
    }

    #[tokio::test]
    async fn test_levels_are_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());

        store.mark_done(&UnitKey::file(2019, &combo(), 1)).await.unwrap();

        assert!(!store.is_done(&UnitKey::combo(2019, &combo())).await.unwrap());
        assert!(!store.is_done(&UnitKey::year(2019)).await.unwrap());
        assert!(!store.is_done(&UnitKey::file(2020, &combo(), 1)).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mark_same_key_creates_one_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());
        let key = UnitKey::combo(2019, &combo());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move { store.mark_done(&key).await }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);

        let done_dir = store.marker_path(&key).parent().unwrap().to_path_buf();
        let mut entries = fs::read_dir(&done_dir).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }
}
