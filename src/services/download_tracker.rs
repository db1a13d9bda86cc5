//! 下载完成检测 - 业务能力层
//!
//! 浏览器下载是异步副作用，只能轮询暂存目录判断是否结束。

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// 浏览器写入中的临时文件后缀
const IN_PROGRESS_SUFFIXES: &[&str] = &[".crdownload", ".part", ".download"];

/// 下载等待结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Completed,
    TimedOut,
}

/// 下载完成检测
#[derive(Debug, Clone)]
pub struct DownloadTracker {
    poll_interval: Duration,
}

impl DownloadTracker {
    /// 默认每秒轮询一次
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// 等待目录中的下载结束
    ///
    /// 没有任何文件带下载中后缀，且（若给出）文件数等于 `expected` 时视为完成。
    /// 超过 `timeout` 返回 `TimedOut`；收到取消信号返回 `AppError::Cancelled`。
    pub async fn await_completion(
        &self,
        dir: &Path,
        timeout: Duration,
        expected: Option<usize>,
        cancel: &CancellationToken,
    ) -> AppResult<DownloadStatus> {
        let started = Instant::now();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                _ = sleep(self.poll_interval) => {}
            }

            let files = list_files(dir).await?;
            let pending = files.iter().any(|f| is_in_progress(f));
            let count_ok = expected.map_or(true, |n| files.len() == n);

            if !pending && count_ok {
                debug!("下载完成: {} ({} 个文件)", dir.display(), files.len());
                return Ok(DownloadStatus::Completed);
            }

            if started.elapsed() >= timeout {
                debug!(
                    "下载等待超时: {} (文件 {} 个, 未完成: {})",
                    dir.display(),
                    files.len(),
                    pending
                );
                return Ok(DownloadStatus::TimedOut);
            }
        }
    }
}

impl Default for DownloadTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// 目录中已下载完成的文件
pub async fn completed_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = list_files(dir)
        .await?
        .into_iter()
        .filter(|f| !is_in_progress(f))
        .collect();
    files.sort();
    Ok(files)
}

fn is_in_progress(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    IN_PROGRESS_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

async fn list_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(AppError::storage(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| AppError::storage(dir, e))? {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file {
            files.push(entry.path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> DownloadTracker {
        DownloadTracker::with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_completed_when_file_present() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("doc.pdf"), b"pdf").await.unwrap();

        let status = tracker()
            .await_completion(tmp.path(), Duration::from_secs(1), Some(1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status, DownloadStatus::Completed);
    }

    #[tokio::test]
    async fn test_in_progress_file_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("doc.pdf.crdownload"), b"p").await.unwrap();

        let status = tracker()
            .await_completion(tmp.path(), Duration::from_millis(50), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status, DownloadStatus::TimedOut);
    }

    #[tokio::test]
    async fn test_firefox_style_partial_is_in_progress() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("doc.pdf.part"), b"p").await.unwrap();

        let status = tracker()
            .await_completion(tmp.path(), Duration::from_millis(50), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status, DownloadStatus::TimedOut);
        assert!(completed_files(tmp.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expected_count_not_reached_times_out() {
        let tmp = tempfile::tempdir().unwrap();

        let status = tracker()
            .await_completion(tmp.path(), Duration::from_millis(50), Some(1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status, DownloadStatus::TimedOut);
    }

    #[tokio::test]
    async fn test_download_finishing_mid_wait() {
        let tmp = tempfile::tempdir().unwrap();
        let partial = tmp.path().join("doc.pdf.crdownload");
        fs::write(&partial, b"p").await.unwrap();

        let dir = tmp.path().to_path_buf();
        let finisher = tokio::spawn(async move {
            sleep(Duration::from_millis(40)).await;
            fs::rename(&partial, dir.join("doc.pdf")).await.unwrap();
        });

        let status = tracker()
            .await_completion(tmp.path(), Duration::from_secs(2), Some(1), &CancellationToken::new())
            .await
            .unwrap();
        finisher.await.unwrap();
        assert_eq!(status, DownloadStatus::Completed);
        assert_eq!(completed_files(tmp.path()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_wait() {
        let tmp = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = tracker()
            .await_completion(tmp.path(), Duration::from_secs(5), Some(1), &cancel)
            .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }
}
