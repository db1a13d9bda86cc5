//! 运行上下文
//!
//! 所有组件共享的配置、存储句柄与取消信号，显式传递，不使用全局状态。

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::PortalLayout;
use crate::services::{Archive, ChallengeSolver, CheckpointStore, DownloadTracker, QuarantineRegistry};

/// 编排上下文
pub struct OrchestratorContext {
    pub config: Arc<Config>,
    pub checkpoints: CheckpointStore,
    pub quarantine: QuarantineRegistry,
    pub archive: Archive,
    pub downloads: DownloadTracker,
    pub layout: PortalLayout,
    pub solver: Arc<dyn ChallengeSolver>,
    pub cancel: CancellationToken,
}

impl OrchestratorContext {
    pub fn new(config: Arc<Config>, solver: Arc<dyn ChallengeSolver>, cancel: CancellationToken) -> Self {
        Self {
            checkpoints: CheckpointStore::new(&config.archive_dir),
            quarantine: QuarantineRegistry::new(&config.faulty_dir),
            archive: Archive::new(&config.archive_dir),
            downloads: DownloadTracker::with_poll_interval(config.download_poll_interval()),
            layout: PortalLayout::default(),
            solver,
            cancel,
            config,
        }
    }

    pub fn with_layout(mut self, layout: PortalLayout) -> Self {
        self.layout = layout;
        self
    }

    /// worker 专属的下载暂存目录
    pub fn staging_dir(&self, worker: usize) -> PathBuf {
        self.config.staging_dir.join(format!("worker-{}", worker))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 已取消时返回 `AppError::Cancelled`
    pub fn ensure_active(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::PageTextSolver;

    #[test]
    fn test_staging_dir_is_per_worker() {
        let config = Arc::new(Config::default());
        let ctx = OrchestratorContext::new(
            config,
            Arc::new(PageTextSolver::new().unwrap()),
            CancellationToken::new(),
        );
        assert_eq!(ctx.staging_dir(3), PathBuf::from("staging/worker-3"));
        assert!(ctx.ensure_active().is_ok());

        ctx.cancel.cancel();
        assert!(matches!(ctx.ensure_active(), Err(AppError::Cancelled)));
    }
}
