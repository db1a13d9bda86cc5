//! 调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **确定范围**：年份（配置或门户下拉框）、组合（地区过滤）
//! 2. **并发控制**：固定数量的 worker 从共享队列领取组合
//! 3. **资源管理**：每个组合一个独立浏览器会话，遍历结束即关闭
//! 4. **年份标记**：全部组合完成后写入年份完成标记
//! 5. **统计**：按年份汇总
//!
//! 同一个组合同一时刻只会被一个 worker 处理；跨组合没有顺序保证。

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::browser::{SessionFactory, WaitCondition};
use crate::context::OrchestratorContext;
use crate::error::AppResult;
use crate::models::{Combo, UnitKey, Year};
use crate::orchestrator::combo_walker::{ComboOutcome, ComboReport, ComboWalker};
use crate::utils::logging;

/// 门户下拉框中可选的范围
#[derive(Debug, Clone, Default)]
pub struct PortalScope {
    pub years: Vec<Year>,
    pub locations: Vec<String>,
}

/// 单个年份的统计
#[derive(Debug, Clone, Default)]
pub struct YearSummary {
    pub year: Year,
    /// 本年份参与调度的组合数
    pub total: usize,
    pub done: usize,
    pub quarantined: usize,
    /// 未完成（取消、会话失败、存储错误）
    pub pending: usize,
    pub units_found: usize,
    pub documents: usize,
    pub faulty_documents: usize,
    pub marked_done: bool,
}

/// 整次运行的统计
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub years: Vec<YearSummary>,
    /// 地区不在门户下拉框中而跳过的组合
    pub skipped_combos: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn units_found(&self) -> usize {
        self.years.iter().map(|y| y.units_found).sum()
    }

    pub fn documents(&self) -> usize {
        self.years.iter().map(|y| y.documents).sum()
    }
}

/// worker 处理一个组合的结果
enum ComboResult {
    Walked(AppResult<ComboReport>),
    SessionFailed,
}

/// 调度器
pub struct Scheduler {
    ctx: Arc<OrchestratorContext>,
    factory: Arc<dyn SessionFactory>,
}

impl Scheduler {
    pub fn new(ctx: Arc<OrchestratorContext>, factory: Arc<dyn SessionFactory>) -> Self {
        Self { ctx, factory }
    }

    /// 运行全部年份
    pub async fn run(&self, combos: &[Combo]) -> AppResult<RunSummary> {
        let config = &self.ctx.config;
        let mut summary = RunSummary::default();

        let (years, offered_locations) = match &config.years {
            Some(years) => (years.clone(), None),
            None => {
                let scope = self.probe_scope().await?;
                (scope.years, Some(scope.locations))
            }
        };
        let years = order_years(years);

        let mut selected: Vec<Combo> = match &config.locations {
            Some(locations) => combos
                .iter()
                .filter(|c| locations.iter().any(|l| l == &c.location))
                .cloned()
                .collect(),
            None => combos.to_vec(),
        };

        if let Some(offered) = offered_locations {
            let offered: HashSet<String> = offered.into_iter().collect();
            let before = selected.len();
            selected.retain(|combo| {
                let keep = offered.contains(&combo.location);
                if !keep {
                    warn!("⚠️ 门户中没有地区 '{}'，跳过 {}", combo.location, combo);
                }
                keep
            });
            summary.skipped_combos = before - selected.len();
        }

        logging::log_startup(config.worker_count, selected.len());
        info!("📅 年份: {:?}", years);

        for year in years {
            if self.ctx.is_cancelled() {
                break;
            }
            if self.ctx.checkpoints.is_done(&UnitKey::year(year)).await? {
                info!("✓ {} 年已完成，跳过", year);
                continue;
            }
            let year_summary = self.run_year(year, &selected, summary.skipped_combos).await?;
            summary.years.push(year_summary);
        }

        summary.cancelled = self.ctx.is_cancelled();
        Ok(summary)
    }

    /// 用一个临时会话读取年份与地区下拉框
    pub async fn probe_scope(&self) -> AppResult<PortalScope> {
        let layout = &self.ctx.layout;
        let download_dir = self.ctx.config.staging_dir.join("probe");
        let mut session = self.factory.open(0, &download_dir).await?;

        let probe = async {
            let condition = WaitCondition::Present(layout.year_field.clone());
            session
                .wait_for(&condition, self.ctx.config.page_wait_timeout())
                .await?;
            let years: Vec<Year> = session
                .list_options(&layout.year_field)
                .await?
                .iter()
                .filter_map(|v| v.trim().parse().ok())
                .collect();
            let locations: Vec<String> = session
                .list_options(&layout.location_field)
                .await?
                .into_iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && !v.starts_with(&layout.placeholder_text))
                .collect();
            AppResult::Ok(PortalScope { years, locations })
        }
        .await;

        if let Err(e) = session.close().await {
            warn!("关闭探测会话失败: {}", e);
        }

        let scope = probe?;
        info!(
            "🔎 门户提供 {} 个年份、{} 个地区",
            scope.years.len(),
            scope.locations.len()
        );
        Ok(scope)
    }

    async fn run_year(&self, year: Year, selected: &[Combo], skipped_combos: usize) -> AppResult<YearSummary> {
        let config = &self.ctx.config;
        let mut summary = YearSummary {
            year,
            total: selected.len(),
            ..Default::default()
        };

        let mut pending = VecDeque::new();
        for combo in selected {
            if self.ctx.checkpoints.is_done(&UnitKey::combo(year, combo)).await? {
                summary.done += 1;
            } else if self.ctx.quarantine.is_quarantined(&UnitKey::combo(year, combo)).await? {
                summary.quarantined += 1;
            } else {
                pending.push_back(combo.clone());
            }
        }

        logging::log_year_start(year, pending.len(), selected.len());

        let worker_count = config.worker_count.min(pending.len());
        let queue = Arc::new(Mutex::new(pending));
        let mut handles = Vec::new();

        for worker in 1..=worker_count {
            let queue = queue.clone();
            let ctx = self.ctx.clone();
            let factory = self.factory.clone();
            let handle = tokio::spawn(async move { run_worker(worker, year, queue, ctx, factory).await });
            handles.push((worker, handle));
        }

        for (worker, handle) in handles {
            let results = match handle.await {
                Ok(results) => results,
                Err(e) => {
                    error!("[worker {}] 任务执行失败: {}", worker, e);
                    continue;
                }
            };

            for (combo, result) in results {
                match result {
                    ComboResult::Walked(Ok(report)) => {
                        summary.units_found += report.stats.found;
                        summary.documents += report.stats.documents;
                        summary.faulty_documents += report.stats.faulty_documents;
                        match report.outcome {
                            ComboOutcome::Completed => summary.done += 1,
                            ComboOutcome::Quarantined => summary.quarantined += 1,
                            ComboOutcome::Cancelled => summary.pending += 1,
                        }
                    }
                    ComboResult::Walked(Err(e)) => {
                        error!("[worker {}] {} {} 中止: {}", worker, year, combo, e);
                        summary.pending += 1;
                    }
                    ComboResult::SessionFailed => summary.pending += 1,
                }
            }
        }

        // 取消时队列里可能还有未领取的组合
        summary.pending += queue.lock().await.len();

        let complete = summary.done == summary.total
            && config.locations.is_none()
            && skipped_combos == 0
            && !self.ctx.is_cancelled();
        if complete {
            self.ctx.checkpoints.mark_done(&UnitKey::year(year)).await?;
            summary.marked_done = true;
        }

        logging::log_year_complete(
            year,
            summary.done,
            summary.quarantined,
            summary.total,
            summary.marked_done,
        );
        Ok(summary)
    }
}

/// worker 循环：领取组合 → 打开会话 → 遍历 → 关闭会话
async fn run_worker(
    worker: usize,
    year: Year,
    queue: Arc<Mutex<VecDeque<Combo>>>,
    ctx: Arc<OrchestratorContext>,
    factory: Arc<dyn SessionFactory>,
) -> Vec<(Combo, ComboResult)> {
    let walker = ComboWalker::new(ctx.clone());
    let mut results = Vec::new();

    loop {
        if ctx.is_cancelled() {
            break;
        }
        let combo = match queue.lock().await.pop_front() {
            Some(combo) => combo,
            None => break,
        };

        let mut session = match factory.open(worker, &ctx.staging_dir(worker)).await {
            Ok(session) => session,
            Err(e) => {
                error!("[worker {}] ❌ 无法打开浏览器会话 ({}): {}", worker, combo, e);
                results.push((combo, ComboResult::SessionFailed));
                continue;
            }
        };

        let result = walker.walk(session.as_ref(), worker, year, &combo).await;

        if let Err(e) = session.close().await {
            warn!("[worker {}] 关闭浏览器会话失败: {}", worker, e);
        }
        results.push((combo, ComboResult::Walked(result)));
    }

    info!("[worker {}] 已退出", worker);
    results
}

/// 去重并按从新到旧排序
fn order_years(mut years: Vec<Year>) -> Vec<Year> {
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();
    years
}
