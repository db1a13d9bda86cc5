//! 单个组合遍历器 - 编排层
//!
//! ## 职责
//!
//! 按 1, 2, 3, … 的顺序驱动一个组合的文件号，直到遇到终止条件。
//!
//! ## 终止条件
//!
//! 1. 门户明确表示没有记录
//! 2. 连续 `empty_result_tolerance` 次空结果
//! 3. 连续 `max_consecutive_faulty` 次 Faulty（隔离整个组合）
//! 4. 取消信号
//!
//! 前两种写入组合完成标记；后两种不写。

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::browser::BrowserSession;
use crate::context::OrchestratorContext;
use crate::error::AppResult;
use crate::models::{Combo, UnitKey, Year};
use crate::utils::logging::truncate_text;
use crate::workflow::{FetchOutcome, FetchProtocol, UnitCtx};

/// 组合遍历结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboOutcome {
    /// 已写入组合完成标记
    Completed,
    /// 连续失败过多，组合被隔离
    Quarantined,
    /// 被取消，下次运行从中断的文件号继续
    Cancelled,
}

/// 组合统计
#[derive(Debug, Default, Clone)]
pub struct ComboStats {
    pub found: usize,
    pub empty: usize,
    pub faulty: usize,
    /// 已完成或已隔离而跳过的文件号
    pub skipped: usize,
    pub documents: usize,
    pub faulty_documents: usize,
}

/// 组合遍历报告
#[derive(Debug, Clone)]
pub struct ComboReport {
    pub outcome: ComboOutcome,
    pub stats: ComboStats,
}

/// 组合遍历器
pub struct ComboWalker {
    ctx: Arc<OrchestratorContext>,
    protocol: FetchProtocol,
}

impl ComboWalker {
    pub fn new(ctx: Arc<OrchestratorContext>) -> Self {
        Self {
            protocol: FetchProtocol::new(ctx.clone()),
            ctx,
        }
    }

    /// 遍历一个组合
    ///
    /// 单个文件号的失败在这里被吸收；只有检查点存储本身出错时返回 `Err`。
    pub async fn walk(
        &self,
        session: &dyn BrowserSession,
        worker: usize,
        year: Year,
        combo: &Combo,
    ) -> AppResult<ComboReport> {
        let config = &self.ctx.config;
        let combo_key = UnitKey::combo(year, combo);
        let mut stats = ComboStats::default();

        if self.ctx.checkpoints.is_done(&combo_key).await? {
            info!("[worker {}] {} {} 已完成，跳过", worker, year, combo);
            return Ok(ComboReport {
                outcome: ComboOutcome::Completed,
                stats,
            });
        }

        info!("[worker {}] 📦 开始遍历 {} {}", worker, year, combo);

        let mut file_number: u32 = 1;
        let mut consecutive_empty = 0u32;
        let mut consecutive_faulty = 0u32;

        loop {
            if self.ctx.is_cancelled() {
                return Ok(self.cancelled(worker, year, combo, file_number, stats));
            }

            let unit = UnitCtx::new(worker, year, combo.clone(), file_number);
            let key = unit.key();

            if self.ctx.checkpoints.is_done(&key).await? {
                stats.skipped += 1;
                consecutive_empty = 0;
                file_number += 1;
                continue;
            }
            if self.ctx.quarantine.is_quarantined(&key).await? {
                info!("{} 已隔离，跳过", unit);
                stats.skipped += 1;
                file_number += 1;
                continue;
            }

            let outcome = match self.protocol.run(session, &unit).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => {
                    return Ok(self.cancelled(worker, year, combo, file_number, stats));
                }
                Err(e) => FetchOutcome::Faulty {
                    reason: e.to_string(),
                },
            };

            match outcome {
                FetchOutcome::Found {
                    documents,
                    faulty_documents,
                    ..
                } => {
                    self.ctx.checkpoints.mark_done(&key).await?;
                    stats.found += 1;
                    stats.documents += documents;
                    stats.faulty_documents += faulty_documents;
                    consecutive_empty = 0;
                    consecutive_faulty = 0;
                }
                FetchOutcome::EmptyTransient => {
                    stats.empty += 1;
                    consecutive_empty += 1;
                    consecutive_faulty = 0;
                    if consecutive_empty >= config.empty_result_tolerance {
                        info!(
                            "{} 连续 {} 次空结果，视为组合已遍历完",
                            unit, consecutive_empty
                        );
                        return self.complete(worker, year, combo, stats).await;
                    }
                }
                FetchOutcome::NoMoreResults => {
                    return self.complete(worker, year, combo, stats).await;
                }
                FetchOutcome::Faulty { reason } => {
                    warn!("{} ❌ 放弃该文件号: {}", unit, truncate_text(&reason, 120));
                    self.ctx.quarantine.quarantine(&key, &reason).await?;
                    stats.faulty += 1;
                    // 空结果计数只由找到结果清零
                    consecutive_faulty += 1;

                    if config.max_consecutive_faulty > 0
                        && consecutive_faulty >= config.max_consecutive_faulty
                    {
                        let reason = format!("连续 {} 个文件号失败", consecutive_faulty);
                        self.ctx.quarantine.quarantine(&combo_key, &reason).await?;
                        error!("[worker {}] ❌ {} {} 已隔离: {}", worker, year, combo, reason);
                        return Ok(ComboReport {
                            outcome: ComboOutcome::Quarantined,
                            stats,
                        });
                    }
                }
            }

            file_number += 1;
        }
    }

    async fn complete(
        &self,
        worker: usize,
        year: Year,
        combo: &Combo,
        stats: ComboStats,
    ) -> AppResult<ComboReport> {
        self.ctx.checkpoints.mark_done(&UnitKey::combo(year, combo)).await?;
        info!(
            "[worker {}] ✅ {} {} 完成: 找到 {}, 空 {}, 失败 {}, 跳过 {}, 文档 {}",
            worker,
            year,
            combo,
            stats.found,
            stats.empty,
            stats.faulty,
            stats.skipped,
            stats.documents
        );
        Ok(ComboReport {
            outcome: ComboOutcome::Completed,
            stats,
        })
    }

    fn cancelled(
        &self,
        worker: usize,
        year: Year,
        combo: &Combo,
        file_number: u32,
        stats: ComboStats,
    ) -> ComboReport {
        warn!(
            "[worker {}] ⏹ {} {} 在文件号 {} 处取消",
            worker, year, combo, file_number
        );
        ComboReport {
            outcome: ComboOutcome::Cancelled,
            stats,
        }
    }
}
