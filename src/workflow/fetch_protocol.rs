//! 查询流程 - 流程层
//!
//! 核心职责：定义"一个文件号"的完整查询流程
//!
//! 流程顺序：
//! 1. 填写表单（地区 → 机构类型 → 专业 → 年份 → 文件号）
//! 2. 取得验证码 → 求解 → 填写 → 提交
//! 3. 轮询结果：验证码错误 / 没有记录 / 结果列表
//! 4. 有结果时逐个打开案件，保存页面并下载全部文档
//!
//! 失败处理全部是有界循环：验证码失败累计到 `per_unit_retry_limit`，
//! 页面交互失败累计到 `interaction_retry_limit`，之后返回 `Faulty`。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, WaitCondition};
use crate::context::OrchestratorContext;
use crate::error::{AppError, AppResult, DownloadError, InteractionError};
use crate::services::download_tracker::completed_files;
use crate::services::{ArtifactKind, ChallengeArtifact, DownloadStatus};
use crate::utils::fs::{reset_dir, retry_transient};
use crate::utils::logging::truncate_text;
use crate::workflow::unit_ctx::UnitCtx;

/// 打开案件详情时的最多点击次数
const CASE_OPEN_ATTEMPTS: u32 = 5;

/// 单个文件号的查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 找到案件，文档已归档或逐个隔离
    Found {
        cases: usize,
        documents: usize,
        faulty_documents: usize,
    },
    /// 结果列表为空，但不代表组合已遍历完
    EmptyTransient,
    /// 门户明确表示没有记录
    NoMoreResults,
    /// 重试耗尽
    Faulty { reason: String },
}

/// 提交后的页面状态
#[derive(Debug, Clone, PartialEq, Eq)]
enum Submission {
    Found { cases: usize },
    Empty,
    NotFound,
    ChallengeRejected(String),
}

/// 单个文档的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentResult {
    Archived,
    AlreadyHandled,
    Quarantined,
}

#[derive(Debug, Default)]
struct Collected {
    documents: usize,
    faulty_documents: usize,
}

/// 查询流程
///
/// - 只编排调用顺序并判断结果，不认识 DOM 结构
/// - 不持有会话，由调用者传入
pub struct FetchProtocol {
    ctx: Arc<OrchestratorContext>,
}

impl FetchProtocol {
    pub fn new(ctx: Arc<OrchestratorContext>) -> Self {
        Self { ctx }
    }

    /// 执行一个文件号的完整流程
    ///
    /// 只有取消会以 `Err(AppError::Cancelled)` 返回，其余失败都归为 `Faulty`。
    pub async fn run(&self, session: &dyn BrowserSession, unit: &UnitCtx) -> AppResult<FetchOutcome> {
        let config = &self.ctx.config;
        let mut rejected = 0u32;
        let mut interaction_failures = 0u32;

        loop {
            self.ctx.ensure_active()?;

            let failure = match self.attempt(session, unit).await {
                Ok(Submission::NotFound) => {
                    info!("{} 没有记录", unit);
                    return Ok(FetchOutcome::NoMoreResults);
                }
                Ok(Submission::Empty) => {
                    info!("{} 结果列表为空", unit);
                    return Ok(FetchOutcome::EmptyTransient);
                }
                Ok(Submission::Found { cases }) => {
                    info!("{} ✓ 找到 {} 个案件", unit, cases);
                    match self.collect(session, unit, cases).await {
                        Ok(collected) => {
                            return Ok(FetchOutcome::Found {
                                cases,
                                documents: collected.documents,
                                faulty_documents: collected.faulty_documents,
                            })
                        }
                        Err(e) => e,
                    }
                }
                Ok(Submission::ChallengeRejected(message)) => {
                    rejected += 1;
                    warn!(
                        "{} ⚠️ 验证码被拒绝 ({}/{}): {}",
                        unit,
                        rejected,
                        config.per_unit_retry_limit,
                        truncate_text(&message, 60)
                    );
                    if rejected >= config.per_unit_retry_limit {
                        return Ok(FetchOutcome::Faulty {
                            reason: format!("验证码连续被拒绝 {} 次", rejected),
                        });
                    }
                    continue;
                }
                Err(e) => e,
            };

            match failure {
                AppError::Cancelled => return Err(AppError::Cancelled),
                AppError::Solver(e) => {
                    rejected += 1;
                    warn!(
                        "{} ⚠️ 验证码求解失败 ({}/{}): {}",
                        unit, rejected, config.per_unit_retry_limit, e
                    );
                    if rejected >= config.per_unit_retry_limit {
                        return Ok(FetchOutcome::Faulty {
                            reason: format!("验证码求解失败 {} 次: {}", rejected, e),
                        });
                    }
                }
                AppError::Interaction(e) => {
                    interaction_failures += 1;
                    warn!(
                        "{} ⚠️ 页面交互失败 ({}/{}): {}",
                        unit, interaction_failures, config.interaction_retry_limit, e
                    );
                    if interaction_failures > config.interaction_retry_limit {
                        return Ok(FetchOutcome::Faulty {
                            reason: format!("页面交互失败 {} 次: {}", interaction_failures, e),
                        });
                    }
                }
                other => {
                    return Ok(FetchOutcome::Faulty {
                        reason: other.to_string(),
                    })
                }
            }
        }
    }

    /// 一次完整的提交：填表 → 验证码 → 提交 → 等待结果
    async fn attempt(&self, session: &dyn BrowserSession, unit: &UnitCtx) -> AppResult<Submission> {
        self.guarded(session.navigate(&self.ctx.config.target_url)).await?;
        self.fill_form(session, unit).await?;
        debug!("{} 表单已填写", unit);

        let answer = self.solve_challenge(session).await?;
        let layout = &self.ctx.layout;
        self.guarded(session.set_field(&layout.captcha_input, &answer)).await?;
        self.guarded(session.click(&layout.submit_button)).await?;
        debug!("{} 已提交", unit);

        self.await_submission(session).await
    }

    async fn fill_form(&self, session: &dyn BrowserSession, unit: &UnitCtx) -> AppResult<()> {
        let layout = &self.ctx.layout;
        let year = unit.year.to_string();
        let file_number = unit.file_number.to_string();

        // 机构类型和专业的选项随前一个下拉框加载，必须等选项出现
        let selects = [
            (&layout.location_field, unit.combo.location.as_str()),
            (&layout.court_type_field, unit.combo.court_type.as_str()),
            (&layout.specialty_field, unit.combo.specialty.as_str()),
            (&layout.year_field, year.as_str()),
        ];
        for (selector, option) in selects {
            self.ctx.ensure_active()?;
            let condition = WaitCondition::OptionPresent {
                selector: selector.clone(),
                option: option.to_string(),
            };
            self.guarded(session.wait_for(&condition, self.ctx.config.page_wait_timeout()))
                .await?;
            self.guarded(session.set_field(selector, option)).await?;
        }

        self.guarded(session.set_field(&layout.file_number_field, &file_number))
            .await
    }

    async fn solve_challenge(&self, session: &dyn BrowserSession) -> AppResult<String> {
        let layout = &self.ctx.layout;
        let artifact = match self.ctx.solver.artifact_kind() {
            ArtifactKind::Text => {
                self.guarded(session.click(&layout.captcha_reload)).await?;
                let condition = WaitCondition::Present(layout.captcha_hidden_answer.clone());
                self.guarded(session.wait_for(&condition, self.ctx.config.page_wait_timeout()))
                    .await?;
                let text = self
                    .guarded(session.read_attribute(&layout.captcha_hidden_answer, "value"))
                    .await?
                    .unwrap_or_default();
                ChallengeArtifact::Text(text)
            }
            ArtifactKind::Image => {
                let png = self.guarded(session.capture(&layout.captcha_image)).await?;
                ChallengeArtifact::Image { png }
            }
        };

        self.guarded(self.ctx.solver.solve(&artifact)).await
    }

    /// 轮询提交后的页面，每种结果只认一个明确的信号
    async fn await_submission(&self, session: &dyn BrowserSession) -> AppResult<Submission> {
        let layout = &self.ctx.layout;
        let timeout = self.ctx.config.page_wait_timeout();
        let started = Instant::now();

        loop {
            let captcha_error = self.guarded(session.read_text(&layout.captcha_error)).await?;
            if let Some(message) = non_blank(captcha_error) {
                return Ok(Submission::ChallengeRejected(message));
            }

            let no_records = self.guarded(session.read_text(&layout.no_records)).await?;
            if non_blank(no_records).is_some() {
                return Ok(Submission::NotFound);
            }

            if self.guarded(session.count(&layout.results_marker)).await? > 0 {
                let cases = self.guarded(session.count(&layout.case_buttons)).await?;
                return Ok(if cases == 0 {
                    Submission::Empty
                } else {
                    Submission::Found { cases }
                });
            }

            if started.elapsed() >= timeout {
                return Err(InteractionError::Timeout {
                    what: "查询结果".to_string(),
                    secs: timeout.as_secs(),
                }
                .into());
            }
            self.pause(self.ctx.config.page_poll_interval()).await?;
        }
    }

    /// 逐个打开案件，保存详情页并下载文档
    async fn collect(&self, session: &dyn BrowserSession, unit: &UnitCtx, cases: usize) -> AppResult<Collected> {
        let layout = &self.ctx.layout;
        let mut collected = Collected::default();

        for case in 1..=cases {
            self.ctx.ensure_active()?;
            self.open_case(session, case).await?;

            if let Some(title) = non_blank(self.guarded(session.read_text(&layout.case_title)).await?) {
                info!("{} 案件 {}/{}: {}", unit, case, cases, truncate_text(&title, 40));
            }

            let html = self.guarded(session.current_source()).await?;
            let page_path = self
                .ctx
                .archive
                .case_page_path(unit.year, &unit.combo, unit.file_number, case);
            self.ctx.archive.save_case_page(&page_path, &html).await?;

            let links = self
                .guarded(session.read_all_attributes(&layout.document_links, "href"))
                .await?;
            debug!("{} 案件 {} 有 {} 个文档", unit, case, links.len());

            for (index, link) in links.iter().enumerate() {
                match self.fetch_document(session, unit, case, index + 1, link).await? {
                    DocumentResult::Archived => collected.documents += 1,
                    DocumentResult::Quarantined => collected.faulty_documents += 1,
                    DocumentResult::AlreadyHandled => {}
                }
            }

            self.guarded(session.navigate(&self.ctx.config.results_url)).await?;
            let condition = WaitCondition::Present(layout.results_marker.clone());
            self.guarded(session.wait_for(&condition, self.ctx.config.page_wait_timeout()))
                .await?;
        }

        Ok(collected)
    }

    async fn open_case(&self, session: &dyn BrowserSession, case: usize) -> AppResult<()> {
        let layout = &self.ctx.layout;
        let condition = WaitCondition::Present(layout.case_detail_marker.clone());
        let mut last_error = None;

        for _ in 0..CASE_OPEN_ATTEMPTS {
            self.guarded(session.click_nth(&layout.case_buttons, case - 1)).await?;
            match self
                .guarded(session.wait_for(&condition, self.ctx.config.page_wait_timeout()))
                .await
            {
                Ok(()) => return Ok(()),
                Err(AppError::Interaction(e)) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| InteractionError::ElementNotFound {
                selector: layout.case_detail_marker.clone(),
            })
            .into())
    }

    /// 下载单个文档，超时重试，耗尽后只隔离该文档
    async fn fetch_document(
        &self,
        session: &dyn BrowserSession,
        unit: &UnitCtx,
        case: usize,
        document: usize,
        link: &str,
    ) -> AppResult<DocumentResult> {
        let config = &self.ctx.config;
        let key = unit.artifact_key(case, document);
        let target_dir = self
            .ctx
            .archive
            .document_dir(unit.year, &unit.combo, unit.file_number, case, document);

        if self.ctx.archive.is_document_archived(&target_dir).await? {
            debug!("{} 文档 {} 已归档，跳过", unit, unit.sequence(case, document));
            return Ok(DocumentResult::AlreadyHandled);
        }
        if self.ctx.quarantine.is_quarantined(&key).await? {
            debug!("{} 文档 {} 已隔离，跳过", unit, unit.sequence(case, document));
            return Ok(DocumentResult::AlreadyHandled);
        }

        let staging = self
            .ctx
            .staging_dir(unit.worker)
            .join(unit.sequence(case, document));

        for attempt in 1..=config.download_retry_limit {
            self.ctx.ensure_active()?;
            retry_transient(&staging, || reset_dir(&staging)).await?;
            self.guarded(session.set_download_dir(&staging)).await?;
            self.guarded(session.download(link)).await?;

            let status = self
                .ctx
                .downloads
                .await_completion(&staging, config.download_timeout(), Some(1), &self.ctx.cancel)
                .await?;

            if status == DownloadStatus::Completed {
                if let Some(file) = completed_files(&staging).await?.into_iter().next() {
                    self.ctx.archive.archive_document(&file, &target_dir, link).await?;
                    info!("{} 📄 文档 {} 已归档", unit, unit.sequence(case, document));
                    return Ok(DocumentResult::Archived);
                }
            }

            warn!(
                "{} ⚠️ 文档 {} 下载超时 (尝试 {}/{})",
                unit,
                unit.sequence(case, document),
                attempt,
                config.download_retry_limit
            );
        }

        let error = DownloadError::Timeout {
            url: link.to_string(),
            attempts: config.download_retry_limit,
        };
        self.ctx.quarantine.quarantine(&key, &error.to_string()).await?;
        warn!("{} ❌ 文档 {} 已隔离: {}", unit, unit.sequence(case, document), error);
        Ok(DocumentResult::Quarantined)
    }

    /// 等待外部操作，同时响应取消信号
    async fn guarded<T, E, F>(&self, operation: F) -> AppResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<AppError>,
    {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => Err(AppError::Cancelled),
            result = operation => result.map_err(Into::into),
        }
    }

    async fn pause(&self, duration: Duration) -> AppResult<()> {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => Err(AppError::Cancelled),
            _ = sleep(duration) => Ok(()),
        }
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
