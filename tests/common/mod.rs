//! 集成测试共用的桩实现
//!
//! `StubPortal` 模拟门户：按 (地区, 文件号) 给出脚本化的查询结果，
//! 并记录所有调用次数，供测试断言。

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use case_archive_scraper::browser::{BrowserSession, SessionFactory, WaitCondition};
use case_archive_scraper::config::Config;
use case_archive_scraper::context::OrchestratorContext;
use case_archive_scraper::error::{AppResult, InteractionError, SolverError};
use case_archive_scraper::models::{Combo, PortalLayout};
use case_archive_scraper::services::{ArtifactKind, ChallengeArtifact, ChallengeSolver};
use tokio_util::sync::CancellationToken;

/// 某个文件号提交后的页面
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// 结果列表，每个元素是该案件的文档数
    Found(Vec<usize>),
    Empty,
    NotFound,
    Rejected,
    /// 填写文件号时页面报错
    Broken,
}

/// 调用记录
#[derive(Debug, Default)]
pub struct CallLog {
    /// (地区, 文件号) → 提交次数
    pub attempts: HashMap<(String, u32), usize>,
    pub downloads: usize,
    pub opened: usize,
    pub closed: usize,
}

impl CallLog {
    pub fn attempts_for(&self, location: &str, file_number: u32) -> usize {
        self.attempts
            .get(&(location.to_string(), file_number))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.values().sum()
    }
}

/// 模拟门户
pub struct StubPortal {
    pub layout: PortalLayout,
    default_reply: Mutex<Reply>,
    replies: Mutex<HashMap<(String, u32), Reply>>,
    pub log: Mutex<CallLog>,
    pub years: Vec<String>,
    pub locations: Vec<String>,
    /// 剩余会"超时"（不写文件）的下载次数
    download_failures: AtomicU32,
    /// 填写到该文件号时触发取消
    cancel_at: Mutex<Option<(u32, CancellationToken)>>,
}

impl StubPortal {
    pub fn new(default_reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            layout: PortalLayout::default(),
            default_reply: Mutex::new(default_reply),
            replies: Mutex::new(HashMap::new()),
            log: Mutex::new(CallLog::default()),
            years: vec!["2020".to_string(), "2019".to_string()],
            locations: vec!["LIMA".to_string()],
            download_failures: AtomicU32::new(0),
            cancel_at: Mutex::new(None),
        })
    }

    pub fn with_scope(default_reply: Reply, years: &[&str], locations: &[&str]) -> Arc<Self> {
        let mut portal = Self::new(default_reply);
        let inner = Arc::get_mut(&mut portal).unwrap();
        inner.years = years.iter().map(|s| s.to_string()).collect();
        inner.locations = locations.iter().map(|s| s.to_string()).collect();
        portal
    }

    pub fn reply(&self, location: &str, file_number: u32, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert((location.to_string(), file_number), reply);
    }

    pub fn set_default(&self, reply: Reply) {
        *self.default_reply.lock().unwrap() = reply;
    }

    pub fn fail_downloads(&self, times: u32) {
        self.download_failures.store(times, Ordering::SeqCst);
    }

    pub fn cancel_at(&self, file_number: u32, token: CancellationToken) {
        *self.cancel_at.lock().unwrap() = Some((file_number, token));
    }

    fn reply_for(&self, location: &str, file_number: u32) -> Reply {
        self.replies
            .lock()
            .unwrap()
            .get(&(location.to_string(), file_number))
            .cloned()
            .unwrap_or_else(|| self.default_reply.lock().unwrap().clone())
    }
}

#[derive(Debug, Default)]
struct SessionState {
    location: String,
    file_number: u32,
    case: usize,
    download_dir: Option<PathBuf>,
}

/// 脚本化的浏览器会话
pub struct StubSession {
    portal: Arc<StubPortal>,
    state: Mutex<SessionState>,
}

impl StubSession {
    pub fn new(portal: Arc<StubPortal>) -> Self {
        Self {
            portal,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn current_reply(&self) -> Reply {
        let state = self.state.lock().unwrap();
        self.portal.reply_for(&state.location, state.file_number)
    }
}

#[async_trait]
impl BrowserSession for StubSession {
    async fn navigate(&self, _url: &str) -> Result<(), InteractionError> {
        Ok(())
    }

    async fn set_field(&self, selector: &str, value: &str) -> Result<(), InteractionError> {
        let layout = &self.portal.layout;
        if selector == layout.location_field {
            self.state.lock().unwrap().location = value.to_string();
        } else if selector == layout.file_number_field {
            let file_number: u32 = value.parse().unwrap();
            let location = {
                let mut state = self.state.lock().unwrap();
                state.file_number = file_number;
                state.location.clone()
            };
            *self
                .portal
                .log
                .lock()
                .unwrap()
                .attempts
                .entry((location, file_number))
                .or_default() += 1;

            if let Some((at, token)) = self.portal.cancel_at.lock().unwrap().as_ref() {
                if *at == file_number {
                    token.cancel();
                }
            }
            if self.current_reply() == Reply::Broken {
                return Err(InteractionError::ElementNotFound {
                    selector: selector.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn click(&self, _selector: &str) -> Result<(), InteractionError> {
        Ok(())
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), InteractionError> {
        if selector == self.portal.layout.case_buttons {
            self.state.lock().unwrap().case = index + 1;
        }
        Ok(())
    }

    async fn wait_for(&self, _condition: &WaitCondition, _timeout: Duration) -> Result<(), InteractionError> {
        Ok(())
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>, InteractionError> {
        let layout = &self.portal.layout;
        let reply = self.current_reply();
        if selector == layout.captcha_error {
            return Ok(Some(if reply == Reply::Rejected {
                "Codigo de captcha incorrecto".to_string()
            } else {
                String::new()
            }));
        }
        if selector == layout.no_records {
            return Ok((reply == Reply::NotFound).then(|| "No se encontraron registros".to_string()));
        }
        if selector == layout.case_title {
            return Ok(Some("EXPEDIENTE 00014-2019".to_string()));
        }
        Ok(None)
    }

    async fn read_attribute(&self, selector: &str, _attribute: &str) -> Result<Option<String>, InteractionError> {
        if selector == self.portal.layout.captcha_hidden_answer {
            return Ok(Some(" ab-12 ".to_string()));
        }
        Ok(None)
    }

    async fn read_all_attributes(&self, selector: &str, _attribute: &str) -> Result<Vec<String>, InteractionError> {
        if selector != self.portal.layout.document_links {
            return Ok(Vec::new());
        }
        let (file_number, case) = {
            let state = self.state.lock().unwrap();
            (state.file_number, state.case)
        };
        let documents = match self.current_reply() {
            Reply::Found(cases) => cases.get(case - 1).copied().unwrap_or(0),
            _ => 0,
        };
        Ok((1..=documents)
            .map(|doc| format!("https://portal.test/doc/{}/{}/{}.pdf", file_number, case, doc))
            .collect())
    }

    async fn count(&self, selector: &str) -> Result<usize, InteractionError> {
        let layout = &self.portal.layout;
        let reply = self.current_reply();
        if selector == layout.results_marker {
            return Ok(matches!(reply, Reply::Found(_) | Reply::Empty) as usize);
        }
        if selector == layout.case_buttons {
            return Ok(match reply {
                Reply::Found(cases) => cases.len(),
                _ => 0,
            });
        }
        Ok(0)
    }

    async fn list_options(&self, selector: &str) -> Result<Vec<String>, InteractionError> {
        let layout = &self.portal.layout;
        if selector == layout.year_field {
            return Ok(self.portal.years.clone());
        }
        if selector == layout.location_field {
            let mut options = vec![layout.placeholder_text.clone()];
            options.extend(self.portal.locations.iter().cloned());
            return Ok(options);
        }
        Err(InteractionError::ElementNotFound {
            selector: selector.to_string(),
        })
    }

    async fn current_source(&self) -> Result<String, InteractionError> {
        let case = self.state.lock().unwrap().case;
        Ok(format!("<html><body>case {}</body></html>", case))
    }

    async fn capture(&self, _selector: &str) -> Result<Vec<u8>, InteractionError> {
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<(), InteractionError> {
        self.state.lock().unwrap().download_dir = Some(dir.to_path_buf());
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<(), InteractionError> {
        self.portal.log.lock().unwrap().downloads += 1;

        let failures = &self.portal.download_failures;
        if failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(());
        }

        let dir = self
            .state
            .lock()
            .unwrap()
            .download_dir
            .clone()
            .ok_or_else(|| InteractionError::ScriptFailed("下载目录未设置".to_string()))?;
        std::fs::write(dir.join("resolucion.pdf"), url.as_bytes())
            .map_err(|e| InteractionError::ScriptFailed(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), InteractionError> {
        self.portal.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// 桩会话工厂
pub struct StubFactory {
    portal: Arc<StubPortal>,
    fail_open: bool,
}

impl StubFactory {
    pub fn new(portal: Arc<StubPortal>) -> Self {
        Self {
            portal,
            fail_open: false,
        }
    }

    pub fn failing(portal: Arc<StubPortal>) -> Self {
        Self {
            portal,
            fail_open: true,
        }
    }
}

#[async_trait]
impl SessionFactory for StubFactory {
    async fn open(&self, _worker: usize, _download_dir: &Path) -> AppResult<Box<dyn BrowserSession>> {
        if self.fail_open {
            return Err(InteractionError::SessionUnavailable("浏览器无法启动".to_string()).into());
        }
        self.portal.log.lock().unwrap().opened += 1;
        Ok(Box::new(StubSession::new(self.portal.clone())))
    }
}

/// 计数的验证码求解器，答案固定
#[derive(Default)]
pub struct StubSolver {
    pub calls: AtomicUsize,
    unavailable: bool,
}

impl StubSolver {
    pub fn unavailable() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            unavailable: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeSolver for StubSolver {
    fn artifact_kind(&self) -> ArtifactKind {
        ArtifactKind::Text
    }

    async fn solve(&self, _artifact: &ChallengeArtifact) -> Result<String, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(SolverError::Unavailable("余额不足".to_string()));
        }
        Ok("ab12".to_string())
    }
}

/// 测试用配置：所有目录放在临时目录下，等待时间尽量短
pub fn test_config(root: &Path) -> Config {
    Config {
        years: Some(vec![2019]),
        worker_count: 1,
        per_unit_retry_limit: 3,
        interaction_retry_limit: 1,
        empty_result_tolerance: 5,
        max_consecutive_faulty: 10,
        download_timeout_secs: 0,
        download_retry_limit: 4,
        download_poll_interval_ms: 5,
        page_wait_timeout_secs: 0,
        page_poll_interval_ms: 5,
        archive_dir: root.join("archive"),
        faulty_dir: root.join("faulty"),
        staging_dir: root.join("staging"),
        output_log_file: root.join("run.txt").to_string_lossy().to_string(),
        ..Config::default()
    }
}

pub fn context(config: Config, solver: Arc<StubSolver>, cancel: CancellationToken) -> Arc<OrchestratorContext> {
    Arc::new(OrchestratorContext::new(Arc::new(config), solver, cancel))
}

pub fn combo(location: &str) -> Combo {
    Combo::new(location, "JUZGADO DE PAZ LETRADO", "CIVIL")
}
