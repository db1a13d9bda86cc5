//! 基于 chromiumoxide 的浏览器会话

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::Browser;
use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::browser::headless::{launch_headless_browser, set_download_behavior};
use crate::browser::session::{BrowserSession, SessionFactory, WaitCondition};
use crate::config::Config;
use crate::error::{AppError, AppResult, InteractionError};
use crate::infrastructure::{js_literal, JsExecutor};

/// Chrome 会话
///
/// 一个会话对应一个独立的浏览器进程。
pub struct ChromeSession {
    browser: Option<Browser>,
    executor: JsExecutor,
    handler_task: Option<JoinHandle<()>>,
    poll_interval: Duration,
}

impl ChromeSession {
    pub async fn launch(config: &Config, download_dir: &Path) -> AppResult<Self> {
        let download_dir = absolute_dir(download_dir).await?;
        let (browser, page, handler_task) =
            launch_headless_browser(config, &config.target_url, &download_dir).await?;

        Ok(Self {
            browser: Some(browser),
            executor: JsExecutor::new(page),
            handler_task: Some(handler_task),
            poll_interval: config.page_poll_interval(),
        })
    }

    fn browser(&self) -> Result<&Browser, InteractionError> {
        self.browser
            .as_ref()
            .ok_or_else(|| InteractionError::SessionUnavailable("会话已关闭".to_string()))
    }

    async fn check_condition(&self, condition: &WaitCondition) -> Result<bool, InteractionError> {
        let js = match condition {
            WaitCondition::Present(selector) => {
                format!("document.querySelector({}) !== null", js_literal(selector))
            }
            WaitCondition::OptionPresent { selector, option } => format!(
                r#"(() => {{
                    const el = document.querySelector({});
                    if (!el || !el.options) return false;
                    return Array.from(el.options).some(o => o.text.trim() === {});
                }})()"#,
                js_literal(selector),
                js_literal(option)
            ),
        };
        self.executor.eval_as::<bool>(js).await
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<(), InteractionError> {
        let page = self.executor.page();
        page.goto(url)
            .await
            .map_err(|e| InteractionError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        page.wait_for_navigation()
            .await
            .map_err(|e| InteractionError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        debug!("已导航到: {}", url);
        Ok(())
    }

    async fn set_field(&self, selector: &str, value: &str) -> Result<(), InteractionError> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return 'missing';
                const value = {val};
                if (el.tagName === 'SELECT') {{
                    const opt = Array.from(el.options).find(o => o.text.trim() === value);
                    if (!opt) return 'no_option';
                    el.value = opt.value;
                }} else {{
                    el.value = value;
                }}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return 'ok';
            }})()"#,
            sel = js_literal(selector),
            val = js_literal(value)
        );

        match self.executor.eval_as::<String>(js).await?.as_str() {
            "ok" => Ok(()),
            "missing" => Err(InteractionError::ElementNotFound {
                selector: selector.to_string(),
            }),
            _ => Err(InteractionError::OptionNotFound {
                selector: selector.to_string(),
                option: value.to_string(),
            }),
        }
    }

    async fn click(&self, selector: &str) -> Result<(), InteractionError> {
        self.click_nth(selector, 0).await
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), InteractionError> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelectorAll({})[{}];
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            js_literal(selector),
            index
        );
        if self.executor.eval_as::<bool>(js).await? {
            Ok(())
        } else {
            Err(InteractionError::ElementNotFound {
                selector: format!("{}[{}]", selector, index),
            })
        }
    }

    async fn wait_for(&self, condition: &WaitCondition, timeout: Duration) -> Result<(), InteractionError> {
        let started = Instant::now();
        loop {
            // 页面跳转期间脚本可能失败，视为条件未满足
            match self.check_condition(condition).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => debug!("检查 {} 失败: {}", condition.describe(), e),
            }
            if started.elapsed() >= timeout {
                return Err(InteractionError::Timeout {
                    what: condition.describe(),
                    secs: timeout.as_secs(),
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>, InteractionError> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({});
                return el === null ? null : el.innerText;
            }})()"#,
            js_literal(selector)
        );
        self.executor.eval_as::<Option<String>>(js).await
    }

    async fn read_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>, InteractionError> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (el === null) return null;
                const prop = el[{attr}];
                return (prop !== undefined && prop !== null) ? String(prop) : el.getAttribute({attr});
            }})()"#,
            sel = js_literal(selector),
            attr = js_literal(attribute)
        );
        self.executor.eval_as::<Option<String>>(js).await
    }

    async fn read_all_attributes(&self, selector: &str, attribute: &str) -> Result<Vec<String>, InteractionError> {
        let js = format!(
            r#"Array.from(document.querySelectorAll({sel}))
                .map(el => {{
                    const prop = el[{attr}];
                    return (prop !== undefined && prop !== null) ? String(prop) : el.getAttribute({attr});
                }})
                .filter(v => v !== null && v !== '')"#,
            sel = js_literal(selector),
            attr = js_literal(attribute)
        );
        self.executor.eval_as::<Vec<String>>(js).await
    }

    async fn count(&self, selector: &str) -> Result<usize, InteractionError> {
        let js = format!("document.querySelectorAll({}).length", js_literal(selector));
        self.executor.eval_as::<usize>(js).await
    }

    async fn list_options(&self, selector: &str) -> Result<Vec<String>, InteractionError> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el || !el.options) return null;
                return Array.from(el.options).map(o => o.text.trim());
            }})()"#,
            js_literal(selector)
        );
        self.executor
            .eval_as::<Option<Vec<String>>>(js)
            .await?
            .ok_or_else(|| InteractionError::ElementNotFound {
                selector: selector.to_string(),
            })
    }

    async fn current_source(&self) -> Result<String, InteractionError> {
        Ok(self.executor.page().content().await?)
    }

    async fn capture(&self, selector: &str) -> Result<Vec<u8>, InteractionError> {
        let element = self
            .executor
            .page()
            .find_element(selector)
            .await
            .map_err(|_| InteractionError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        Ok(element.screenshot(CaptureScreenshotFormat::Png).await?)
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<(), InteractionError> {
        let dir = absolute_dir(dir)
            .await
            .map_err(|e| InteractionError::ScriptFailed(e.to_string()))?;
        set_download_behavior(self.browser()?, &dir).await
    }

    async fn download(&self, url: &str) -> Result<(), InteractionError> {
        // 通过临时 <a download> 触发，浏览器按下载行为写入暂存目录
        let js = format!(
            r#"(() => {{
                const a = document.createElement('a');
                a.href = {};
                a.download = '';
                document.body.appendChild(a);
                a.click();
                a.remove();
                return true;
            }})()"#,
            js_literal(url)
        );
        self.executor.eval(js).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), InteractionError> {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            let _ = browser.wait().await;
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        debug!("浏览器会话已关闭");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}

async fn absolute_dir(dir: &Path) -> AppResult<std::path::PathBuf> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::storage(dir, e))?;
    fs::canonicalize(dir)
        .await
        .map_err(|e| AppError::storage(dir, e))
}

/// Chrome 会话工厂
pub struct ChromeSessionFactory {
    config: Arc<Config>,
}

impl ChromeSessionFactory {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self, worker: usize, download_dir: &Path) -> AppResult<Box<dyn BrowserSession>> {
        debug!("[worker {}] 打开浏览器会话", worker);
        let session = ChromeSession::launch(&self.config, download_dir).await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "需要本地 Chrome"]
    async fn test_launch_and_read_options() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::default();
        let mut session = ChromeSession::launch(&config, tmp.path()).await.unwrap();
        let options = session.list_options("#anio").await.unwrap();
        assert!(!options.is_empty());
        session.close().await.unwrap();
    }
}
