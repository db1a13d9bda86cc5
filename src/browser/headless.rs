use std::path::Path;

use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::InteractionError;

/// 启动浏览器并导航到指定 URL
///
/// 返回浏览器、页面以及处理 CDP 事件的后台任务句柄。
pub async fn launch_headless_browser(
    config: &Config,
    url: &str,
    download_dir: &Path,
) -> Result<(Browser, Page, JoinHandle<()>), InteractionError> {
    info!("🚀 启动浏览器 (无头: {})...", config.headless);
    debug!("目标 URL: {}", url);

    let mut builder = BrowserConfig::builder();
    builder = if config.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(executable) = &config.chrome_executable {
        builder = builder.chrome_executable(executable);
    }

    let browser_config = builder
        .args(vec![
            "--disable-gpu",             // Windows 无头模式必须禁用 GPU
            "--no-sandbox",              // 禁用沙盒，防止权限问题导致的崩溃
            "--disable-dev-shm-usage",   // 防止共享内存不足
            "--remote-debugging-port=0", // 让浏览器自动选择端口
        ])
        .build()
        .map_err(|e| {
            error!("配置浏览器失败: {}", e);
            InteractionError::SessionUnavailable(format!("配置浏览器失败: {}", e))
        })?;

    let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        InteractionError::SessionUnavailable(format!("启动浏览器失败: {}", e))
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    set_download_behavior(&browser, download_dir).await?;

    let page = browser.new_page(url).await.map_err(|e| {
        error!("创建页面失败: {}", e);
        InteractionError::NavigationFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;

    info!("✅ 浏览器已导航到: {}", url);
    Ok((browser, page, handler_task))
}

/// 把下载重定向到指定目录（必须是绝对路径）
pub async fn set_download_behavior(browser: &Browser, download_dir: &Path) -> Result<(), InteractionError> {
    let params = SetDownloadBehaviorParams::builder()
        .behavior(SetDownloadBehaviorBehavior::Allow)
        .download_path(download_dir.to_string_lossy().to_string())
        .build()
        .map_err(InteractionError::ScriptFailed)?;
    browser.execute(params).await?;
    debug!("下载目录: {}", download_dir.display());
    Ok(())
}
