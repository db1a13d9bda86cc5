use std::sync::Arc;

use anyhow::{Context, Result};
use case_archive_scraper::config::{CaptchaMode, Config};
use case_archive_scraper::context::OrchestratorContext;
use case_archive_scraper::models::load_combos;
use case_archive_scraper::orchestrator::{RunSummary, Scheduler};
use case_archive_scraper::services::{AzCaptchaSolver, ChallengeSolver, PageTextSolver};
use case_archive_scraper::utils::logging;
use case_archive_scraper::ChromeSessionFactory;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    if let Err(e) = config.validate() {
        error!("❌ {}", e);
        return Err(e).context("配置校验失败");
    }

    let combos = load_combos(&config.combos_file)
        .await
        .context("无法加载组合列表")?;

    logging::init_log_file(&config.output_log_file)?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let config = Arc::new(config);
    let solver = build_solver(&config)?;
    let ctx = Arc::new(OrchestratorContext::new(config.clone(), solver, cancel.clone()));
    let factory = Arc::new(ChromeSessionFactory::new(config.clone()));

    // 运行调度器
    let scheduler = Scheduler::new(ctx.clone(), factory);
    let summary = scheduler.run(&combos).await?;

    let quarantined = ctx.quarantine.list().await?.len();
    write_summary(&config.output_log_file, &summary, quarantined)?;
    logging::print_final_stats(
        summary.units_found(),
        summary.documents(),
        quarantined,
        &config.output_log_file,
    );

    if summary.cancelled {
        warn!("⏹ 运行已取消，下次启动将从中断处继续");
    }
    Ok(())
}

fn build_solver(config: &Config) -> Result<Arc<dyn ChallengeSolver>> {
    Ok(match config.captcha_mode {
        CaptchaMode::PageText => Arc::new(PageTextSolver::new()?),
        CaptchaMode::AzCaptcha => {
            let api_key = config
                .captcha_api_key
                .clone()
                .context("缺少 CAPTCHA_APIKEY")?;
            Arc::new(AzCaptchaSolver::new(api_key, config.captcha_api_base_url.clone()))
        }
    })
}

/// Ctrl-C / SIGTERM 触发取消，worker 释放会话后退出
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!("收到终止信号，等待 worker 退出...");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!("无法监听 SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn write_summary(log_file_path: &str, summary: &RunSummary, quarantined: usize) -> Result<()> {
    let mut lines = vec![format!(
        "运行结束 - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )];
    for year in &summary.years {
        lines.push(format!(
            "{}: 组合 完成 {}/{}, 隔离 {}, 未完成 {}; 文件号 {}; 文档 {} (隔离 {}){}",
            year.year,
            year.done,
            year.total,
            year.quarantined,
            year.pending,
            year.units_found,
            year.documents,
            year.faulty_documents,
            if year.marked_done { "; 年份已完成" } else { "" }
        ));
    }
    if summary.skipped_combos > 0 {
        lines.push(format!("门户中不存在的组合: {}", summary.skipped_combos));
    }
    lines.push(format!("隔离记录总数: {}", quarantined));
    if summary.cancelled {
        lines.push("运行被取消".to_string());
    }

    logging::append_log(log_file_path, &lines.join("\n"))?;
    info!("📝 统计已写入 {}", log_file_path);
    Ok(())
}
