use anyhow::{Context, Result};
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅者
///
/// `RUST_LOG` 优先；否则 `verbose` 为 true 时使用 debug 级别，默认 info。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n案件归档日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件 {}", log_file_path))?;
    Ok(())
}

/// 追加一段文本到日志文件
pub fn append_log(log_file_path: &str, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件 {}", log_file_path))?;
    writeln!(file, "{}", text)?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `worker_count`: 并发 worker 数
/// - `combo_count`: 组合总数
pub fn log_startup(worker_count: usize, combo_count: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 多 worker 案件归档模式");
    info!("📊 worker 数量: {}", worker_count);
    info!("📋 组合数量: {}", combo_count);
    info!("{}", "=".repeat(60));
}

/// 记录年份开始信息
pub fn log_year_start(year: u32, pending: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理 {} 年", year);
    info!("📄 待处理组合: {} / 共 {} 个", pending, total);
    info!("{}", "=".repeat(60));
}

/// 记录年份完成信息
pub fn log_year_complete(year: u32, done: usize, quarantined: usize, total: usize, marked: bool) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ {} 年结束: 完成 {}/{}, 隔离 {}{}",
        year,
        done,
        total,
        quarantined,
        if marked { " (已标记完成)" } else { "" }
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `units_found`: 成功归档的文件号数量
/// - `documents`: 归档文档数量
/// - `quarantined`: 隔离记录总数
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(units_found: usize, documents: usize, quarantined: usize, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 归档文件号: {}", units_found);
    info!("📄 归档文档: {}", documents);
    info!("❌ 隔离记录: {}", quarantined);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("案件编号很长", 2), "案件...");
        assert_eq!(truncate_text("abc", 5), "abc");
    }

    #[test]
    fn test_log_file_header_then_append() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.txt");
        let path = path.to_str().unwrap();

        init_log_file(path).unwrap();
        append_log(path, "2019: 3/3").unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with(&"=".repeat(60)));
        assert!(content.trim_end().ends_with("2019: 3/3"));
    }
}
