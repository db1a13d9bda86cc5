use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::Year;

/// 验证码求解方式
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptchaMode {
    /// 读取页面隐藏字段中的答案
    PageText,
    /// 截图上传到 azcaptcha
    AzCaptcha,
}

impl CaptchaMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "page_text" => Some(CaptchaMode::PageText),
            "azcaptcha" => Some(CaptchaMode::AzCaptcha),
            _ => None,
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 要处理的年份（None 表示门户下拉框中的全部年份）
    pub years: Option<Vec<Year>>,
    /// 只处理这些地区（None 表示全部）
    pub locations: Option<Vec<String>>,
    /// 并发 worker 数量，每个 worker 独占一个浏览器会话
    pub worker_count: usize,
    /// 单个文件号允许的连续验证码失败次数
    pub per_unit_retry_limit: u32,
    /// 页面交互失败后重新加载表单的次数
    pub interaction_retry_limit: u32,
    /// 连续空结果达到此数即视为组合已遍历完
    pub empty_result_tolerance: u32,
    /// 连续 Faulty 达到此数即隔离整个组合
    pub max_consecutive_faulty: u32,
    /// 单次下载等待秒数
    pub download_timeout_secs: u64,
    /// 单个文档的下载尝试次数
    pub download_retry_limit: u32,
    /// 下载目录轮询间隔（毫秒）
    pub download_poll_interval_ms: u64,
    /// 页面状态等待秒数
    pub page_wait_timeout_secs: u64,
    /// 页面状态轮询间隔（毫秒）
    pub page_poll_interval_ms: u64,
    /// 归档根目录
    pub archive_dir: PathBuf,
    /// 隔离记录目录
    pub faulty_dir: PathBuf,
    /// 下载暂存目录
    pub staging_dir: PathBuf,
    /// 组合列表 TOML 文件
    pub combos_file: PathBuf,
    /// 查询表单 URL
    pub target_url: String,
    /// 结果汇总页 URL（查看案件详情后返回这里）
    pub results_url: String,
    /// Chrome 可执行文件路径
    pub chrome_executable: Option<PathBuf>,
    /// 是否无头模式
    pub headless: bool,
    // --- 验证码配置 ---
    pub captcha_mode: CaptchaMode,
    pub captcha_api_key: Option<String>,
    pub captcha_api_base_url: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            years: None,
            locations: None,
            worker_count: 4,
            per_unit_retry_limit: 5,
            interaction_retry_limit: 3,
            empty_result_tolerance: 5,
            max_consecutive_faulty: 10,
            download_timeout_secs: 10,
            download_retry_limit: 4,
            download_poll_interval_ms: 1000,
            page_wait_timeout_secs: 10,
            page_poll_interval_ms: 250,
            archive_dir: PathBuf::from("archive"),
            faulty_dir: PathBuf::from("faulty"),
            staging_dir: PathBuf::from("staging"),
            combos_file: PathBuf::from("combos.toml"),
            target_url: "https://cej.pj.gob.pe/cej/forms/busquedaform.html".to_string(),
            results_url: "https://cej.pj.gob.pe/cej/forms/resumenform.html".to_string(),
            chrome_executable: None,
            headless: true,
            captcha_mode: CaptchaMode::PageText,
            captcha_api_key: None,
            captcha_api_base_url: "http://azcaptcha.com".to_string(),
            output_log_file: "scrape_log.txt".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            years: env_list("CEJ_YEARS").map(|items| items.iter().filter_map(|v| v.parse().ok()).collect()),
            locations: env_list("CEJ_LOCATIONS"),
            worker_count: env_parse("WORKER_COUNT").unwrap_or(default.worker_count),
            per_unit_retry_limit: env_parse("PER_UNIT_RETRY_LIMIT").unwrap_or(default.per_unit_retry_limit),
            interaction_retry_limit: env_parse("INTERACTION_RETRY_LIMIT").unwrap_or(default.interaction_retry_limit),
            empty_result_tolerance: env_parse("EMPTY_RESULT_TOLERANCE").unwrap_or(default.empty_result_tolerance),
            max_consecutive_faulty: env_parse("MAX_CONSECUTIVE_FAULTY").unwrap_or(default.max_consecutive_faulty),
            download_timeout_secs: env_parse("DOWNLOAD_TIMEOUT_SECS").unwrap_or(default.download_timeout_secs),
            download_retry_limit: env_parse("DOWNLOAD_RETRY_LIMIT").unwrap_or(default.download_retry_limit),
            download_poll_interval_ms: env_parse("DOWNLOAD_POLL_INTERVAL_MS").unwrap_or(default.download_poll_interval_ms),
            page_wait_timeout_secs: env_parse("PAGE_WAIT_TIMEOUT_SECS").unwrap_or(default.page_wait_timeout_secs),
            page_poll_interval_ms: env_parse("PAGE_POLL_INTERVAL_MS").unwrap_or(default.page_poll_interval_ms),
            archive_dir: std::env::var("ARCHIVE_DIR").map(PathBuf::from).unwrap_or(default.archive_dir),
            faulty_dir: std::env::var("FAULTY_DIR").map(PathBuf::from).unwrap_or(default.faulty_dir),
            staging_dir: std::env::var("STAGING_DIR").map(PathBuf::from).unwrap_or(default.staging_dir),
            combos_file: std::env::var("COMBOS_FILE").map(PathBuf::from).unwrap_or(default.combos_file),
            target_url: std::env::var("TARGET_URL").unwrap_or(default.target_url),
            results_url: std::env::var("RESULTS_URL").unwrap_or(default.results_url),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().map(PathBuf::from),
            headless: env_parse("HEADLESS").unwrap_or(default.headless),
            captcha_mode: std::env::var("CAPTCHA_MODE")
                .ok()
                .and_then(|v| CaptchaMode::parse(&v))
                .unwrap_or(default.captcha_mode),
            captcha_api_key: std::env::var("CAPTCHA_APIKEY").ok().filter(|v| !v.trim().is_empty()),
            captcha_api_base_url: std::env::var("CAPTCHA_API_BASE_URL").unwrap_or(default.captcha_api_base_url),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
        }
    }

    /// 启动前校验，任何错误都是致命的
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid {
                name: "WORKER_COUNT".to_string(),
                value: self.worker_count.to_string(),
                expected: "至少为 1".to_string(),
            });
        }
        if self.per_unit_retry_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "PER_UNIT_RETRY_LIMIT".to_string(),
                value: "0".to_string(),
                expected: "至少为 1".to_string(),
            });
        }
        if self.empty_result_tolerance == 0 {
            return Err(ConfigError::Invalid {
                name: "EMPTY_RESULT_TOLERANCE".to_string(),
                value: "0".to_string(),
                expected: "至少为 1".to_string(),
            });
        }
        if self.download_retry_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "DOWNLOAD_RETRY_LIMIT".to_string(),
                value: "0".to_string(),
                expected: "至少为 1".to_string(),
            });
        }
        if let Some(years) = &self.years {
            if years.is_empty() {
                return Err(ConfigError::Invalid {
                    name: "CEJ_YEARS".to_string(),
                    value: String::new(),
                    expected: "逗号分隔的年份列表".to_string(),
                });
            }
        }
        if self.captcha_mode == CaptchaMode::AzCaptcha && self.captcha_api_key.is_none() {
            return Err(ConfigError::Missing {
                name: "CAPTCHA_APIKEY".to_string(),
            });
        }
        Ok(())
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn download_poll_interval(&self) -> Duration {
        Duration::from_millis(self.download_poll_interval_ms)
    }

    pub fn page_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.page_wait_timeout_secs)
    }

    pub fn page_poll_interval(&self) -> Duration {
        Duration::from_millis(self.page_poll_interval_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|v| split_list(&v)).filter(|items| !items.is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
