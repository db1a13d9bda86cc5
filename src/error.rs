use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// 应用程序错误类型
///
/// 只有 `Config` 与 `Cancelled` 会一路传播到进程退出，
/// 其余错误都在 Combo 遍历器边界被吸收（隔离单元后继续）。
#[derive(Debug, Error)]
pub enum AppError {
    /// 页面交互错误
    #[error("页面交互错误: {0}")]
    Interaction(#[from] InteractionError),
    /// 验证码求解错误
    #[error("验证码求解错误: {0}")]
    Solver(#[from] SolverError),
    /// 下载错误
    #[error("下载错误: {0}")]
    Download(#[from] DownloadError),
    /// 本地存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 配置错误（致命，启动即中止）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 收到取消信号
    #[error("任务已取消")]
    Cancelled,
}

/// 页面交互错误
#[derive(Debug, Error)]
pub enum InteractionError {
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },
    /// 元素不存在
    #[error("元素不存在: {selector}")]
    ElementNotFound { selector: String },
    /// 下拉框中没有对应选项
    #[error("下拉框 {selector} 中没有选项 '{option}'")]
    OptionNotFound { selector: String, option: String },
    /// 等待超时
    #[error("等待 {what} 超时 ({secs} 秒)")]
    Timeout { what: String, secs: u64 },
    /// 执行脚本失败
    #[error("执行脚本失败: {0}")]
    ScriptFailed(String),
    /// 会话已关闭或启动失败
    #[error("浏览器会话不可用: {0}")]
    SessionUnavailable(String),
}

/// 验证码求解错误
#[derive(Debug, Error)]
pub enum SolverError {
    /// 求解服务不可用（网络、余额、轮询耗尽）
    #[error("求解服务不可用: {0}")]
    Unavailable(String),
    /// 求解服务拒绝或给出空答案
    #[error("求解被拒绝: {0}")]
    Rejected(String),
}

/// 下载错误
#[derive(Debug, Error)]
pub enum DownloadError {
    /// 多次尝试后仍未完成
    #[error("下载 {url} 超时 (已尝试 {attempts} 次)")]
    Timeout { url: String, attempts: u32 },
}

/// 本地存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 权限/占用冲突，可重试
    #[error("无权限访问 {path}: {source}")]
    PermissionDenied { path: PathBuf, source: io::Error },
    /// 其他 IO 错误
    #[error("IO 错误 ({path}): {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl StorageError {
    /// 根据 io 错误类型归类
    pub fn from_io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == io::ErrorKind::PermissionDenied {
            StorageError::PermissionDenied { path, source }
        } else {
            StorageError::Io { path, source }
        }
    }

    /// 是否属于可重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::PermissionDenied { .. })
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置值非法
    #[error("配置项 {name} 的值 '{value}' 非法: 期望 {expected}")]
    Invalid {
        name: String,
        value: String,
        expected: String,
    },
    /// 缺少必需配置
    #[error("缺少必需的配置项 {name}")]
    Missing { name: String },
    /// 组合文件无法使用
    #[error("组合文件 {path} 无法使用: {reason}")]
    CombosFile { path: String, reason: String },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for InteractionError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        InteractionError::ScriptFailed(err.to_string())
    }
}

impl From<serde_json::Error> for InteractionError {
    fn from(err: serde_json::Error) -> Self {
        InteractionError::ScriptFailed(format!("脚本返回值解析失败: {}", err))
    }
}

impl From<reqwest::Error> for SolverError {
    fn from(err: reqwest::Error) -> Self {
        SolverError::Unavailable(err.to_string())
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建存储错误
    pub fn storage(path: impl AsRef<Path>, source: io::Error) -> Self {
        AppError::Storage(StorageError::from_io(path, source))
    }

    /// 是否为取消
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_transient() {
        let err = StorageError::from_io(
            "faulty/x.txt",
            io::Error::new(io::ErrorKind::PermissionDenied, "locked"),
        );
        assert!(err.is_transient());

        let err = StorageError::from_io("faulty/x.txt", io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_display_keeps_context() {
        let err = AppError::from(InteractionError::OptionNotFound {
            selector: "#anio".to_string(),
            option: "2019".to_string(),
        });
        let text = err.to_string();
        assert!(text.contains("#anio"));
        assert!(text.contains("2019"));
    }
}
