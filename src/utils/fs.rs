//! 文件系统辅助函数
//!
//! 权限错误在 Windows 上常见于杀毒软件或浏览器仍持有文件句柄，
//! 属于瞬时冲突，重试几次即可。

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio::time::sleep;
use tracing::warn;

use crate::error::StorageError;

const TRANSIENT_RETRIES: u32 = 5;
const TRANSIENT_BACKOFF_MS: u64 = 200;

/// 执行一次 IO 操作，遇到权限错误时退避重试
pub async fn retry_transient<T, F, Fut>(path: &Path, mut op: F) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let err = StorageError::from_io(path, e);
                attempt += 1;
                if err.is_transient() && attempt < TRANSIENT_RETRIES {
                    warn!(
                        "文件被占用 (尝试 {}/{}): {}",
                        attempt, TRANSIENT_RETRIES, path.display()
                    );
                    sleep(Duration::from_millis(TRANSIENT_BACKOFF_MS * attempt as u64)).await;
                    continue;
                }
                return Err(err);
            }
        }
    }
}

/// 移动文件，跨设备时退化为复制再删除
pub async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(e),
        Err(_) => copy_then_rename(from, to).await,
    }
}

/// 先复制到目标目录中的临时文件，再改名到位
///
/// 复制中途被中断时目标路径不会出现残缺文件。
async fn copy_then_rename(from: &Path, to: &Path) -> io::Result<()> {
    let tmp = partial_path(to);
    if let Err(e) = fs::copy(from, &tmp).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    fs::rename(&tmp, to).await?;
    fs::remove_file(from).await
}

/// `document.pdf` → `document.pdf.partial`
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// 清空并重建目录
pub async fn reset_dir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(dir).await
}
