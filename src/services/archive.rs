//! 归档服务 - 业务能力层
//!
//! 归档布局：
//! - 案件页面：`{root}/{year}/{combo-id}/html/{file}-{case}.html`
//! - 文档：`{root}/{year}/{combo-id}/{file}-{case}-{doc}/document.{ext}`
//!   与同目录下的 `source-link.txt`
//!
//! 文档最后一步才移入归档目录，因此 `document.*` 存在即代表该文档完整。

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{Combo, Year};
use crate::utils::fs::{move_file, retry_transient};

const DOCUMENT_STEM: &str = "document";
const SOURCE_LINK_FILE: &str = "source-link.txt";

/// 归档服务
#[derive(Debug, Clone)]
pub struct Archive {
    root: PathBuf,
}

impl Archive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn combo_dir(&self, year: Year, combo: &Combo) -> PathBuf {
        self.root.join(year.to_string()).join(combo.id())
    }

    pub fn case_page_path(&self, year: Year, combo: &Combo, file_number: u32, case: usize) -> PathBuf {
        self.combo_dir(year, combo)
            .join("html")
            .join(format!("{}-{}.html", file_number, case))
    }

    pub fn document_dir(
        &self,
        year: Year,
        combo: &Combo,
        file_number: u32,
        case: usize,
        document: usize,
    ) -> PathBuf {
        self.combo_dir(year, combo)
            .join(format!("{}-{}-{}", file_number, case, document))
    }

    /// 目录中是否已有归档文档
    pub async fn is_document_archived(&self, dir: &Path) -> AppResult<bool> {
        Ok(find_document(dir).await?.is_some())
    }

    /// 保存案件详情页源码（先写临时文件再改名）
    pub async fn save_case_page(&self, path: &Path, html: &str) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            retry_transient(parent, || fs::create_dir_all(parent)).await?;
        }
        let tmp = path.with_extension("html.tmp");
        retry_transient(&tmp, || fs::write(&tmp, html.as_bytes())).await?;
        retry_transient(path, || fs::rename(&tmp, path)).await?;
        debug!("案件页面已保存: {}", path.display());
        Ok(())
    }

    /// 把暂存区中下载完成的文件移入归档目录
    pub async fn archive_document(
        &self,
        staged_file: &Path,
        dir: &Path,
        source_link: &str,
    ) -> AppResult<PathBuf> {
        retry_transient(dir, || fs::create_dir_all(dir)).await?;

        let link_path = dir.join(SOURCE_LINK_FILE);
        retry_transient(&link_path, || fs::write(&link_path, source_link.as_bytes())).await?;

        let extension = staged_file
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("bin")
            .to_lowercase();
        let target = dir.join(format!("{}.{}", DOCUMENT_STEM, extension));
        retry_transient(&target, || move_file(staged_file, &target)).await?;

        debug!("文档已归档: {}", target.display());
        Ok(target)
    }
}

async fn find_document(dir: &Path) -> AppResult<Option<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AppError::storage(dir, e)),
    };
    while let Some(entry) = entries.next_entry().await.map_err(|e| AppError::storage(dir, e))? {
        let path = entry.path();
        if path.file_stem().and_then(|s| s.to_str()) == Some(DOCUMENT_STEM) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
