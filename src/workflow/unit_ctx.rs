//! 工作单元上下文
//!
//! 封装"哪个 worker 正在处理哪一年、哪个组合的第几号文件"这一信息

use std::fmt::Display;

use crate::models::{Combo, UnitKey, Year};

/// 工作单元上下文
#[derive(Debug, Clone)]
pub struct UnitCtx {
    /// worker 编号（仅用于日志和暂存目录）
    pub worker: usize,

    pub year: Year,

    pub combo: Combo,

    /// 文件号（从 1 开始）
    pub file_number: u32,
}

impl UnitCtx {
    pub fn new(worker: usize, year: Year, combo: Combo, file_number: u32) -> Self {
        Self {
            worker,
            year,
            combo,
            file_number,
        }
    }

    pub fn key(&self) -> UnitKey {
        UnitKey::file(self.year, &self.combo, self.file_number)
    }

    pub fn artifact_key(&self, case: usize, document: usize) -> UnitKey {
        UnitKey::artifact(self.year, &self.combo, self.file_number, case, document)
    }

    /// 文档序号 `{file}-{case}-{doc}`
    pub fn sequence(&self, case: usize, document: usize) -> String {
        format!("{}-{}-{}", self.file_number, case, document)
    }
}

impl Display for UnitCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[worker {}][{}/{}#{}]",
            self.worker,
            self.year,
            self.combo.id(),
            self.file_number
        )
    }
}
