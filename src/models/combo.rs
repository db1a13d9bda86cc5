use std::fmt;

use serde::{Deserialize, Serialize};

/// 抓取年份
pub type Year = u32;

/// 一个独立、按文件号顺序编号的搜索空间
///
/// (地区, 法院类型, 专业) 三元组
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combo {
    pub location: String,
    pub court_type: String,
    pub specialty: String,
}

impl Combo {
    pub fn new(
        location: impl Into<String>,
        court_type: impl Into<String>,
        specialty: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            court_type: court_type.into(),
            specialty: specialty.into(),
        }
    }

    /// 稳定的目录名
    ///
    /// 各分量内的非字母数字字符替换为 `-`，空分量记为 `-`，分量之间用 `_` 连接，
    /// 因此 id 中永远不会出现 `__`。不同组合可能得到相同的 id，
    /// 加载组合文件时会拒绝这种冲突。
    pub fn id(&self) -> String {
        [&self.location, &self.court_type, &self.specialty]
            .iter()
            .map(|part| sanitize_component(part))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.location, self.court_type, self.specialty)
    }
}

fn sanitize_component(part: &str) -> String {
    let sanitized: String = part
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    if sanitized.is_empty() {
        "-".to_string()
    } else {
        sanitized
    }
}
