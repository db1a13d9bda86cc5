//! 工作单元键
//!
//! 层级：年份 ⊇ 组合 ⊇ 文件号 ⊇ 文档。
//! 字符串形式用 `/` 分隔，例如 `2019/LIMA_JUZGADO_CIVIL/14/2/1`。

use std::fmt;
use std::str::FromStr;

use crate::models::combo::{Combo, Year};

/// 检查点与隔离记录共用的键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnitKey {
    Year(Year),
    Combo {
        year: Year,
        combo_id: String,
    },
    File {
        year: Year,
        combo_id: String,
        file_number: u32,
    },
    /// 单个文档（case、document 都从 1 开始）
    Artifact {
        year: Year,
        combo_id: String,
        file_number: u32,
        case: usize,
        document: usize,
    },
}

impl UnitKey {
    pub fn year(year: Year) -> Self {
        UnitKey::Year(year)
    }

    pub fn combo(year: Year, combo: &Combo) -> Self {
        UnitKey::Combo {
            year,
            combo_id: combo.id(),
        }
    }

    pub fn file(year: Year, combo: &Combo, file_number: u32) -> Self {
        UnitKey::File {
            year,
            combo_id: combo.id(),
            file_number,
        }
    }

    pub fn artifact(year: Year, combo: &Combo, file_number: u32, case: usize, document: usize) -> Self {
        UnitKey::Artifact {
            year,
            combo_id: combo.id(),
            file_number,
            case,
            document,
        }
    }

    pub fn year_value(&self) -> Year {
        match self {
            UnitKey::Year(year)
            | UnitKey::Combo { year, .. }
            | UnitKey::File { year, .. }
            | UnitKey::Artifact { year, .. } => *year,
        }
    }

    pub fn combo_id(&self) -> Option<&str> {
        match self {
            UnitKey::Year(_) => None,
            UnitKey::Combo { combo_id, .. }
            | UnitKey::File { combo_id, .. }
            | UnitKey::Artifact { combo_id, .. } => Some(combo_id),
        }
    }

    fn segments(&self) -> Vec<String> {
        match self {
            UnitKey::Year(year) => vec![year.to_string()],
            UnitKey::Combo { year, combo_id } => vec![year.to_string(), combo_id.clone()],
            UnitKey::File {
                year,
                combo_id,
                file_number,
            } => vec![year.to_string(), combo_id.clone(), file_number.to_string()],
            UnitKey::Artifact {
                year,
                combo_id,
                file_number,
                case,
                document,
            } => vec![
                year.to_string(),
                combo_id.clone(),
                file_number.to_string(),
                case.to_string(),
                document.to_string(),
            ],
        }
    }

    /// 检查点标记文件名（位于 `done/` 目录下）
    pub fn marker_name(&self) -> String {
        match self {
            UnitKey::Year(_) => "year".to_string(),
            UnitKey::Combo { .. } => "combo".to_string(),
            UnitKey::File { file_number, .. } => format!("file_num_{}", file_number),
            UnitKey::Artifact {
                file_number,
                case,
                document,
                ..
            } => format!("file_num_{}_case_{}_doc_{}", file_number, case, document),
        }
    }

    /// 隔离记录文件名主干，分段之间用 `__` 连接
    pub fn file_stem(&self) -> String {
        self.segments().join("__")
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments().join("/"))
    }
}

impl FromStr for UnitKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        let year: Year = parts
            .first()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| format!("无法解析年份: {}", s))?;
        let number = |idx: usize| -> Result<usize, String> {
            parts[idx]
                .parse::<usize>()
                .map_err(|_| format!("无法解析第 {} 段: {}", idx + 1, s))
        };

        match parts.len() {
            1 => Ok(UnitKey::Year(year)),
            2 => Ok(UnitKey::Combo {
                year,
                combo_id: parts[1].to_string(),
            }),
            3 => Ok(UnitKey::File {
                year,
                combo_id: parts[1].to_string(),
                file_number: number(2)? as u32,
            }),
            5 => Ok(UnitKey::Artifact {
                year,
                combo_id: parts[1].to_string(),
                file_number: number(2)? as u32,
                case: number(3)?,
                document: number(4)?,
            }),
            _ => Err(format!("无法识别的键: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combo() -> Combo {
        Combo::new("LIMA", "JUZGADO DE PAZ LETRADO", "CIVIL")
    }

    #[test]
    fn test_display_and_parse_agree() {
        let keys = vec![
            UnitKey::year(2019),
            UnitKey::combo(2019, &combo()),
            UnitKey::file(2019, &combo(), 14),
            UnitKey::artifact(2019, &combo(), 14, 2, 1),
        ];
        for key in keys {
            let parsed: UnitKey = key.to_string().parse().unwrap();
            assert_eq!(parsed, key);
        }
    }

    #[test]
    fn test_marker_names() {
        assert_eq!(UnitKey::file(2019, &combo(), 7).marker_name(), "file_num_7");
        assert_eq!(UnitKey::combo(2019, &combo()).marker_name(), "combo");
        assert_eq!(UnitKey::year(2019).marker_name(), "year");
    }

    #[test]
    fn test_file_stem_is_flat() {
        let stem = UnitKey::file(2020, &combo(), 3).file_stem();
        assert_eq!(stem, "2020__LIMA_JUZGADO-DE-PAZ-LETRADO_CIVIL__3");
        assert!(!stem.contains('/'));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("abc".parse::<UnitKey>().is_err());
        assert!("2019/a/b/c".parse::<UnitKey>().is_err());
    }
}
