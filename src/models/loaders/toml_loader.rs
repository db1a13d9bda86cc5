use crate::error::ConfigError;
use crate::models::combo::Combo;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

/// 组合文件结构
///
/// ```toml
/// [[combo]]
/// location = "LIMA"
/// court_type = "JUZGADO DE PAZ LETRADO"
/// specialty = "CIVIL"
/// ```
#[derive(Debug, Deserialize)]
struct ComboFile {
    #[serde(default)]
    combo: Vec<Combo>,
}

/// 从 TOML 文件加载组合列表（保持文件中的顺序，重复项只保留第一个）
pub async fn load_combos(path: &Path) -> Result<Vec<Combo>, ConfigError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::CombosFile {
            path: path.display().to_string(),
            reason: format!("无法读取: {}", e),
        })?;

    parse_combos(&content).map_err(|reason| ConfigError::CombosFile {
        path: path.display().to_string(),
        reason,
    })
}

fn parse_combos(content: &str) -> Result<Vec<Combo>, String> {
    let file: ComboFile = toml::from_str(content).map_err(|e| format!("无法解析: {}", e))?;

    // id → 第一次出现的组合
    let mut seen: HashMap<String, Combo> = HashMap::new();
    let mut combos = Vec::new();
    for combo in file.combo {
        if combo.location.trim().is_empty()
            || combo.court_type.trim().is_empty()
            || combo.specialty.trim().is_empty()
        {
            return Err(format!("组合字段不能为空: {}", combo));
        }
        match seen.get(&combo.id()) {
            Some(existing) if existing == &combo => {
                tracing::warn!("忽略重复的组合: {}", combo);
            }
            Some(existing) => {
                return Err(format!(
                    "组合 {} 与 {} 的目录名相同 ({})",
                    combo,
                    existing,
                    combo.id()
                ));
            }
            None => {
                seen.insert(combo.id(), combo.clone());
                combos.push(combo);
            }
        }
    }

    if combos.is_empty() {
        return Err("文件中没有任何组合".to_string());
    }

    tracing::info!("成功加载 {} 个组合", combos.len());
    Ok(combos)
}
