//! 浏览器会话抽象
//!
//! 抓取流程只通过这里的能力与页面交互，不直接接触 DOM 或 CDP。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppResult, InteractionError};

/// 等待条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// 元素存在
    Present(String),
    /// 下拉框中出现指定选项（可见文本）
    OptionPresent { selector: String, option: String },
}

impl WaitCondition {
    pub fn describe(&self) -> String {
        match self {
            WaitCondition::Present(selector) => selector.clone(),
            WaitCondition::OptionPresent { selector, option } => {
                format!("{} 出现选项 '{}'", selector, option)
            }
        }
    }
}

/// 一个独占的浏览器会话
///
/// 会话之间互不共享导航状态，每个 worker 持有一个。
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), InteractionError>;

    /// 设置输入框或下拉框（按可见文本选择），并触发 change 事件
    async fn set_field(&self, selector: &str, value: &str) -> Result<(), InteractionError>;

    async fn click(&self, selector: &str) -> Result<(), InteractionError>;

    /// 点击第 `index` 个（从 0 开始）匹配元素
    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), InteractionError>;

    async fn wait_for(&self, condition: &WaitCondition, timeout: Duration) -> Result<(), InteractionError>;

    /// 元素文本，元素不存在时返回 None
    async fn read_text(&self, selector: &str) -> Result<Option<String>, InteractionError>;

    async fn read_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>, InteractionError>;

    /// 所有匹配元素的属性值
    async fn read_all_attributes(&self, selector: &str, attribute: &str) -> Result<Vec<String>, InteractionError>;

    async fn count(&self, selector: &str) -> Result<usize, InteractionError>;

    /// 下拉框全部选项的可见文本
    async fn list_options(&self, selector: &str) -> Result<Vec<String>, InteractionError>;

    async fn current_source(&self) -> Result<String, InteractionError>;

    /// 元素截图（PNG）
    async fn capture(&self, selector: &str) -> Result<Vec<u8>, InteractionError>;

    /// 后续下载写入该目录
    async fn set_download_dir(&self, dir: &Path) -> Result<(), InteractionError>;

    /// 触发一次下载，不等待完成
    async fn download(&self, url: &str) -> Result<(), InteractionError>;

    async fn close(&mut self) -> Result<(), InteractionError>;
}

/// 会话工厂
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// 为 worker 打开一个新会话，下载默认写入 `download_dir`
    async fn open(&self, worker: usize, download_dir: &Path) -> AppResult<Box<dyn BrowserSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_condition_describe() {
        assert_eq!(WaitCondition::Present("#form".to_string()).describe(), "#form");
        let condition = WaitCondition::OptionPresent {
            selector: "#year".to_string(),
            option: "2019".to_string(),
        };
        assert_eq!(condition.describe(), "#year 出现选项 '2019'");
    }
}
