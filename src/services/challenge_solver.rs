//! 验证码求解 - 业务能力层
//!
//! 只负责"把验证码变成答案"，不关心从哪个页面取得、答案填到哪里。

use async_trait::async_trait;
use regex::Regex;

use crate::error::SolverError;

/// 求解器需要的验证码形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// 验证码图片截图
    Image,
    /// 页面给出的文本
    Text,
}

/// 验证码素材
#[derive(Debug, Clone)]
pub enum ChallengeArtifact {
    Image { png: Vec<u8> },
    Text(String),
}

/// 验证码求解器
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    fn artifact_kind(&self) -> ArtifactKind;

    /// 返回要填入表单的答案
    async fn solve(&self, artifact: &ChallengeArtifact) -> Result<String, SolverError>;
}

/// 页面文本求解器
///
/// 门户点击"刷新验证码"后会把答案写进一个隐藏字段，
/// 读出来去掉非字母数字字符即可。
pub struct PageTextSolver {
    cleaner: Regex,
}

impl PageTextSolver {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            cleaner: Regex::new(r"[^\p{L}\p{N}]")?,
        })
    }
}

#[async_trait]
impl ChallengeSolver for PageTextSolver {
    fn artifact_kind(&self) -> ArtifactKind {
        ArtifactKind::Text
    }

    async fn solve(&self, artifact: &ChallengeArtifact) -> Result<String, SolverError> {
        let text = match artifact {
            ChallengeArtifact::Text(text) => text,
            ChallengeArtifact::Image { .. } => {
                return Err(SolverError::Rejected("页面文本求解器不支持图片".to_string()))
            }
        };

        let answer = self.cleaner.replace_all(text, "").to_string();
        if answer.is_empty() {
            return Err(SolverError::Rejected("页面未给出验证码文本".to_string()));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_page_text_solver_strips_punctuation() {
        let solver = PageTextSolver::new().unwrap();
        let answer = solver
            .solve(&ChallengeArtifact::Text(" a1-B2 c3! ".to_string()))
            .await
            .unwrap();
        assert_eq!(answer, "a1B2c3");
    }

    #[tokio::test]
    async fn test_page_text_solver_rejects_empty_text() {
        let solver = PageTextSolver::new().unwrap();
        let result = solver.solve(&ChallengeArtifact::Text(" -- ".to_string())).await;
        assert!(matches!(result, Err(SolverError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_page_text_solver_rejects_images() {
        let solver = PageTextSolver::new().unwrap();
        let result = solver
            .solve(&ChallengeArtifact::Image { png: vec![0x89, 0x50] })
            .await;
        assert!(result.is_err());
    }
}
