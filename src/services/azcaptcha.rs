//! azcaptcha 客户端
//!
//! 封装验证码图片上传与结果轮询（in.php / res.php 协议）

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::SolverError;
use crate::services::challenge_solver::{ArtifactKind, ChallengeArtifact, ChallengeSolver};

/// 服务端 JSON 响应
#[derive(Debug, Deserialize)]
struct AzResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    request: String,
}

/// 轮询状态
#[derive(Debug, PartialEq, Eq)]
enum PollState {
    Ready(String),
    NotReady,
}

/// azcaptcha 求解器
pub struct AzCaptchaSolver {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl AzCaptchaSolver {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(5),
            max_polls: 6,
        }
    }

    /// 上传图片，返回任务 id
    async fn submit(&self, png: &[u8]) -> Result<String, SolverError> {
        let body = STANDARD.encode(png);
        let params = [
            ("method", "base64"),
            ("key", self.api_key.as_str()),
            ("body", body.as_str()),
            ("json", "1"),
        ];

        let response: AzResponse = self
            .http
            .post(format!("{}/in.php", self.base_url))
            .form(&params)
            .send()
            .await?
            .json()
            .await?;

        classify_submit(response)
    }

    async fn fetch(&self, captcha_id: &str) -> Result<PollState, SolverError> {
        let response: AzResponse = self
            .http
            .get(format!("{}/res.php", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "get"),
                ("id", captcha_id),
                ("json", "1"),
            ])
            .send()
            .await?
            .json()
            .await?;

        classify_answer(response)
    }
}

#[async_trait]
impl ChallengeSolver for AzCaptchaSolver {
    fn artifact_kind(&self) -> ArtifactKind {
        ArtifactKind::Image
    }

    async fn solve(&self, artifact: &ChallengeArtifact) -> Result<String, SolverError> {
        let png = match artifact {
            ChallengeArtifact::Image { png } => png,
            ChallengeArtifact::Text(_) => {
                return Err(SolverError::Rejected("azcaptcha 只接受图片".to_string()))
            }
        };

        let captcha_id = self.submit(png).await?;
        debug!("验证码已上传, id: {}", captcha_id);

        for attempt in 1..=self.max_polls {
            sleep(self.poll_interval).await;
            match self.fetch(&captcha_id).await? {
                PollState::Ready(answer) => {
                    info!("验证码已求解 (id: {}, 轮询 {} 次)", captcha_id, attempt);
                    return Ok(answer);
                }
                PollState::NotReady => {
                    warn!(
                        "验证码 {} 尚未就绪 (尝试 {}/{}), {} 秒后重试...",
                        captcha_id,
                        attempt,
                        self.max_polls,
                        self.poll_interval.as_secs()
                    );
                }
            }
        }

        Err(SolverError::Unavailable(format!(
            "验证码 {} 在 {} 次轮询后仍未就绪",
            captcha_id, self.max_polls
        )))
    }
}

fn classify_submit(response: AzResponse) -> Result<String, SolverError> {
    if response.status == 1 && !response.request.is_empty() {
        return Ok(response.request);
    }
    match response.request.as_str() {
        "ERROR_ZERO_CAPTCHA_FILESIZE" | "ERROR_IMAGE_TYPE_NOT_SUPPORTED" | "ERROR_TOO_BIG_CAPTCHA_FILESIZE" => {
            Err(SolverError::Rejected(response.request))
        }
        other => Err(SolverError::Unavailable(other.to_string())),
    }
}

fn classify_answer(response: AzResponse) -> Result<PollState, SolverError> {
    if response.status == 1 {
        let answer = response.request.trim().to_string();
        if answer.is_empty() {
            return Err(SolverError::Rejected("返回了空答案".to_string()));
        }
        return Ok(PollState::Ready(answer));
    }
    match response.request.as_str() {
        "CAPCHA_NOT_READY" | "CAPTCHA_NOT_READY" => Ok(PollState::NotReady),
        "ERROR_CAPTCHA_UNSOLVABLE" => Err(SolverError::Rejected(response.request)),
        other => Err(SolverError::Unavailable(other.to_string())),
    }
}
