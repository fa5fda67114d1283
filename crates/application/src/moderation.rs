//! 内容审核
//!
//! 审核分两层：`ModerationOracle` 是外部打分服务的端口，
//! `ModerationGate` 在其上套用阈值并实现失败关闭策略。

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// 四个审核维度的得分，取值在 0.0 到 1.0 之间
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttributeScores {
    pub toxicity: f64,
    pub severe_toxicity: f64,
    pub identity_attack: f64,
    pub profanity: f64,
}

impl AttributeScores {
    /// 是否有任一维度严格超过阈值
    pub fn any_exceeds(&self, threshold: f64) -> bool {
        self.values().into_iter().any(|score| score > threshold)
    }

    /// 四个维度中的最高分
    pub fn highest(&self) -> f64 {
        self.values()
            .into_iter()
            .fold(0.0, |max, score| if score > max { score } else { max })
    }

    fn values(&self) -> [f64; 4] {
        [
            self.toxicity,
            self.severe_toxicity,
            self.identity_attack,
            self.profanity,
        ]
    }
}

/// 打分服务错误
#[derive(Error, Debug, Clone)]
pub enum OracleError {
    /// 请求未能送达或超时
    #[error("moderation request failed: {reason}")]
    Request { reason: String },

    /// 服务返回非成功状态码
    #[error("moderation service returned status {status}")]
    Status { status: u16 },

    /// 响应体无法解析
    #[error("moderation response could not be decoded: {reason}")]
    Decode { reason: String },
}

impl OracleError {
    pub fn request(reason: impl Into<String>) -> Self {
        Self::Request {
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }
}

/// 内容打分服务端口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModerationOracle: Send + Sync {
    /// 对一段文本打分
    async fn score(&self, text: &str) -> Result<AttributeScores, OracleError>;
}

/// 审核闸门
///
/// 打分失败时按不放行处理。宁可拦下正常消息，
/// 也不让未经检查的内容进入已开启审核的房间。
pub struct ModerationGate {
    oracle: Arc<dyn ModerationOracle>,
    threshold: f64,
}

impl ModerationGate {
    pub fn new(oracle: Arc<dyn ModerationOracle>, threshold: f64) -> Self {
        Self { oracle, threshold }
    }

    /// 判定文本是否放行
    pub async fn allows(&self, text: &str) -> bool {
        match self.oracle.score(text).await {
            Ok(scores) => {
                if scores.any_exceeds(self.threshold) {
                    debug!(
                        highest = scores.highest(),
                        threshold = self.threshold,
                        "message blocked by moderation scores"
                    );
                    false
                } else {
                    true
                }
            }
            Err(error) => {
                warn!(%error, "moderation check failed, blocking message");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_exceeds_is_strict() {
        let scores = AttributeScores {
            toxicity: 0.7,
            ..Default::default()
        };
        // 恰好等于阈值不算超过
        assert!(!scores.any_exceeds(0.7));

        let scores = AttributeScores {
            toxicity: 0.700_1,
            ..Default::default()
        };
        assert!(scores.any_exceeds(0.7));
    }

    #[test]
    fn test_any_single_attribute_can_exceed() {
        let scores = AttributeScores {
            profanity: 0.9,
            ..Default::default()
        };
        assert!(scores.any_exceeds(0.7));
        assert_eq!(scores.highest(), 0.9);
    }

    #[tokio::test]
    async fn test_gate_allows_clean_text() {
        let mut oracle = MockModerationOracle::new();
        oracle
            .expect_score()
            .returning(|_| Ok(AttributeScores::default()));

        let gate = ModerationGate::new(Arc::new(oracle), 0.7);
        assert!(gate.allows("hello there").await);
    }

    #[tokio::test]
    async fn test_gate_blocks_flagged_text() {
        let mut oracle = MockModerationOracle::new();
        oracle.expect_score().returning(|_| {
            Ok(AttributeScores {
                identity_attack: 0.71,
                ..Default::default()
            })
        });

        let gate = ModerationGate::new(Arc::new(oracle), 0.7);
        assert!(!gate.allows("something nasty").await);
    }

    #[tokio::test]
    async fn test_gate_blocks_when_oracle_fails() {
        let mut oracle = MockModerationOracle::new();
        oracle
            .expect_score()
            .returning(|_| Err(OracleError::request("connection refused")));

        let gate = ModerationGate::new(Arc::new(oracle), 0.7);
        // 失败关闭：打分不可用时一律拦截
        assert!(!gate.allows("anything at all").await);
    }
}
