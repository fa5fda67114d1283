//! Perspective API 客户端
//!
//! `ModerationOracle` 的 HTTP 实现。请求体和响应体的字段名
//! 遵循 Perspective 的 `comments:analyze` 接口约定，
//! 响应里缺失的维度按零分处理。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use application::moderation::{AttributeScores, ModerationOracle, OracleError};
use config::ModerationConfig;

const TOXICITY: &str = "TOXICITY";
const SEVERE_TOXICITY: &str = "SEVERE_TOXICITY";
const IDENTITY_ATTACK: &str = "IDENTITY_ATTACK";
const PROFANITY: &str = "PROFANITY";

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    comment: Comment<'a>,
    languages: [&'a str; 1],
    #[serde(rename = "requestedAttributes")]
    requested_attributes: HashMap<&'a str, EmptySpec>,
}

#[derive(Serialize)]
struct Comment<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct EmptySpec {}

impl<'a> AnalyzeRequest<'a> {
    fn new(text: &'a str) -> Self {
        let requested_attributes = [TOXICITY, SEVERE_TOXICITY, IDENTITY_ATTACK, PROFANITY]
            .into_iter()
            .map(|attribute| (attribute, EmptySpec {}))
            .collect();
        Self {
            comment: Comment { text },
            languages: ["en"],
            requested_attributes,
        }
    }
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    #[serde(rename = "attributeScores", default)]
    attribute_scores: HashMap<String, AttributeResult>,
}

#[derive(Deserialize)]
struct AttributeResult {
    #[serde(rename = "summaryScore")]
    summary_score: SummaryScore,
}

#[derive(Deserialize)]
struct SummaryScore {
    value: f64,
}

impl AnalyzeResponse {
    fn score_of(&self, attribute: &str) -> f64 {
        self.attribute_scores
            .get(attribute)
            .map(|result| result.summary_score.value)
            .unwrap_or(0.0)
    }

    fn into_scores(self) -> AttributeScores {
        AttributeScores {
            toxicity: self.score_of(TOXICITY),
            severe_toxicity: self.score_of(SEVERE_TOXICITY),
            identity_attack: self.score_of(IDENTITY_ATTACK),
            profanity: self.score_of(PROFANITY),
        }
    }
}

/// Perspective 打分客户端
pub struct PerspectiveClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl PerspectiveClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| OracleError::request(error.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &ModerationConfig) -> Result<Self, OracleError> {
        Self::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            config.request_timeout(),
        )
    }
}

#[async_trait]
impl ModerationOracle for PerspectiveClient {
    async fn score(&self, text: &str) -> Result<AttributeScores, OracleError> {
        let request = AnalyzeRequest::new(text);
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|error| OracleError::request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
            });
        }

        let body: AnalyzeResponse = response
            .json()
            .await
            .map_err(|error| OracleError::decode(error.to_string()))?;
        let scores = body.into_scores();
        debug!(highest = scores.highest(), "perspective scores received");
        Ok(scores)
    }
}
