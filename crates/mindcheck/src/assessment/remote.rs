//! Client for the external questionnaire prediction service.
//!
//! The service owns the model; this module only shapes the request body from an
//! [`AnswerSet`] and maps the prediction back onto a [`ScoringResult`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::answers::{AnswerSet, AnswerValue};
use super::catalog::{QuestionCatalog, QuestionKind};
use super::scoring::{RiskScorer, ScoringResult, SeverityBand, SubmissionError};
use crate::config::RemoteScoringConfig;

const QUESTIONNAIRE_PATH: &str = "user/questionnaire";

pub struct RemoteScorer {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl RemoteScorer {
    pub fn new(config: &RemoteScoringConfig, timeout: Duration) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SubmissionError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/{QUESTIONNAIRE_PATH}",
                config.base_url.trim_end_matches('/')
            ),
            bearer_token: config.bearer_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RiskScorer for RemoteScorer {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn score(
        &self,
        catalog: &QuestionCatalog,
        answers: &AnswerSet,
    ) -> Result<ScoringResult, SubmissionError> {
        let token = self
            .bearer_token
            .as_deref()
            .ok_or(SubmissionError::Unauthenticated)?;

        let body = questionnaire_payload(catalog, answers);
        debug!(endpoint = %self.endpoint, fields = body.len(), "submitting questionnaire");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|err| SubmissionError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, "prediction service rejected questionnaire");
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let payload: QuestionnaireResponse = response
            .json()
            .await
            .map_err(|err| SubmissionError::MalformedResponse(err.to_string()))?;

        interpret(payload)
    }
}

/// Request body in catalog order; numeric question kinds are sent as JSON numbers.
pub fn questionnaire_payload(catalog: &QuestionCatalog, answers: &AnswerSet) -> Map<String, Value> {
    let mut body = Map::new();
    for question in catalog.questions() {
        let Some(value) = answers.get(&question.id) else {
            continue;
        };

        let encoded = match question.kind {
            QuestionKind::Slider { .. } | QuestionKind::NumericInput { .. } => {
                value.as_number().map(number_value).unwrap_or(Value::Null)
            }
            QuestionKind::Radio { .. } => match value {
                AnswerValue::Text(text) => Value::String(text.clone()),
                AnswerValue::Number(number) => number_value(*number),
            },
        };
        body.insert(question.id.as_str().to_string(), encoded);
    }
    body
}

fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::from(number as i64)
    } else {
        Value::from(number)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionnaireResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    risk_level: String,
    probability: Probability,
    #[serde(default)]
    recommendation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Probability {
    #[serde(rename = "Depresi")]
    depressed: f64,
    #[serde(rename = "Tidak Depresi", default)]
    not_depressed: Option<f64>,
}

pub(crate) fn interpret(response: QuestionnaireResponse) -> Result<ScoringResult, SubmissionError> {
    let prediction = response.result.ok_or_else(|| {
        SubmissionError::MalformedResponse(
            response
                .message
                .unwrap_or_else(|| "missing prediction result".to_string()),
        )
    })?;

    let probability = prediction.probability.depressed;
    if !probability.is_finite() {
        return Err(SubmissionError::MalformedResponse(
            "prediction probability is not a number".to_string(),
        ));
    }

    debug!(
        risk_level = %prediction.risk_level,
        not_depressed = ?prediction.probability.not_depressed,
        recommendation = ?prediction.recommendation,
        "prediction received"
    );

    let mut result = ScoringResult::from_normalized(probability * 100.0);
    if let Some(band) = band_from_risk_level(&prediction.risk_level) {
        result.severity_band = band;
    }
    Ok(result)
}

/// The service's own label wins over local banding when it names a band.
/// Binary labels ("Depresi", "Tidak Depresi") carry no band, so the probability decides.
fn band_from_risk_level(level: &str) -> Option<SeverityBand> {
    match level.trim().to_lowercase().as_str() {
        "minimal" | "none" | "low" | "rendah" => Some(SeverityBand::Minimal),
        "mild" | "ringan" => Some(SeverityBand::Mild),
        "moderate" | "medium" | "sedang" => Some(SeverityBand::Moderate),
        "severe" | "high" | "tinggi" | "berat" => Some(SeverityBand::Severe),
        _ => None,
    }
}
