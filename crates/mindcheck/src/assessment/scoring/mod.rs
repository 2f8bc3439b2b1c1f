mod bands;
mod rules;

pub use bands::{ScoringResult, SeverityBand, AT_RISK_THRESHOLD};

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::answers::AnswerSet;
use super::catalog::{AnswerViolation, QuestionCatalog, QuestionId};
use super::remote::RemoteScorer;
use crate::config::{ScoringConfig, ScoringStrategy};

/// Per-question contribution, kept so a result can be audited.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreComponent {
    pub question_id: QuestionId,
    pub contribution: f64,
    pub ceiling: f64,
    pub notes: String,
}

/// Raw totals behind a normalized score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub sum: f64,
    pub max: f64,
    pub components: Vec<ScoreComponent>,
}

impl ScoreBreakdown {
    pub fn result(&self) -> Result<ScoringResult, ScoringError> {
        if self.max <= 0.0 {
            return Err(ScoringError::InvalidCatalog);
        }
        Ok(ScoringResult::from_normalized(100.0 * self.sum / self.max))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("assessment incomplete: {} unanswered question(s)", missing.len())]
    IncompleteAssessment { missing: Vec<QuestionId> },
    #[error("catalog has no scorable questions")]
    InvalidCatalog,
    #[error("answer for '{question_id}' cannot be scored: {violation}")]
    InvalidAnswer {
        question_id: QuestionId,
        violation: AnswerViolation,
    },
}

/// Pure local scoring of a complete answer set.
pub fn score(catalog: &QuestionCatalog, answers: &AnswerSet) -> Result<ScoringResult, ScoringError> {
    breakdown(catalog, answers)?.result()
}

pub fn breakdown(
    catalog: &QuestionCatalog,
    answers: &AnswerSet,
) -> Result<ScoreBreakdown, ScoringError> {
    let (components, sum, max) = rules::accumulate(catalog, answers)?;
    Ok(ScoreBreakdown {
        sum,
        max,
        components,
    })
}

/// Failure of the final submission step. Always recoverable by retrying.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmissionError {
    #[error("scoring service did not respond within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("authentication token not configured for remote scoring")]
    Unauthenticated,
    #[error("scoring service unreachable: {0}")]
    Transport(String),
    #[error("scoring service rejected the submission ({status}): {detail}")]
    Rejected { status: u16, detail: String },
    #[error("scoring service returned an incomplete response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

/// Strategy seam for turning a complete answer set into a result.
#[async_trait]
pub trait RiskScorer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn score(
        &self,
        catalog: &QuestionCatalog,
        answers: &AnswerSet,
    ) -> Result<ScoringResult, SubmissionError>;
}

/// Offline strategy backed by [`score`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalScorer;

#[async_trait]
impl RiskScorer for LocalScorer {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn score(
        &self,
        catalog: &QuestionCatalog,
        answers: &AnswerSet,
    ) -> Result<ScoringResult, SubmissionError> {
        score(catalog, answers).map_err(SubmissionError::from)
    }
}

pub fn scorer_from_config(config: &ScoringConfig) -> Result<Arc<dyn RiskScorer>, SubmissionError> {
    match config.strategy {
        ScoringStrategy::Local => Ok(Arc::new(LocalScorer)),
        ScoringStrategy::Remote => Ok(Arc::new(RemoteScorer::new(&config.remote, config.timeout)?)),
    }
}
