//! Self-assessment questionnaire: catalog, answers, step progression, scoring,
//! and saved progress.
//!
//! A [`QuestionCatalog`] fixes the step order. An [`AssessmentFlow`] walks it,
//! collecting an [`AnswerSet`] and refusing to move past unanswered steps. The
//! last step hands the answers to a [`RiskScorer`], either the pure local
//! [`scoring::score`] function or the remote prediction service, selected by
//! configuration.

pub mod answers;
pub mod catalog;
pub mod persistence;
pub mod progression;
pub mod remote;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use answers::{AnswerSet, AnswerValue};
pub use catalog::{
    AnswerViolation, CatalogError, ChoiceOption, Question, QuestionCatalog, QuestionId,
    QuestionKind, ScoreDirection,
};
pub use persistence::{
    FileProgressStore, MemoryProgressStore, PersistenceBridge, PersistenceError, ProgressSnapshot,
    ProgressStore, ASSESSMENT_PROGRESS_KEY,
};
pub use progression::{
    Advance, AssessmentFlow, FlowError, FlowPhase, ProgressionState, Retreat, StepOutcome,
    SubmissionRequest,
};
pub use remote::RemoteScorer;
pub use router::assessment_router;
pub use scoring::{
    scorer_from_config, LocalScorer, RiskScorer, ScoreBreakdown, ScoreComponent, ScoringError,
    ScoringResult, SeverityBand, SubmissionError,
};
pub use service::{AssessmentService, AssessmentServiceError, SessionId, SessionView};
