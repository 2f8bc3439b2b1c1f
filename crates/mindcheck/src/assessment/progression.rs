use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::answers::{AnswerSet, AnswerValue};
use super::catalog::{AnswerViolation, Question, QuestionCatalog, QuestionId};
use super::persistence::PersistenceBridge;
use super::scoring::{RiskScorer, ScoringResult, SubmissionError};

/// Where a flow sits between the first step and a scored result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Answering,
    Submitting,
    Done,
}

impl FlowPhase {
    pub const fn label(self) -> &'static str {
        match self {
            FlowPhase::Answering => "in_progress",
            FlowPhase::Submitting => "submitting",
            FlowPhase::Done => "completed",
        }
    }
}

/// Observable progression snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionState {
    pub current_step: usize,
    pub is_submitting: bool,
    pub last_error: Option<SubmissionError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Moved { step: usize },
    Completed(ScoringResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retreat {
    Moved { step: usize },
    /// Retreating from the first step leaves the flow entirely.
    Cancelled,
}

/// Outcome of moving forward before any scoring happens.
#[derive(Debug)]
pub enum StepOutcome {
    Moved { step: usize },
    Submit(SubmissionRequest),
}

/// Everything a scorer needs, detached from the flow so no lock is held while scoring.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub catalog: Arc<QuestionCatalog>,
    pub answers: AnswerSet,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    #[error("question '{0}' has no answer yet")]
    Unanswered(QuestionId),
    #[error("assessment incomplete: {} unanswered question(s)", missing.len())]
    IncompleteAssessment { missing: Vec<QuestionId> },
    #[error("question '{0}' is not part of this assessment")]
    UnknownQuestion(QuestionId),
    #[error("answer for '{question_id}' rejected: {violation}")]
    InvalidAnswer {
        question_id: QuestionId,
        violation: AnswerViolation,
    },
    #[error("a submission is already in progress")]
    SubmissionInProgress,
    #[error("assessment already completed")]
    AlreadyCompleted,
    #[error("no submission is in progress")]
    NotSubmitting,
    #[error("submission failed: {0}")]
    SubmissionFailed(SubmissionError),
}

/// Step-by-step questionnaire state machine for one session.
#[derive(Debug)]
pub struct AssessmentFlow {
    catalog: Arc<QuestionCatalog>,
    answers: AnswerSet,
    current_step: usize,
    phase: FlowPhase,
    last_error: Option<SubmissionError>,
    result: Option<ScoringResult>,
    progress: Option<PersistenceBridge>,
}

impl AssessmentFlow {
    pub fn new(catalog: Arc<QuestionCatalog>) -> Self {
        Self {
            catalog,
            answers: AnswerSet::new(),
            current_step: 0,
            phase: FlowPhase::Answering,
            last_error: None,
            result: None,
            progress: None,
        }
    }

    pub fn with_persistence(mut self, progress: PersistenceBridge) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Starts at step 0 with whatever saved answers still fit the catalog.
    pub fn resume(catalog: Arc<QuestionCatalog>, progress: PersistenceBridge) -> Self {
        let restored = progress.load().unwrap_or_default();
        let mut flow = Self::new(catalog).with_persistence(progress);

        for (id, value) in restored.iter() {
            match flow.catalog.find(id) {
                Some(question) if question.check_answer(value).is_ok() => {
                    flow.answers.insert(id.clone(), value.clone());
                }
                _ => warn!(question = %id, "dropping saved answer that no longer fits the catalog"),
            }
        }

        flow
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    pub fn state(&self) -> ProgressionState {
        ProgressionState {
            current_step: self.current_step,
            is_submitting: self.phase == FlowPhase::Submitting,
            last_error: self.last_error.clone(),
        }
    }

    pub fn phase(&self) -> FlowPhase {
        self.phase
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn total_steps(&self) -> usize {
        self.catalog.total_steps()
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step + 1 == self.total_steps()
    }

    pub fn current_question(&self) -> &Question {
        &self.catalog.questions()[self.current_step]
    }

    pub fn current_answer(&self) -> Option<&AnswerValue> {
        self.answers.get(&self.current_question().id)
    }

    /// Position through the questionnaire as a percentage, counting the current step.
    pub fn completion_pct(&self) -> f64 {
        (self.current_step + 1) as f64 / self.total_steps() as f64 * 100.0
    }

    pub fn answered_count(&self) -> usize {
        self.answers.answered_count(&self.catalog)
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn result(&self) -> Option<&ScoringResult> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&SubmissionError> {
        self.last_error.as_ref()
    }

    pub fn answer(&mut self, id: QuestionId, value: AnswerValue) -> Result<(), FlowError> {
        self.ensure_answering()?;

        let question = self
            .catalog
            .find(&id)
            .ok_or_else(|| FlowError::UnknownQuestion(id.clone()))?;

        if value.is_defined() {
            question
                .check_answer(&value)
                .map_err(|violation| FlowError::InvalidAnswer {
                    question_id: id.clone(),
                    violation,
                })?;
        }

        self.answers.insert(id, value);
        Ok(())
    }

    pub fn retreat(&mut self) -> Result<Retreat, FlowError> {
        self.ensure_answering()?;

        if self.current_step == 0 {
            return Ok(Retreat::Cancelled);
        }
        self.current_step -= 1;
        Ok(Retreat::Moved {
            step: self.current_step,
        })
    }

    /// Writes the current answers to durable storage; never fails the flow.
    pub fn save_progress(&self) -> bool {
        match &self.progress {
            Some(progress) => progress.save(&self.answers),
            None => false,
        }
    }

    /// Moves to the next step, or enters `Submitting` on the last one.
    ///
    /// Any rejection leaves the flow untouched.
    pub fn step_forward(&mut self) -> Result<StepOutcome, FlowError> {
        self.ensure_answering()?;

        let current = &self.current_question().id;
        if !self.answers.is_answered(current) {
            return Err(FlowError::Unanswered(current.clone()));
        }

        if !self.is_last_step() {
            self.current_step += 1;
            return Ok(StepOutcome::Moved {
                step: self.current_step,
            });
        }

        let missing = self.answers.missing(&self.catalog);
        if !missing.is_empty() {
            return Err(FlowError::IncompleteAssessment { missing });
        }

        self.phase = FlowPhase::Submitting;
        Ok(StepOutcome::Submit(SubmissionRequest {
            catalog: Arc::clone(&self.catalog),
            answers: self.answers.clone(),
        }))
    }

    /// Applies the scorer's verdict to a flow in `Submitting`.
    pub fn finish_submission(
        &mut self,
        outcome: Result<ScoringResult, SubmissionError>,
    ) -> Result<ScoringResult, FlowError> {
        if self.phase != FlowPhase::Submitting {
            return Err(FlowError::NotSubmitting);
        }

        match outcome {
            Ok(result) => {
                self.phase = FlowPhase::Done;
                self.last_error = None;
                self.result = Some(result);
                self.answers.clear();
                if let Some(progress) = &self.progress {
                    progress.clear();
                }
                info!(band = result.severity_band.label(), "assessment completed");
                Ok(result)
            }
            Err(err) => {
                self.phase = FlowPhase::Answering;
                self.current_step = self.total_steps() - 1;
                self.last_error = Some(err.clone());
                warn!(error = %err, "assessment submission failed");
                Err(FlowError::SubmissionFailed(err))
            }
        }
    }

    /// Advances one step, scoring the answers when leaving the last step.
    pub async fn advance(
        &mut self,
        scorer: &dyn RiskScorer,
        timeout: Duration,
    ) -> Result<Advance, FlowError> {
        match self.step_forward()? {
            StepOutcome::Moved { step } => Ok(Advance::Moved { step }),
            StepOutcome::Submit(request) => {
                let outcome = submit(scorer, &request, timeout).await;
                self.finish_submission(outcome).map(Advance::Completed)
            }
        }
    }

    fn ensure_answering(&self) -> Result<(), FlowError> {
        match self.phase {
            FlowPhase::Answering => Ok(()),
            FlowPhase::Submitting => Err(FlowError::SubmissionInProgress),
            FlowPhase::Done => Err(FlowError::AlreadyCompleted),
        }
    }
}

/// Runs the scorer under a deadline; elapsing maps to a recoverable failure.
pub async fn submit(
    scorer: &dyn RiskScorer,
    request: &SubmissionRequest,
    timeout: Duration,
) -> Result<ScoringResult, SubmissionError> {
    match tokio::time::timeout(timeout, scorer.score(&request.catalog, &request.answers)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(SubmissionError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
