use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::answers::{AnswerSet, AnswerValue};
use super::catalog::{Question, QuestionCatalog, QuestionId};
use super::persistence::{PersistenceBridge, ProgressStore, ASSESSMENT_PROGRESS_KEY};
use super::progression::{self, AssessmentFlow, FlowError, FlowPhase, Retreat, StepOutcome};
use super::scoring::{self, RiskScorer, ScoreBreakdown, ScoringError, ScoringResult};
use crate::config::SessionLimits;

/// Identifier wrapper for live assessment sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl SessionId {
    /// Saved-progress key scoped to this session.
    pub fn progress_key(&self) -> String {
        format!("{ASSESSMENT_PROGRESS_KEY}.{}", self.0)
    }
}

struct SessionEntry {
    started_at: DateTime<Utc>,
    flow: AssessmentFlow,
}

/// Service composing the catalog, scoring strategy, and saved-progress store.
pub struct AssessmentService {
    catalog: Arc<QuestionCatalog>,
    scorer: Arc<dyn RiskScorer>,
    store: Arc<dyn ProgressStore>,
    timeout: Duration,
    limits: SessionLimits,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    /// Generated ids are `session-{epoch}-{sequence}` so they differ across restarts.
    epoch: i64,
    sequence: AtomicU64,
}

impl AssessmentService {
    pub fn new(
        catalog: Arc<QuestionCatalog>,
        scorer: Arc<dyn RiskScorer>,
        store: Arc<dyn ProgressStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            scorer,
            store,
            timeout,
            limits: SessionLimits::default(),
            sessions: Mutex::new(HashMap::new()),
            epoch: Utc::now().timestamp_millis(),
            sequence: AtomicU64::new(1),
        }
    }

    pub fn with_session_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    /// Skips ids held by a live session or by saved progress from an earlier run.
    fn next_session_id(&self, sessions: &HashMap<SessionId, SessionEntry>) -> SessionId {
        loop {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            let id = SessionId(format!("session-{:x}-{seq:06}", self.epoch));
            let saved = matches!(self.store.load(&id.progress_key()), Ok(Some(_)));
            if !sessions.contains_key(&id) && !saved {
                return id;
            }
            debug!(session = %id, "generated session id already in use");
        }
    }

    /// Drops expired sessions, then the oldest ones while over capacity.
    /// Sessions waiting on the scorer are never evicted.
    fn evict(&self, sessions: &mut HashMap<SessionId, SessionEntry>) {
        let now = Utc::now();
        let ttl = self.limits.ttl;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            let age = (now - entry.started_at).to_std().unwrap_or_default();
            entry.flow.phase() == FlowPhase::Submitting || age < ttl
        });

        if sessions.len() >= self.limits.max_sessions {
            let mut idle: Vec<(DateTime<Utc>, SessionId)> = sessions
                .iter()
                .filter(|(_, entry)| entry.flow.phase() != FlowPhase::Submitting)
                .map(|(id, entry)| (entry.started_at, id.clone()))
                .collect();
            idle.sort_by_key(|(started_at, _)| *started_at);
            let excess = sessions.len() + 1 - self.limits.max_sessions;
            for (_, id) in idle.into_iter().take(excess) {
                sessions.remove(&id);
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, live = sessions.len(), "assessment sessions evicted");
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a session, restoring saved answers when resuming a known id.
    pub fn start(&self, resume: Option<SessionId>) -> SessionView {
        let mut sessions = self.sessions();

        if let Some(id) = &resume {
            if let Some(entry) = sessions.get(id) {
                return SessionView::from_entry(id, entry);
            }
        }

        self.evict(&mut sessions);

        let (id, flow) = match resume {
            Some(id) => {
                let bridge = PersistenceBridge::new(Arc::clone(&self.store), id.progress_key());
                let flow = AssessmentFlow::resume(Arc::clone(&self.catalog), bridge);
                (id, flow)
            }
            None => {
                let id = self.next_session_id(&sessions);
                let bridge = PersistenceBridge::new(Arc::clone(&self.store), id.progress_key());
                let flow = AssessmentFlow::new(Arc::clone(&self.catalog)).with_persistence(bridge);
                (id, flow)
            }
        };

        info!(session = %id, restored = flow.answers().len(), "assessment session started");
        let entry = SessionEntry {
            started_at: Utc::now(),
            flow,
        };
        let view = SessionView::from_entry(&id, &entry);
        sessions.insert(id, entry);
        view
    }

    pub fn view(&self, id: &SessionId) -> Result<SessionView, AssessmentServiceError> {
        let sessions = self.sessions();
        let entry = sessions
            .get(id)
            .ok_or_else(|| AssessmentServiceError::NotFound(id.clone()))?;
        Ok(SessionView::from_entry(id, entry))
    }

    pub fn answer(
        &self,
        id: &SessionId,
        question_id: QuestionId,
        value: AnswerValue,
    ) -> Result<SessionView, AssessmentServiceError> {
        self.with_entry(id, |entry| {
            entry.flow.answer(question_id, value)?;
            Ok(SessionView::from_entry(id, entry))
        })
    }

    /// Cancelling from the first step closes the session; saved progress is kept.
    pub fn retreat(&self, id: &SessionId) -> Result<RetreatView, AssessmentServiceError> {
        let mut sessions = self.sessions();
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| AssessmentServiceError::NotFound(id.clone()))?;

        match entry.flow.retreat()? {
            Retreat::Moved { .. } => Ok(RetreatView {
                cancelled: false,
                session: Some(SessionView::from_entry(id, entry)),
            }),
            Retreat::Cancelled => {
                sessions.remove(id);
                info!(session = %id, "assessment session cancelled");
                Ok(RetreatView {
                    cancelled: true,
                    session: None,
                })
            }
        }
    }

    pub fn save(&self, id: &SessionId) -> Result<SaveView, AssessmentServiceError> {
        self.with_entry(id, |entry| {
            Ok(SaveView {
                saved: entry.flow.save_progress(),
                session: SessionView::from_entry(id, entry),
            })
        })
    }

    /// Moves a session forward; the final step is scored without holding the session lock.
    pub async fn advance(&self, id: &SessionId) -> Result<SessionView, AssessmentServiceError> {
        let request = {
            let mut sessions = self.sessions();
            let entry = sessions
                .get_mut(id)
                .ok_or_else(|| AssessmentServiceError::NotFound(id.clone()))?;
            match entry.flow.step_forward()? {
                StepOutcome::Moved { .. } => return Ok(SessionView::from_entry(id, entry)),
                StepOutcome::Submit(request) => request,
            }
        };

        info!(session = %id, scorer = self.scorer.name(), "scoring assessment");
        let outcome = progression::submit(self.scorer.as_ref(), &request, self.timeout).await;

        self.with_entry(id, |entry| {
            entry.flow.finish_submission(outcome)?;
            Ok(SessionView::from_entry(id, entry))
        })
    }

    /// Stateless local scoring of a complete answer set against the active catalog.
    pub fn score(&self, answers: &AnswerSet) -> Result<ScoreReport, ScoringError> {
        let breakdown = scoring::breakdown(&self.catalog, answers)?;
        let result = breakdown.result()?;
        Ok(ScoreReport {
            result: OutcomeView::from(result),
            breakdown,
        })
    }

    fn with_entry<T>(
        &self,
        id: &SessionId,
        apply: impl FnOnce(&mut SessionEntry) -> Result<T, AssessmentServiceError>,
    ) -> Result<T, AssessmentServiceError> {
        let mut sessions = self.sessions();
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| AssessmentServiceError::NotFound(id.clone()))?;
        apply(entry)
    }
}

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentServiceError {
    #[error("assessment session '{0}' not found")]
    NotFound(SessionId),
    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// Scored result with the guidance that accompanies its band.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeView {
    pub severity_band: scoring::SeverityBand,
    pub severity_label: &'static str,
    pub normalized_score: f64,
    pub is_at_risk: bool,
    pub recommendations: Vec<&'static str>,
}

impl From<ScoringResult> for OutcomeView {
    fn from(result: ScoringResult) -> Self {
        Self {
            severity_band: result.severity_band,
            severity_label: result.severity_band.label(),
            normalized_score: result.normalized_score,
            is_at_risk: result.is_at_risk,
            recommendations: result.severity_band.recommendations().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub result: OutcomeView,
    pub breakdown: ScoreBreakdown,
}

/// Public representation of a session's progress.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub status: &'static str,
    pub current_step: usize,
    pub total_steps: usize,
    pub completion_pct: f64,
    pub answered: usize,
    pub is_submitting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OutcomeView>,
}

impl SessionView {
    fn from_entry(id: &SessionId, entry: &SessionEntry) -> Self {
        let flow = &entry.flow;
        let state = flow.state();
        let done = flow.result().is_some();

        Self {
            session_id: id.clone(),
            started_at: entry.started_at,
            status: flow.phase().label(),
            current_step: state.current_step,
            total_steps: flow.total_steps(),
            completion_pct: flow.completion_pct(),
            answered: flow.answered_count(),
            is_submitting: state.is_submitting,
            last_error: state.last_error.map(|err| err.to_string()),
            question: (!done).then(|| flow.current_question().clone()),
            answer: flow.current_answer().cloned(),
            result: flow.result().copied().map(OutcomeView::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetreatView {
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveView {
    pub saved: bool,
    pub session: SessionView,
}
