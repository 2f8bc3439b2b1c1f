use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::assessment::answers::{AnswerSet, AnswerValue};
use crate::assessment::catalog::{Question, QuestionCatalog, QuestionId, ScoreDirection};
use crate::assessment::persistence::{MemoryProgressStore, PersistenceBridge};
use crate::assessment::scoring::{LocalScorer, RiskScorer, ScoringResult, SubmissionError};
use crate::assessment::service::AssessmentService;

pub(super) const TIMEOUT: Duration = Duration::from_secs(5);

/// Radio q1 weighted "0".."3" and a higher-is-better slider q2 over 0..=10.
pub(super) fn two_question_catalog() -> Arc<QuestionCatalog> {
    Arc::new(
        QuestionCatalog::new(vec![
            Question::radio(
                "q1",
                "How often have you felt down?",
                &[
                    ("0", "Not at all"),
                    ("1", "Several days"),
                    ("2", "More than half the days"),
                    ("3", "Nearly every day"),
                ],
            ),
            Question::slider(
                "q2",
                "Rate your mood",
                (0.0, 10.0),
                &[(0, "Very low"), (10, "Very good")],
                ScoreDirection::HigherIsBetter,
            ),
        ])
        .expect("valid catalog"),
    )
}

pub(super) fn id(raw: &str) -> QuestionId {
    QuestionId::from(raw)
}

pub(super) fn answers(q1: &str, q2: i32) -> AnswerSet {
    [
        ("q1", AnswerValue::from(q1)),
        ("q2", AnswerValue::from(q2)),
    ]
    .into_iter()
    .collect()
}

/// Full PHQ answer set: six ordinal weights, then mood and difficulty readings.
pub(super) fn phq_answers(ordinal: [&str; 6], mood: i32, difficulty: i32) -> AnswerSet {
    let ordinal_ids = [
        "interest",
        "hopelessness",
        "sleep",
        "energy",
        "self_worth",
        "concentration",
    ];
    let mut answers: AnswerSet = ordinal_ids
        .into_iter()
        .zip(ordinal)
        .map(|(id, value)| (id, AnswerValue::from(value)))
        .collect();
    answers.insert(id("mood"), AnswerValue::from(mood));
    answers.insert(id("difficulty"), AnswerValue::from(difficulty));
    answers
}

pub(super) fn memory_bridge(store: &Arc<MemoryProgressStore>, key: &str) -> PersistenceBridge {
    PersistenceBridge::new(store.clone(), key)
}

/// Counts calls and delegates to the local scorer.
#[derive(Default)]
pub(super) struct CountingScorer {
    calls: AtomicUsize,
}

impl CountingScorer {
    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RiskScorer for CountingScorer {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn score(
        &self,
        catalog: &QuestionCatalog,
        answers: &AnswerSet,
    ) -> Result<ScoringResult, SubmissionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        LocalScorer.score(catalog, answers).await
    }
}

pub(super) struct FailingScorer;

#[async_trait]
impl RiskScorer for FailingScorer {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn score(
        &self,
        _catalog: &QuestionCatalog,
        _answers: &AnswerSet,
    ) -> Result<ScoringResult, SubmissionError> {
        Err(SubmissionError::Transport("connection refused".to_string()))
    }
}

pub(super) struct SlowScorer(pub(super) Duration);

#[async_trait]
impl RiskScorer for SlowScorer {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn score(
        &self,
        catalog: &QuestionCatalog,
        answers: &AnswerSet,
    ) -> Result<ScoringResult, SubmissionError> {
        tokio::time::sleep(self.0).await;
        LocalScorer.score(catalog, answers).await
    }
}

pub(super) fn service_with(
    scorer: Arc<dyn RiskScorer>,
    store: Arc<MemoryProgressStore>,
) -> Arc<AssessmentService> {
    Arc::new(AssessmentService::new(
        two_question_catalog(),
        scorer,
        store,
        TIMEOUT,
    ))
}

pub(super) fn local_service() -> (Arc<AssessmentService>, Arc<MemoryProgressStore>) {
    let store = Arc::new(MemoryProgressStore::default());
    (service_with(Arc::new(LocalScorer), store.clone()), store)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
