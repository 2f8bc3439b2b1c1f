use super::common::*;

use std::sync::Arc;
use std::time::Duration;

use crate::assessment::answers::{AnswerSet, AnswerValue};
use crate::assessment::catalog::AnswerViolation;
use crate::assessment::persistence::MemoryProgressStore;
use crate::assessment::progression::{
    Advance, AssessmentFlow, FlowError, FlowPhase, Retreat, StepOutcome,
};
use crate::assessment::scoring::{LocalScorer, SeverityBand, SubmissionError};

fn answered_flow() -> AssessmentFlow {
    let mut flow = AssessmentFlow::new(two_question_catalog());
    flow.answer(id("q1"), AnswerValue::from("2")).expect("answer q1");
    flow
}

#[tokio::test]
async fn advance_without_answer_leaves_state_unchanged() {
    let mut flow = AssessmentFlow::new(two_question_catalog());
    let before = flow.state();

    let err = flow
        .advance(&LocalScorer, TIMEOUT)
        .await
        .expect_err("unanswered");

    assert_eq!(err, FlowError::Unanswered(id("q1")));
    assert_eq!(flow.state(), before);
    assert_eq!(flow.current_step(), 0);
}

#[tokio::test]
async fn answered_step_moves_forward() {
    let mut flow = answered_flow();

    let outcome = flow.advance(&LocalScorer, TIMEOUT).await.expect("advance");

    assert_eq!(outcome, Advance::Moved { step: 1 });
    assert!(flow.is_last_step());
    assert_eq!(flow.current_question().id, id("q2"));
}

#[test]
fn retreat_from_first_step_cancels_without_touching_answers() {
    let mut flow = answered_flow();

    let outcome = flow.retreat().expect("retreat");

    assert_eq!(outcome, Retreat::Cancelled);
    assert_eq!(flow.current_step(), 0);
    assert_eq!(flow.answers().get(&id("q1")), Some(&AnswerValue::from("2")));
}

#[test]
fn retreat_keeps_answers_and_decrements_step() {
    let mut flow = answered_flow();
    assert!(matches!(
        flow.step_forward().expect("step"),
        StepOutcome::Moved { step: 1 }
    ));
    flow.answer(id("q2"), AnswerValue::from(4)).expect("answer q2");

    assert_eq!(flow.retreat().expect("retreat"), Retreat::Moved { step: 0 });
    assert_eq!(flow.current_answer(), Some(&AnswerValue::from("2")));
    assert_eq!(flow.answered_count(), 2);
}

#[test]
fn completion_counts_the_current_step() {
    let mut flow = answered_flow();
    assert_eq!(flow.completion_pct(), 50.0);

    flow.step_forward().expect("step");
    assert_eq!(flow.completion_pct(), 100.0);
}

#[test]
fn answers_must_fit_their_question() {
    let mut flow = AssessmentFlow::new(two_question_catalog());

    assert_eq!(
        flow.answer(id("q9"), AnswerValue::from("1")),
        Err(FlowError::UnknownQuestion(id("q9")))
    );
    assert!(matches!(
        flow.answer(id("q1"), AnswerValue::from(2)),
        Err(FlowError::InvalidAnswer {
            violation: AnswerViolation::ExpectedChoice,
            ..
        })
    ));
    assert!(matches!(
        flow.answer(id("q2"), AnswerValue::from(2.5)),
        Err(FlowError::InvalidAnswer {
            violation: AnswerViolation::OffStep { .. },
            ..
        })
    ));
    assert!(flow.answers().is_empty());
}

#[tokio::test]
async fn incomplete_answers_on_last_step_do_not_reach_the_scorer() {
    let scorer = CountingScorer::default();
    let mut flow = answered_flow();
    flow.step_forward().expect("step");
    flow.answer(id("q2"), AnswerValue::from(8)).expect("answer q2");
    flow.answer(id("q1"), AnswerValue::from("")).expect("clear q1");
    let before = flow.state();

    let err = flow.advance(&scorer, TIMEOUT).await.expect_err("incomplete");

    assert_eq!(
        err,
        FlowError::IncompleteAssessment {
            missing: vec![id("q1")]
        }
    );
    assert_eq!(flow.state(), before);
    assert_eq!(flow.phase(), FlowPhase::Answering);
    assert_eq!(scorer.calls(), 0);
}

#[tokio::test]
async fn successful_submission_completes_and_clears_saved_progress() {
    let store = Arc::new(MemoryProgressStore::default());
    let mut flow =
        AssessmentFlow::new(two_question_catalog()).with_persistence(memory_bridge(&store, "flow"));
    flow.answer(id("q1"), AnswerValue::from("2")).expect("q1");
    flow.step_forward().expect("step");
    flow.answer(id("q2"), AnswerValue::from(8)).expect("q2");
    assert!(flow.save_progress());
    assert!(store.raw("flow").is_some());

    let outcome = flow.advance(&LocalScorer, TIMEOUT).await.expect("submit");

    let Advance::Completed(result) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(result.severity_band, SeverityBand::Mild);
    assert_eq!(flow.phase(), FlowPhase::Done);
    assert_eq!(flow.result(), Some(&result));
    assert!(flow.answers().is_empty());
    assert!(store.raw("flow").is_none());

    assert_eq!(
        flow.answer(id("q1"), AnswerValue::from("1")),
        Err(FlowError::AlreadyCompleted)
    );
    assert_eq!(
        flow.advance(&LocalScorer, TIMEOUT).await,
        Err(FlowError::AlreadyCompleted)
    );
}

#[tokio::test]
async fn failed_submission_rolls_back_to_last_step_and_retry_succeeds() {
    let mut flow = answered_flow();
    flow.step_forward().expect("step");
    flow.answer(id("q2"), AnswerValue::from(0)).expect("q2");

    let err = flow
        .advance(&FailingScorer, TIMEOUT)
        .await
        .expect_err("scorer fails");

    assert!(matches!(
        err,
        FlowError::SubmissionFailed(SubmissionError::Transport(_))
    ));
    let state = flow.state();
    assert_eq!(state.current_step, 1);
    assert!(!state.is_submitting);
    assert!(matches!(
        state.last_error,
        Some(SubmissionError::Transport(_))
    ));
    assert_eq!(flow.answered_count(), 2);

    let outcome = flow.advance(&LocalScorer, TIMEOUT).await.expect("retry");
    assert!(matches!(outcome, Advance::Completed(result) if result.is_at_risk));
    assert!(flow.last_error().is_none());
}

#[tokio::test]
async fn slow_scorer_times_out_as_a_recoverable_failure() {
    let mut flow = answered_flow();
    flow.step_forward().expect("step");
    flow.answer(id("q2"), AnswerValue::from(3)).expect("q2");

    let err = flow
        .advance(
            &SlowScorer(Duration::from_millis(500)),
            Duration::from_millis(20),
        )
        .await
        .expect_err("timeout");

    assert_eq!(
        err,
        FlowError::SubmissionFailed(SubmissionError::Timeout { timeout_ms: 20 })
    );
    assert_eq!(flow.phase(), FlowPhase::Answering);
    assert!(flow.is_last_step());
}

#[test]
fn pending_submission_blocks_other_moves() {
    let mut flow = answered_flow();
    flow.step_forward().expect("step");
    flow.answer(id("q2"), AnswerValue::from(5)).expect("q2");

    let StepOutcome::Submit(request) = flow.step_forward().expect("submit") else {
        panic!("expected a submission request");
    };
    assert_eq!(request.answers.len(), 2);
    assert!(flow.state().is_submitting);

    assert_eq!(
        flow.answer(id("q2"), AnswerValue::from(6)),
        Err(FlowError::SubmissionInProgress)
    );
    assert_eq!(flow.retreat(), Err(FlowError::SubmissionInProgress));
    assert!(matches!(
        flow.step_forward(),
        Err(FlowError::SubmissionInProgress)
    ));
}

#[test]
fn finishing_requires_a_pending_submission() {
    let mut flow = answered_flow();

    let err = flow
        .finish_submission(Err(SubmissionError::Unauthenticated))
        .expect_err("not submitting");

    assert_eq!(err, FlowError::NotSubmitting);
    assert!(flow.last_error().is_none());
}

#[test]
fn resume_keeps_only_answers_that_still_fit() {
    let store = Arc::new(MemoryProgressStore::default());
    let bridge = memory_bridge(&store, "resume");
    let saved: AnswerSet = [
        ("q1", AnswerValue::from("3")),
        ("q2", AnswerValue::from(42)),
        ("retired", AnswerValue::from("1")),
    ]
    .into_iter()
    .collect();
    assert!(bridge.save(&saved));

    let flow = AssessmentFlow::resume(two_question_catalog(), bridge);

    assert_eq!(flow.current_step(), 0);
    assert_eq!(flow.answers().len(), 1);
    assert_eq!(flow.current_answer(), Some(&AnswerValue::from("3")));
}
