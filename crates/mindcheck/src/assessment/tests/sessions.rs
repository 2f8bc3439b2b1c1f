use super::common::*;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use tower::ServiceExt;

use crate::assessment::answers::AnswerValue;
use crate::assessment::persistence::MemoryProgressStore;
use crate::assessment::progression::FlowError;
use crate::assessment::router::assessment_router;
use crate::assessment::scoring::{LocalScorer, RiskScorer};
use crate::assessment::service::{AssessmentService, AssessmentServiceError, SessionId};
use crate::config::SessionLimits;

fn limited_service(
    scorer: Arc<dyn RiskScorer>,
    store: Arc<MemoryProgressStore>,
    limits: SessionLimits,
) -> Arc<AssessmentService> {
    Arc::new(
        AssessmentService::new(two_question_catalog(), scorer, store, TIMEOUT)
            .with_session_limits(limits),
    )
}

/// Same epoch prefix as `id`, different sequence number.
fn sibling(id: &SessionId, seq: u64) -> SessionId {
    let (prefix, _) = id.0.rsplit_once('-').expect("sequence suffix");
    SessionId(format!("{prefix}-{seq:06}"))
}

fn answer_first(service: &AssessmentService, session: &SessionId) {
    service
        .answer(session, id("q1"), AnswerValue::from("2"))
        .expect("q1");
}

/// Leaves the session on its last step with every question answered.
async fn ready_to_submit(service: &AssessmentService, session: &SessionId) {
    answer_first(service, session);
    service.advance(session).await.expect("move to q2");
    service
        .answer(session, id("q2"), AnswerValue::from(8))
        .expect("q2");
}

async fn wait_until_submitting(service: &AssessmentService, session: &SessionId) {
    for _ in 0..200 {
        if service.view(session).expect("view").is_submitting {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("session never entered submission");
}

#[test]
fn fresh_sessions_never_take_over_a_resumed_id() {
    let (service, _) = local_service();

    let resumed = service.start(Some(SessionId("session-000001".to_string())));
    service
        .answer(&resumed.session_id, id("q1"), AnswerValue::from("3"))
        .expect("answer");

    let fresh = service.start(None);
    assert_ne!(fresh.session_id, resumed.session_id);
    assert_eq!(service.view(&resumed.session_id).expect("view").answered, 1);

    let predicted = sibling(&fresh.session_id, 2);
    let claimed = service.start(Some(predicted.clone()));
    service
        .answer(&claimed.session_id, id("q1"), AnswerValue::from("1"))
        .expect("answer");

    let next = service.start(None);
    assert_ne!(next.session_id, predicted);
    assert_eq!(next.answered, 0);
    let kept = service.view(&predicted).expect("view");
    assert_eq!(kept.answer, Some(AnswerValue::from("1")));
}

#[test]
fn fresh_sessions_skip_ids_with_saved_progress() {
    let (service, store) = local_service();
    let first = service.start(None);
    let predicted = sibling(&first.session_id, 2);
    assert!(memory_bridge(&store, &predicted.progress_key()).save(&answers("3", 1)));

    let second = service.start(None);

    assert_ne!(second.session_id, predicted);
    assert!(store.raw(&predicted.progress_key()).is_some());
    let restored = service.start(Some(predicted));
    assert_eq!(restored.answered, 2);
}

#[tokio::test]
async fn concurrent_advance_sees_the_pending_submission() {
    let store = Arc::new(MemoryProgressStore::default());
    let service = service_with(Arc::new(SlowScorer(Duration::from_millis(200))), store);
    let session = service.start(None).session_id;
    ready_to_submit(&service, &session).await;

    let first = {
        let service = Arc::clone(&service);
        let session = session.clone();
        tokio::spawn(async move { service.advance(&session).await })
    };
    wait_until_submitting(&service, &session).await;

    let err = service.advance(&session).await.expect_err("second advance");
    assert!(matches!(
        err,
        AssessmentServiceError::Flow(FlowError::SubmissionInProgress)
    ));

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/v1/assessment/sessions/{session}/advance"))
        .body(Body::empty())
        .expect("request");
    let response = assessment_router(Arc::clone(&service))
        .oneshot(request)
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let completed = first.await.expect("join").expect("first advance scores");
    assert_eq!(completed.status, "completed");
    assert!(completed.result.is_some());
}

#[test]
fn expired_sessions_are_dropped_but_saved_progress_remains() {
    let store = Arc::new(MemoryProgressStore::default());
    let service = limited_service(
        Arc::new(LocalScorer),
        store,
        SessionLimits {
            ttl: Duration::ZERO,
            max_sessions: 100,
        },
    );
    let stale = service.start(None).session_id;
    answer_first(&service, &stale);
    assert!(service.save(&stale).expect("save").saved);

    let current = service.start(None).session_id;

    assert!(matches!(
        service.view(&stale),
        Err(AssessmentServiceError::NotFound(_))
    ));
    assert!(service.view(&current).is_ok());
    assert_eq!(service.start(Some(stale)).answered, 1);
}

#[test]
fn oldest_session_is_evicted_at_capacity() {
    let service = limited_service(
        Arc::new(LocalScorer),
        Arc::new(MemoryProgressStore::default()),
        SessionLimits {
            ttl: Duration::from_secs(3600),
            max_sessions: 1,
        },
    );
    let older = service.start(None).session_id;
    let newer = service.start(None).session_id;

    assert!(matches!(
        service.view(&older),
        Err(AssessmentServiceError::NotFound(_))
    ));
    assert!(service.view(&newer).is_ok());
}

#[tokio::test]
async fn sessions_awaiting_the_scorer_are_not_evicted() {
    let service = limited_service(
        Arc::new(SlowScorer(Duration::from_millis(100))),
        Arc::new(MemoryProgressStore::default()),
        SessionLimits {
            ttl: Duration::ZERO,
            max_sessions: 1,
        },
    );
    let pending = service.start(None).session_id;
    ready_to_submit(&service, &pending).await;

    let submission = {
        let service = Arc::clone(&service);
        let pending = pending.clone();
        tokio::spawn(async move { service.advance(&pending).await })
    };
    wait_until_submitting(&service, &pending).await;

    let other = service.start(None).session_id;
    assert!(service.view(&other).is_ok());

    let completed = submission.await.expect("join").expect("scored");
    assert_eq!(completed.status, "completed");
}
