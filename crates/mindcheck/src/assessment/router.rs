use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::answers::{AnswerSet, AnswerValue};
use super::catalog::QuestionId;
use super::progression::FlowError;
use super::service::{AssessmentService, AssessmentServiceError, SessionId};

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub resume: Option<SessionId>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub value: AnswerValue,
}

/// Router builder exposing the questionnaire flow over HTTP.
pub fn assessment_router(service: Arc<AssessmentService>) -> Router {
    Router::new()
        .route("/api/v1/assessment/catalog", get(catalog_handler))
        .route("/api/v1/assessment/score", post(score_handler))
        .route("/api/v1/assessment/sessions", post(start_handler))
        .route(
            "/api/v1/assessment/sessions/:session_id",
            get(session_handler),
        )
        .route(
            "/api/v1/assessment/sessions/:session_id/answers/:question_id",
            put(answer_handler),
        )
        .route(
            "/api/v1/assessment/sessions/:session_id/advance",
            post(advance_handler),
        )
        .route(
            "/api/v1/assessment/sessions/:session_id/retreat",
            post(retreat_handler),
        )
        .route(
            "/api/v1/assessment/sessions/:session_id/save",
            post(save_handler),
        )
        .with_state(service)
}

pub(crate) async fn catalog_handler(State(service): State<Arc<AssessmentService>>) -> Response {
    let catalog = service.catalog();
    let payload = json!({
        "total_steps": catalog.total_steps(),
        "scorer": service.scorer_name(),
        "questions": catalog.questions(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn score_handler(
    State(service): State<Arc<AssessmentService>>,
    Json(answers): Json<AnswerSet>,
) -> Response {
    match service.score(&answers) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn start_handler(
    State(service): State<Arc<AssessmentService>>,
    request: Option<Json<StartSessionRequest>>,
) -> Response {
    let Json(request) = request.unwrap_or_default();
    let view = service.start(request.resume);
    (StatusCode::CREATED, Json(view)).into_response()
}

pub(crate) async fn session_handler(
    State(service): State<Arc<AssessmentService>>,
    Path(session_id): Path<String>,
) -> Response {
    match service.view(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn answer_handler(
    State(service): State<Arc<AssessmentService>>,
    Path((session_id, question_id)): Path<(String, String)>,
    Json(request): Json<AnswerRequest>,
) -> Response {
    match service.answer(
        &SessionId(session_id),
        QuestionId(question_id),
        request.value,
    ) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn advance_handler(
    State(service): State<Arc<AssessmentService>>,
    Path(session_id): Path<String>,
) -> Response {
    match service.advance(&SessionId(session_id)).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn retreat_handler(
    State(service): State<Arc<AssessmentService>>,
    Path(session_id): Path<String>,
) -> Response {
    match service.retreat(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn save_handler(
    State(service): State<Arc<AssessmentService>>,
    Path(session_id): Path<String>,
) -> Response {
    match service.save(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

/// HTTP status for a session-level failure.
pub(crate) fn status_for(error: &AssessmentServiceError) -> StatusCode {
    match error {
        AssessmentServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        AssessmentServiceError::Flow(flow) => match flow {
            FlowError::Unanswered(_)
            | FlowError::IncompleteAssessment { .. }
            | FlowError::InvalidAnswer { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            FlowError::UnknownQuestion(_) => StatusCode::NOT_FOUND,
            FlowError::SubmissionInProgress
            | FlowError::AlreadyCompleted
            | FlowError::NotSubmitting => StatusCode::CONFLICT,
            FlowError::SubmissionFailed(_) => StatusCode::BAD_GATEWAY,
        },
    }
}

fn error_response(error: AssessmentServiceError) -> Response {
    let status = status_for(&error);
    let retryable = matches!(
        error,
        AssessmentServiceError::Flow(FlowError::SubmissionFailed(_))
    );
    let payload = json!({
        "error": error.to_string(),
        "retryable": retryable,
    });
    (status, Json(payload)).into_response()
}
