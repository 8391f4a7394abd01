//! HTTP request handlers for the payroll engine API.
//!
//! This module contains the handler functions for all API endpoints. Engine
//! calls block on the store and family locks, so they run on the blocking
//! thread pool.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::PayrollEngine;
use crate::error::EngineResult;
use crate::models::NewPayroll;

use super::request::{
    ActivateDueRequest, ActivateVersionsRequest, AdjustDateQuery, AssignConsultantRequest,
    CommitAssignmentsRequest, CreateVersionRequest, FallBackRequest, GenerateDatesRequest,
    SimpleVersionRequest, UpdateNotesRequest,
};
use super::response::{ApiError, ApiErrorResponse};
use super::state::AppState;

/// Header carrying the id of the actor making a change.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/payrolls", post(create_payroll_handler))
        .route("/payrolls/:id/dates", get(family_schedule_handler))
        .route("/payrolls/:id/dates/generate", post(generate_dates_handler))
        .route("/payrolls/:id/versions", post(create_version_handler))
        .route("/payrolls/:id/versions/simple", post(create_version_simple_handler))
        .route("/payrolls/:id/latest", get(latest_version_handler))
        .route("/payrolls/:id/history", get(version_history_handler))
        .route("/versions/activate", post(activate_versions_handler))
        .route("/versions/activate-due", post(activate_due_handler))
        .route("/versions/:id", delete(discard_draft_handler))
        .route("/assignments", post(assign_consultant_handler))
        .route("/assignments/commit", post(commit_assignments_handler))
        .route("/dates/:id/notes", put(update_notes_handler))
        .route("/dates/:id/backup", post(fall_back_handler))
        .route("/dates/:id/assignments", get(assignment_history_handler))
        .route("/calendar/adjust", get(adjust_date_handler))
        .with_state(state)
}

/// Handler for GET /health.
async fn health_handler() -> Response {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Handler for POST /payrolls.
///
/// Creates a payroll family and generates its dates over the horizon.
async fn create_payroll_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewPayroll>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Processing create payroll request");

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection, correlation_id),
    };
    let actor_id = match actor_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let start_time = Instant::now();
    match run(&state, move |engine| engine.create_payroll(request, actor_id)).await {
        Ok(outcome) => {
            info!(
                correlation_id = %correlation_id,
                payroll_id = %outcome.payroll.id,
                dates = outcome.generation.as_ref().map_or(0, |g| g.created),
                duration_us = start_time.elapsed().as_micros(),
                "Payroll created"
            );
            json_response(StatusCode::CREATED, &outcome)
        }
        Err(err) => failure(err, correlation_id, "Create payroll failed"),
    }
}

/// Handler for POST /payrolls/:id/dates/generate.
async fn generate_dates_handler(
    State(state): State<AppState>,
    Path(payroll_id): Path<Uuid>,
    payload: Result<Json<GenerateDatesRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, payroll_id = %payroll_id, "Processing generate dates request");

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection, correlation_id),
    };

    let start_time = Instant::now();
    let result = run(&state, move |engine| {
        engine.generate_dates(
            payroll_id,
            request.window_start,
            request.window_end,
            request.max_dates,
        )
    })
    .await;
    match result {
        Ok(outcome) => {
            info!(
                correlation_id = %correlation_id,
                created = outcome.created,
                skipped = outcome.skipped,
                truncated = outcome.truncated,
                duration_us = start_time.elapsed().as_micros(),
                "Dates generated"
            );
            json_response(StatusCode::OK, &outcome)
        }
        Err(err) => failure(err, correlation_id, "Date generation failed"),
    }
}

/// Handler for GET /payrolls/:id/dates.
async fn family_schedule_handler(
    State(state): State<AppState>,
    Path(payroll_id): Path<Uuid>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    match run(&state, move |engine| engine.family_schedule(payroll_id)).await {
        Ok(dates) => json_response(StatusCode::OK, &dates),
        Err(err) => failure(err, correlation_id, "Schedule lookup failed"),
    }
}

/// Handler for POST /payrolls/:id/versions.
///
/// Activates the new version immediately unless `draft` is set.
async fn create_version_handler(
    State(state): State<AppState>,
    Path(payroll_id): Path<Uuid>,
    headers: HeaderMap,
    payload: Result<Json<CreateVersionRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, payroll_id = %payroll_id, "Processing create version request");

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection, correlation_id),
    };
    let actor_id = match actor_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    if request.draft {
        let result = run(&state, move |engine| {
            engine.create_draft_version(payroll_id, request.changes, request.reason, actor_id)
        })
        .await;
        return match result {
            Ok(draft) => {
                info!(correlation_id = %correlation_id, draft_id = %draft.id, "Draft version created");
                json_response(StatusCode::CREATED, &draft)
            }
            Err(err) => failure(err, correlation_id, "Create draft failed"),
        };
    }

    let result = run(&state, move |engine| {
        engine.create_version(payroll_id, request.changes, request.reason, actor_id)
    })
    .await;
    match result {
        Ok(outcome) => {
            info!(
                correlation_id = %correlation_id,
                version_id = %outcome.payroll.id,
                version_number = outcome.payroll.version_number,
                removed_dates = outcome.removed_dates,
                "Version created"
            );
            json_response(StatusCode::CREATED, &outcome)
        }
        Err(err) => failure(err, correlation_id, "Create version failed"),
    }
}

/// Handler for POST /payrolls/:id/versions/simple.
async fn create_version_simple_handler(
    State(state): State<AppState>,
    Path(payroll_id): Path<Uuid>,
    headers: HeaderMap,
    payload: Result<Json<SimpleVersionRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection, correlation_id),
    };
    let actor_id = match actor_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let result = run(&state, move |engine| {
        engine.create_version_simple(payroll_id, request.reason, actor_id)
    })
    .await;
    match result {
        Ok(outcome) => {
            info!(correlation_id = %correlation_id, version_id = %outcome.payroll.id, "Simple version created");
            json_response(StatusCode::CREATED, &outcome)
        }
        Err(err) => failure(err, correlation_id, "Create simple version failed"),
    }
}

/// Handler for GET /payrolls/:id/latest.
async fn latest_version_handler(
    State(state): State<AppState>,
    Path(payroll_id): Path<Uuid>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    match run(&state, move |engine| engine.get_latest_version(payroll_id)).await {
        Ok(payroll) => json_response(StatusCode::OK, &payroll),
        Err(err) => failure(err, correlation_id, "Latest version lookup failed"),
    }
}

/// Handler for GET /payrolls/:id/history.
async fn version_history_handler(
    State(state): State<AppState>,
    Path(payroll_id): Path<Uuid>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    match run(&state, move |engine| engine.get_version_history(payroll_id)).await {
        Ok(history) => json_response(StatusCode::OK, &history),
        Err(err) => failure(err, correlation_id, "Version history lookup failed"),
    }
}

/// Handler for POST /versions/activate.
///
/// Each draft succeeds or fails on its own; the response lists both.
async fn activate_versions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ActivateVersionsRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection, correlation_id),
    };
    let actor_id = match actor_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let result = run(&state, move |engine| {
        Ok(engine.activate_payroll_versions(request.version_ids, actor_id))
    })
    .await;
    match result {
        Ok(outcome) => {
            info!(
                correlation_id = %correlation_id,
                applied = outcome.applied.len(),
                failed = outcome.failed.len(),
                "Version activation completed"
            );
            json_response(StatusCode::OK, &outcome)
        }
        Err(err) => failure(err, correlation_id, "Version activation failed"),
    }
}

/// Handler for POST /versions/activate-due.
async fn activate_due_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ActivateDueRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection, correlation_id),
    };
    let actor_id = match actor_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let as_of = request.as_of;
    match run(&state, move |engine| Ok(engine.activate_due_versions(as_of, actor_id))).await {
        Ok(outcome) => {
            info!(
                correlation_id = %correlation_id,
                as_of = %as_of,
                applied = outcome.applied.len(),
                failed = outcome.failed.len(),
                "Due versions activated"
            );
            json_response(StatusCode::OK, &outcome)
        }
        Err(err) => failure(err, correlation_id, "Due version activation failed"),
    }
}

/// Handler for DELETE /versions/:id.
async fn discard_draft_handler(
    State(state): State<AppState>,
    Path(draft_id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let actor_id = match actor_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    match run(&state, move |engine| engine.discard_draft(draft_id, actor_id)).await {
        Ok(draft) => {
            info!(correlation_id = %correlation_id, draft_id = %draft.id, "Draft discarded");
            json_response(StatusCode::OK, &draft)
        }
        Err(err) => failure(err, correlation_id, "Discard draft failed"),
    }
}

/// Handler for POST /assignments.
async fn assign_consultant_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AssignConsultantRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection, correlation_id),
    };
    let actor_id = match actor_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let result = run(&state, move |engine| {
        engine.assign_consultant(
            request.payroll_date_id,
            request.consultant_id,
            request.is_backup,
            actor_id,
            &request.reason,
        )
    })
    .await;
    match result {
        Ok(assignment) => {
            info!(
                correlation_id = %correlation_id,
                payroll_date_id = %assignment.payroll_date_id,
                consultant_id = %assignment.consultant_id,
                "Consultant assigned"
            );
            json_response(StatusCode::OK, &assignment)
        }
        Err(err) => failure(err, correlation_id, "Assignment failed"),
    }
}

/// Handler for POST /assignments/commit.
///
/// Partial success is reported with 200; the caller inspects `failed`.
async fn commit_assignments_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CommitAssignmentsRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection, correlation_id),
    };
    let actor_id = match actor_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let start_time = Instant::now();
    let result = run(&state, move |engine| {
        Ok(engine.commit_payroll_assignments(request.changes, actor_id, &request.reason))
    })
    .await;
    match result {
        Ok(outcome) => {
            info!(
                correlation_id = %correlation_id,
                applied = outcome.applied.len(),
                failed = outcome.failed.len(),
                duration_us = start_time.elapsed().as_micros(),
                "Assignment batch committed"
            );
            json_response(StatusCode::OK, &outcome)
        }
        Err(err) => failure(err, correlation_id, "Assignment batch failed"),
    }
}

/// Handler for PUT /dates/:id/notes.
async fn update_notes_handler(
    State(state): State<AppState>,
    Path(payroll_date_id): Path<Uuid>,
    headers: HeaderMap,
    payload: Result<Json<UpdateNotesRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection, correlation_id),
    };
    let actor_id = match actor_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let result = run(&state, move |engine| {
        engine.update_date_notes(payroll_date_id, request.notes, actor_id)
    })
    .await;
    match result {
        Ok(date) => json_response(StatusCode::OK, &date),
        Err(err) => failure(err, correlation_id, "Notes update failed"),
    }
}

/// Handler for POST /dates/:id/backup.
async fn fall_back_handler(
    State(state): State<AppState>,
    Path(payroll_date_id): Path<Uuid>,
    headers: HeaderMap,
    payload: Result<Json<FallBackRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection, correlation_id),
    };
    let actor_id = match actor_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let result = run(&state, move |engine| {
        engine.fall_back_to_backup(payroll_date_id, actor_id, &request.reason)
    })
    .await;
    match result {
        Ok(assignment) => {
            info!(
                correlation_id = %correlation_id,
                payroll_date_id = %payroll_date_id,
                consultant_id = %assignment.consultant_id,
                "Backup consultant took over"
            );
            json_response(StatusCode::OK, &assignment)
        }
        Err(err) => failure(err, correlation_id, "Backup fallback failed"),
    }
}

/// Handler for GET /dates/:id/assignments.
async fn assignment_history_handler(
    State(state): State<AppState>,
    Path(payroll_date_id): Path<Uuid>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    match run(&state, move |engine| engine.assignment_history(payroll_date_id)).await {
        Ok(audits) => json_response(StatusCode::OK, &audits),
        Err(err) => failure(err, correlation_id, "Assignment history lookup failed"),
    }
}

/// Handler for GET /calendar/adjust.
async fn adjust_date_handler(
    State(state): State<AppState>,
    query: Result<Query<AdjustDateQuery>, QueryRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();

    let query = match query {
        Ok(Query(q)) => q,
        Err(rejection) => {
            let body_text = rejection.body_text();
            warn!(correlation_id = %correlation_id, error = %body_text, "Invalid query");
            return json_response(
                StatusCode::BAD_REQUEST,
                &ApiError::validation_error(body_text),
            );
        }
    };

    let adjustment = match state.engine().generator().adjuster().adjust(
        query.date,
        &query.country,
        query.region.as_deref(),
        query.direction,
    ) {
        Ok(adjustment) => adjustment,
        Err(err) => return failure(err.into(), correlation_id, "Date adjustment failed"),
    };
    if let Some(warning) = &adjustment.warning {
        warn!(correlation_id = %correlation_id, warning = %warning, "Adjusted without holiday data");
    }
    json_response(StatusCode::OK, &adjustment)
}

/// Runs an engine call on the blocking pool.
async fn run<T, F>(state: &AppState, call: F) -> Result<T, ApiErrorResponse>
where
    F: FnOnce(&PayrollEngine) -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = state.engine_handle();
    tokio::task::spawn_blocking(move || call(&engine))
        .await
        .map_err(|err| ApiErrorResponse::internal(format!("Engine task failed: {}", err)))?
        .map_err(ApiErrorResponse::from)
}

/// Reads the actor id from the request headers.
fn actor_id(headers: &HeaderMap) -> Result<Uuid, ApiErrorResponse> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(|| ApiErrorResponse::bad_request(ApiError::missing_actor()))
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], Json(body)).into_response()
}

fn failure(err: ApiErrorResponse, correlation_id: Uuid, message: &str) -> Response {
    warn!(
        correlation_id = %correlation_id,
        code = %err.error.code,
        error = %err.error.message,
        "{}", message
    );
    json_response(err.status, &err.error)
}

/// Maps a body rejection onto the API's error codes.
fn rejection_response(rejection: JsonRejection, correlation_id: Uuid) -> Response {
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(
                correlation_id = %correlation_id,
                error = %body_text,
                "JSON data error"
            );
            if body_text.contains("missing field") {
                ApiError::validation_error(body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(
                correlation_id = %correlation_id,
                error = %err,
                "JSON syntax error"
            );
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    json_response(StatusCode::BAD_REQUEST, &error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::EngineConfig;
    use crate::models::{Holiday, Payroll};
    use crate::scheduling::HolidayTable;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn make_date(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
    }

    fn create_test_state() -> AppState {
        let holidays = HolidayTable::new(vec![Holiday {
            date: make_date("2025-01-15"),
            name: "Mid-month holiday".to_string(),
            country_code: "US".to_string(),
            is_global: true,
            regions: vec![],
        }]);
        let config = EngineConfig::new(Default::default(), vec![], holidays);
        let clock = Arc::new(FixedClock::on(make_date("2025-01-01")));
        AppState::with_engine(PayrollEngine::new(&config, clock))
    }

    fn new_payroll_body() -> String {
        serde_json::json!({
            "client_id": Uuid::new_v4(),
            "name": "Acme monthly",
            "cycle": "monthly",
            "date_type": "fixed_date",
            "date_value": 15,
            "go_live_date": "2025-01-01",
            "processing_days_before_eft": 0,
            "holiday_country": "US",
            "consultants": { "primary": Uuid::new_v4() }
        })
        .to_string()
    }

    fn post(uri: &str, body: String, actor: Option<Uuid>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(actor) = actor {
            builder = builder.header(ACTOR_HEADER, actor.to_string());
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let router = create_router(create_test_state());
        let response = router.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_payroll_returns_201_with_dates() {
        let router = create_router(create_test_state());
        let response = router
            .oneshot(post("/payrolls", new_payroll_body(), Some(Uuid::new_v4())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let content_type = response.headers().get("content-type").unwrap();
        assert_eq!(content_type, "application/json");

        let body = body_json(response).await;
        let payroll: Payroll = serde_json::from_value(body["payroll"].clone()).unwrap();
        assert_eq!(payroll.version_number, 1);
        assert_eq!(body["generation"]["created"], 12);
        assert_eq!(body["generation"]["dates"][0]["adjusted_eft_date"], "2025-01-14");
    }

    #[tokio::test]
    async fn test_missing_actor_returns_400() {
        let router = create_router(create_test_state());
        let response = router
            .oneshot(post("/payrolls", new_payroll_body(), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(error.code, "MISSING_ACTOR");
    }

    #[tokio::test]
    async fn test_malformed_json_returns_400() {
        let router = create_router(create_test_state());
        let response = router
            .oneshot(post("/payrolls", "{invalid json".to_string(), Some(Uuid::new_v4())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(error.code, "MALFORMED_JSON");
    }

    #[tokio::test]
    async fn test_missing_field_returns_validation_error() {
        let router = create_router(create_test_state());
        let body = r#"{"name": "No client", "cycle": "monthly"}"#.to_string();
        let response = router
            .oneshot(post("/payrolls", body, Some(Uuid::new_v4())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_invalid_schedule_returns_invalid_configuration() {
        let router = create_router(create_test_state());
        let body = serde_json::json!({
            "client_id": Uuid::new_v4(),
            "name": "Broken",
            "cycle": "monthly",
            "date_type": "fixed_date",
            "date_value": 40,
            "go_live_date": "2025-01-01"
        })
        .to_string();
        let response = router
            .oneshot(post("/payrolls", body, Some(Uuid::new_v4())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(error.code, "INVALID_CONFIGURATION");
    }

    #[tokio::test]
    async fn test_unknown_payroll_returns_404() {
        let router = create_router(create_test_state());
        let response = router
            .oneshot(get(&format!("/payrolls/{}/latest", Uuid::new_v4())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error: ApiError = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(error.code, "PAYROLL_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_calendar_adjust_moves_saturday_earlier() {
        let router = create_router(create_test_state());
        let response = router
            .oneshot(get("/calendar/adjust?date=2025-03-15&country=US"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["original"], "2025-03-15");
        assert_eq!(body["date"], "2025-03-14");
    }

    #[tokio::test]
    async fn test_calendar_adjust_rejects_bad_date() {
        let router = create_router(create_test_state());
        let response = router
            .oneshot(get("/calendar/adjust?date=2025-02-30&country=US"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
    }
}
