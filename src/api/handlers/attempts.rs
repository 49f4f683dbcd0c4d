use crate::api::extractors::CurrentUser;
use crate::db::models::{
    ApiResponse, AttemptResult, ExamAttempt, PageParams, Permission, StartAttemptParams,
    StartedAttempt, SubmitAttemptParams,
};
use crate::db::DbClient;
use crate::errors::{ApiError, ErrorMessages};
use crate::services::misc::Page;
use crate::Result;
use axum::extract::{Path, Query, State};
use axum::{http::StatusCode, Json};

// Route handler for GET /api/attempts
pub(crate) async fn list_attempts(
    State(db): State<DbClient>,
    current: CurrentUser,
    Query(page): Query<PageParams>,
) -> Result<ApiResponse<Vec<ExamAttempt>>> {
    let page = Page::from(&page);
    let (attempts, total) = db.list_attempts(current.id(), page).await?;
    Ok(ApiResponse::page(attempts, page.meta(total)))
}

// Route handler for POST /api/attempts
pub(crate) async fn start_attempt(
    State(db): State<DbClient>,
    current: CurrentUser,
    Json(payload): Json<StartAttemptParams>,
) -> Result<(StatusCode, ApiResponse<StartedAttempt>)> {
    current.require(Permission::TakeExams)?;
    let started = db.start_attempt(&current.user, &payload.booking_id).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(started).with_message("Attempt started"),
    ))
}

// Route handler for GET /api/attempts/:id
pub(crate) async fn get_attempt(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(attempt_id): Path<String>,
) -> Result<ApiResponse<AttemptResult>> {
    let result = db.get_attempt_result(&attempt_id).await?;
    if result.attempt.user_id != current.user.id && !current.is_staff() {
        return Err(ApiError::Forbidden(ErrorMessages::Forbidden.to_string()));
    }
    Ok(ApiResponse::ok(result))
}

// Route handler for POST /api/attempts/:id/submit
pub(crate) async fn submit_attempt(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(attempt_id): Path<String>,
    Json(payload): Json<SubmitAttemptParams>,
) -> Result<ApiResponse<AttemptResult>> {
    let result = db.submit_attempt(&current.user, &attempt_id, &payload).await?;
    let message = match result.attempt.passed {
        Some(true) => "Attempt submitted: passed",
        _ => "Attempt submitted",
    };
    Ok(ApiResponse::ok(result).with_message(message))
}
