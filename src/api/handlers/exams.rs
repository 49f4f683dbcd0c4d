use crate::api::extractors::CurrentUser;
use crate::db::models::{ApiResponse, Exam, ExamFilterParams, ExamParams, PageParams, Permission};
use crate::db::DbClient;
use crate::errors::ApiError;
use crate::services::misc::Page;
use crate::validation::validate_exam;
use crate::Result;
use axum::extract::{Path, Query, State};
use axum::{http::StatusCode, Json};
use validator::Validate;

fn validate_payload(payload: &ExamParams) -> Result<()> {
    payload.validate()?;
    validate_exam(payload).map_err(ApiError::Validation)
}

// Route handler for GET /api/exams
pub(crate) async fn list_exams(
    State(db): State<DbClient>,
    current: CurrentUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<ExamFilterParams>,
) -> Result<ApiResponse<Vec<Exam>>> {
    let page = Page::from(&page);
    let (exams, total) = db.list_exams(&filter, current.is_staff(), page).await?;
    Ok(ApiResponse::page(exams, page.meta(total)))
}

// Route handler for GET /api/exams/:id
pub(crate) async fn get_exam(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<ApiResponse<Exam>> {
    let exam = db.get_exam(&exam_id).await?;
    // Drafts are invisible to candidates
    if !exam.is_published && !current.is_staff() {
        return Err(ApiError::not_found("Exam"));
    }
    Ok(ApiResponse::ok(exam))
}

// Route handler for POST /api/exams
pub(crate) async fn create_exam(
    State(db): State<DbClient>,
    current: CurrentUser,
    Json(payload): Json<ExamParams>,
) -> Result<(StatusCode, ApiResponse<Exam>)> {
    current.require(Permission::ManageExams)?;
    validate_payload(&payload)?;
    let exam = db.create_exam(&current.user, &payload).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(exam).with_message("Exam created"),
    ))
}

// Route handler for PUT /api/exams/:id
pub(crate) async fn update_exam(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(exam_id): Path<String>,
    Json(payload): Json<ExamParams>,
) -> Result<ApiResponse<Exam>> {
    current.require(Permission::ManageExams)?;
    validate_payload(&payload)?;
    let exam = db.update_exam(&current.user, &exam_id, &payload).await?;
    Ok(ApiResponse::ok(exam).with_message("Exam updated"))
}

// Route handler for DELETE /api/exams/:id
pub(crate) async fn delete_exam(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<ApiResponse<()>> {
    current.require(Permission::ManageExams)?;
    db.delete_exam(&current.user, &exam_id).await?;
    Ok(ApiResponse::message("Exam deleted"))
}

// Route handler for POST /api/exams/:id/publish
pub(crate) async fn publish_exam(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<ApiResponse<Exam>> {
    current.require(Permission::ManageExams)?;
    let exam = db.set_exam_published(&current.user, &exam_id, true).await?;
    Ok(ApiResponse::ok(exam).with_message("Exam published"))
}

// Route handler for POST /api/exams/:id/unpublish
pub(crate) async fn unpublish_exam(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<ApiResponse<Exam>> {
    current.require(Permission::ManageExams)?;
    let exam = db.set_exam_published(&current.user, &exam_id, false).await?;
    Ok(ApiResponse::ok(exam).with_message("Exam unpublished"))
}
