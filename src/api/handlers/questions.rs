use crate::api::extractors::CurrentUser;
use crate::db::models::{ApiResponse, Permission, QuestionParams, QuestionWithOptions};
use crate::db::DbClient;
use crate::errors::ApiError;
use crate::validation::validate_question;
use crate::Result;
use axum::extract::{Path, State};
use axum::{http::StatusCode, Json};
use validator::Validate;

fn validate_payload(payload: &QuestionParams) -> Result<()> {
    payload.validate()?;
    validate_question(payload).map_err(ApiError::Validation)
}

// Route handler for GET /api/exams/:id/questions
pub(crate) async fn list_exam_questions(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<ApiResponse<Vec<QuestionWithOptions>>> {
    current.require(Permission::ViewExamAnswers)?;
    let exam = db.get_exam(&exam_id).await?;
    Ok(ApiResponse::ok(db.get_questions_with_options(&exam.id).await?))
}

// Route handler for POST /api/exams/:id/questions
pub(crate) async fn create_question(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(exam_id): Path<String>,
    Json(payload): Json<QuestionParams>,
) -> Result<(StatusCode, ApiResponse<QuestionWithOptions>)> {
    current.require(Permission::ManageExams)?;
    validate_payload(&payload)?;
    let question = db.create_question(&current.user, &exam_id, &payload).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(question).with_message("Question created"),
    ))
}

// Route handler for PUT /api/questions/:id
pub(crate) async fn update_question(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(question_id): Path<String>,
    Json(payload): Json<QuestionParams>,
) -> Result<ApiResponse<QuestionWithOptions>> {
    current.require(Permission::ManageExams)?;
    validate_payload(&payload)?;
    let question = db
        .update_question(&current.user, &question_id, &payload)
        .await?;
    Ok(ApiResponse::ok(question).with_message("Question updated"))
}

// Route handler for DELETE /api/questions/:id
pub(crate) async fn delete_question(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(question_id): Path<String>,
) -> Result<ApiResponse<()>> {
    current.require(Permission::ManageExams)?;
    db.delete_question(&current.user, &question_id).await?;
    Ok(ApiResponse::message("Question deleted"))
}
