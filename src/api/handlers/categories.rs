use crate::api::extractors::{CurrentUser, MaybeUser};
use crate::db::models::{ApiResponse, CategoryListParams, CategoryParams, ExamCategory, Permission};
use crate::db::DbClient;
use crate::Result;
use axum::extract::{Path, Query, State};
use axum::{http::StatusCode, Json};
use validator::Validate;

// Route handler for GET /api/categories
pub(crate) async fn list_categories(
    State(db): State<DbClient>,
    MaybeUser(current): MaybeUser,
    Query(params): Query<CategoryListParams>,
) -> Result<ApiResponse<Vec<ExamCategory>>> {
    // Inactive categories are only listed for admins who ask for them
    let include_inactive = params.include_inactive
        && current
            .as_ref()
            .is_some_and(|c| c.require(Permission::ManageCategories).is_ok());
    Ok(ApiResponse::ok(db.list_categories(include_inactive).await?))
}

// Route handler for POST /api/categories
pub(crate) async fn create_category(
    State(db): State<DbClient>,
    current: CurrentUser,
    Json(payload): Json<CategoryParams>,
) -> Result<(StatusCode, ApiResponse<ExamCategory>)> {
    current.require(Permission::ManageCategories)?;
    payload.validate()?;
    let category = db.create_category(current.id(), &payload).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(category).with_message("Category created"),
    ))
}

// Route handler for PUT /api/categories/:id
pub(crate) async fn update_category(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(category_id): Path<String>,
    Json(payload): Json<CategoryParams>,
) -> Result<ApiResponse<ExamCategory>> {
    current.require(Permission::ManageCategories)?;
    payload.validate()?;
    let category = db
        .update_category(current.id(), &category_id, &payload)
        .await?;
    Ok(ApiResponse::ok(category).with_message("Category updated"))
}

// Route handler for DELETE /api/categories/:id
pub(crate) async fn delete_category(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(category_id): Path<String>,
) -> Result<ApiResponse<()>> {
    current.require(Permission::ManageCategories)?;
    db.delete_category(current.id(), &category_id).await?;
    Ok(ApiResponse::message("Category deleted"))
}
