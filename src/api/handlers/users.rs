use crate::api::extractors::CurrentUser;
use crate::db::models::{
    ApiResponse, PageParams, Permission, Role, UpdateRoleParams, UpdateUserStatusParams, User,
    UserFilterParams,
};
use crate::db::DbClient;
use crate::errors::ApiError;
use crate::services::misc::Page;
use crate::Result;
use axum::extract::{Path, Query, State};
use axum::Json;

/// Admins cannot lock themselves out
fn ensure_not_self(current: &CurrentUser, user_id: &str, action: &str) -> Result<()> {
    if current.id() == user_id {
        return Err(ApiError::Validation(format!("You cannot {action} your own account")));
    }
    Ok(())
}

// Route handler for GET /api/admin/users
pub(crate) async fn list_users(
    State(db): State<DbClient>,
    current: CurrentUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<UserFilterParams>,
) -> Result<ApiResponse<Vec<User>>> {
    current.require(Permission::ManageUsers)?;
    let page = Page::from(&page);
    let (users, total) = db.list_users(&filter, page).await?;
    Ok(ApiResponse::page(users, page.meta(total)))
}

// Route handler for GET /api/admin/users/:id
pub(crate) async fn get_user(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<User>> {
    current.require(Permission::ManageUsers)?;
    Ok(ApiResponse::ok(db.get_user(&user_id).await?))
}

// Route handler for PUT /api/admin/users/:id/role
pub(crate) async fn update_user_role(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateRoleParams>,
) -> Result<ApiResponse<User>> {
    current.require(Permission::ManageUsers)?;
    if payload.role != Role::Admin {
        ensure_not_self(&current, &user_id, "demote")?;
    }
    let user = db.set_user_role(current.id(), &user_id, payload.role).await?;
    Ok(ApiResponse::ok(user).with_message("Role updated"))
}

// Route handler for PUT /api/admin/users/:id/status
pub(crate) async fn update_user_status(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateUserStatusParams>,
) -> Result<ApiResponse<User>> {
    current.require(Permission::ManageUsers)?;
    if !payload.is_active {
        ensure_not_self(&current, &user_id, "deactivate")?;
    }
    let user = db
        .set_user_active(current.id(), &user_id, payload.is_active)
        .await?;
    let message = if user.is_active {
        "User activated"
    } else {
        "User deactivated"
    };
    Ok(ApiResponse::ok(user).with_message(message))
}

// Route handler for DELETE /api/admin/users/:id
pub(crate) async fn delete_user(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<()>> {
    current.require(Permission::ManageUsers)?;
    ensure_not_self(&current, &user_id, "delete")?;
    db.delete_user(current.id(), &user_id).await?;
    Ok(ApiResponse::message("User deleted"))
}
