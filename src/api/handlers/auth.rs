use crate::api::extractors::CurrentUser;
use crate::db::models::{
    ApiResponse, AuditLog, ChangePasswordParams, LoginParams, LoginResponse, RegisterParams, Role,
    UpdateProfileParams, User,
};
use crate::db::DbClient;
use crate::errors::{ApiError, ErrorMessages};
use crate::services::auth::{hash_password, verify_password};
use crate::validation::{validate_password_strength, validate_phone};
use crate::{Result, CONFIG};
use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

fn normalize_phone(phone: Option<String>) -> Result<Option<String>> {
    match phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) {
        Some(p) => {
            validate_phone(&p).map_err(ApiError::Validation)?;
            Ok(Some(p))
        }
        None => Ok(None),
    }
}

// Route handler for POST /api/auth/register
pub(crate) async fn register(
    State(db): State<DbClient>,
    Json(payload): Json<RegisterParams>,
) -> Result<(StatusCode, ApiResponse<User>)> {
    payload.validate()?;
    validate_password_strength(&payload.password).map_err(ApiError::Validation)?;
    let phone = normalize_phone(payload.phone)?;

    let hash = hash_password(&payload.password).await?;
    let user = db
        .insert_user(&User::new(
            &payload.email,
            hash,
            &payload.full_name,
            phone,
            Role::Student,
        ))
        .await?;

    db.record_audit(AuditLog::new(
        Some(&user.id),
        "user.registered",
        "user",
        Some(&user.id),
        None,
    ))
    .await;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(user).with_message("Registration successful"),
    ))
}

// Route handler for POST /api/auth/login
pub(crate) async fn login(
    State(db): State<DbClient>,
    Json(payload): Json<LoginParams>,
) -> Result<ApiResponse<LoginResponse>> {
    payload.validate()?;

    let invalid = || ApiError::Unauthorized(ErrorMessages::InvalidCredentials.to_string());
    let user = db
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&payload.password, &user.password_hash).await? {
        tracing::info!("Failed login for {}", user.email);
        return Err(invalid());
    }
    if !user.is_active {
        return Err(ApiError::Forbidden(ErrorMessages::InactiveAccount.to_string()));
    }

    let session = db.create_session(&user.id, CONFIG.session_ttl_hours).await?;
    db.touch_last_login(&user.id).await?;
    let user = db.get_user(&user.id).await?;

    Ok(ApiResponse::ok(LoginResponse {
        token: session.id,
        expires_at: session.expires_at,
        user,
    })
    .with_message("Login successful"))
}

// Route handler for POST /api/auth/logout
pub(crate) async fn logout(
    State(db): State<DbClient>,
    current: CurrentUser,
) -> Result<ApiResponse<()>> {
    db.delete_session(&current.token).await?;
    Ok(ApiResponse::message("Logged out"))
}

// Route handler for GET /api/auth/me
pub(crate) async fn get_profile(current: CurrentUser) -> Result<ApiResponse<User>> {
    Ok(ApiResponse::ok(current.user))
}

// Route handler for PUT /api/auth/me
pub(crate) async fn update_profile(
    State(db): State<DbClient>,
    current: CurrentUser,
    Json(payload): Json<UpdateProfileParams>,
) -> Result<ApiResponse<User>> {
    payload.validate()?;

    let user = current.user;
    let full_name = match payload.full_name {
        Some(name) => name.trim().to_string(),
        None => user.full_name,
    };
    let phone = if payload.phone.is_some() {
        normalize_phone(payload.phone)?
    } else {
        user.phone
    };
    let updated = db
        .update_profile(&user.id, &full_name, phone.as_deref())
        .await?;
    Ok(ApiResponse::ok(updated).with_message("Profile updated"))
}

// Route handler for PUT /api/auth/password
pub(crate) async fn change_password(
    State(db): State<DbClient>,
    current: CurrentUser,
    Json(payload): Json<ChangePasswordParams>,
) -> Result<ApiResponse<()>> {
    payload.validate()?;
    validate_password_strength(&payload.new_password).map_err(ApiError::Validation)?;

    if !verify_password(&payload.current_password, &current.user.password_hash).await? {
        return Err(ApiError::Validation(
            "current_password is incorrect".to_string(),
        ));
    }
    if payload.current_password == payload.new_password {
        return Err(ApiError::Validation(
            "new_password must differ from the current password".to_string(),
        ));
    }

    let user = current.user;
    let new_hash = hash_password(&payload.new_password).await?;
    db.set_password_hash(&user.id, &new_hash).await?;
    let revoked = db
        .delete_user_sessions(&user.id, Some(&current.token))
        .await?;

    db.record_audit(AuditLog::new(
        Some(&user.id),
        "user.password_changed",
        "user",
        Some(&user.id),
        Some(&serde_json::json!({ "revoked_sessions": revoked })),
    ))
    .await;
    Ok(ApiResponse::message("Password changed"))
}
