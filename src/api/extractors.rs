use crate::db::models::{Permission, Role, User};
use crate::db::DbClient;
use crate::errors::{ApiError, ErrorMessages};
use crate::services::auth::bearer_token;
use axum::{extract::FromRequestParts, http::request::Parts};

/// The user behind the bearer token of the request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl CurrentUser {
    pub fn role(&self) -> crate::Result<Role> {
        self.user.role()
    }

    pub fn id(&self) -> &str {
        &self.user.id
    }

    /// 403 unless the user's role grants `permission`
    pub fn require(&self, permission: Permission) -> crate::Result<()> {
        if self.role()?.has_permission(permission) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(ErrorMessages::Forbidden.to_string()))
        }
    }

    /// Owners always pass, everyone else needs `permission`
    pub fn require_owner_or(&self, owner_id: &str, permission: Permission) -> crate::Result<()> {
        if self.user.id == owner_id {
            Ok(())
        } else {
            self.require(permission)
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role().map(|r| r.is_staff()).unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role(), Ok(Role::Admin))
    }
}

async fn authenticate(token: &str, db: &DbClient) -> crate::Result<CurrentUser> {
    let user = db
        .get_user_by_session(token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(ErrorMessages::InvalidToken.to_string()))?;
    if !user.is_active {
        return Err(ApiError::Unauthorized(
            ErrorMessages::InactiveAccount.to_string(),
        ));
    }
    Ok(CurrentUser {
        user,
        token: token.to_string(),
    })
}

#[axum::async_trait]
impl FromRequestParts<DbClient> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, db: &DbClient) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized(ErrorMessages::MissingToken.to_string()))?;
        authenticate(token, db).await
    }
}

/// Like [`CurrentUser`] for public routes: no header means anonymous,
/// a bad token is still rejected
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[axum::async_trait]
impl FromRequestParts<DbClient> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, db: &DbClient) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers) {
            Some(token) => Ok(MaybeUser(Some(authenticate(token, db).await?))),
            None => Ok(MaybeUser(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current(role: Role) -> CurrentUser {
        CurrentUser {
            user: User::new("x@y.io", "h".into(), "X", None, role),
            token: "t".into(),
        }
    }

    #[test]
    fn test_require_permission() {
        let student = current(Role::Student);
        assert!(student.require(Permission::TakeExams).is_ok());
        assert!(matches!(
            student.require(Permission::ManageExams),
            Err(ApiError::Forbidden(_))
        ));

        let instructor = current(Role::Instructor);
        assert!(instructor.require(Permission::ManageExams).is_ok());
        assert!(instructor.require(Permission::ViewPlatformAnalytics).is_err());
        assert!(instructor.is_staff());
        assert!(!instructor.is_admin());
    }

    #[test]
    fn test_require_owner_or() {
        let student = current(Role::Student);
        let own_id = student.user.id.clone();
        assert!(student
            .require_owner_or(&own_id, Permission::ViewAllBookings)
            .is_ok());
        assert!(student
            .require_owner_or("someone-else", Permission::ViewAllBookings)
            .is_err());
        assert!(current(Role::Admin)
            .require_owner_or("someone-else", Permission::ViewAllBookings)
            .is_ok());
    }
}
