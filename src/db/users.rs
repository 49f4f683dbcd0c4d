use super::DbClient;
use crate::db::models::{now, AuditLog, Role, User, UserFilterParams, UserSession};
use crate::errors::ApiError;
use crate::services::misc::Page;
use crate::Result;
use diesel::{
    expression_methods::{BoolExpressionMethods, ExpressionMethods},
    query_dsl::QueryDsl,
    pg::Pg,
    PgTextExpressionMethods,
};
use diesel_async::RunQueryDsl;
use tracing::{error, info};

/// DbClient helper functions for the users and user_sessions tables
impl DbClient {
    pub async fn insert_user(&self, user: &User) -> Result<User> {
        use crate::schema::users::dsl::*;

        let conn = &mut self.get_db_conn().await?;

        info!("Creating user: {}", user.email);
        diesel::insert_into(users)
            .values(user)
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => ApiError::Conflict("Email is already registered".to_string()),
                e => {
                    error!("Failed to insert user: {}", e);
                    ApiError::Diesel(e)
                }
            })
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        use crate::schema::users::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        users
            .filter(id.eq(user_id))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ApiError::not_found("User"),
                e => e.into(),
            })
    }

    pub async fn find_user_by_email(&self, user_email: &str) -> Result<Option<User>> {
        use crate::schema::users::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        match users
            .filter(email.eq(user_email.trim().to_lowercase()))
            .first::<User>(conn)
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(diesel::result::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_users(&self, filter: &UserFilterParams, page: Page) -> Result<(Vec<User>, i64)> {
        use crate::schema::users::dsl::*;

        let conn = &mut self.get_db_conn().await?;

        let total = filtered_users(filter)
            .count()
            .get_result::<i64>(conn)
            .await?;
        let rows = filtered_users(filter)
            .order(created_at.desc())
            .limit(page.per_page)
            .offset(page.offset())
            .load::<User>(conn)
            .await?;
        Ok((rows, total))
    }

    /// Writes only the self-service profile columns
    pub async fn update_profile(
        &self,
        user_id: &str,
        new_full_name: &str,
        new_phone: Option<&str>,
    ) -> Result<User> {
        use crate::schema::users;

        let conn = &mut self.get_db_conn().await?;
        diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::full_name.eq(new_full_name),
                users::phone.eq(new_phone),
                users::updated_at.eq(now()),
            ))
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ApiError::not_found("User"),
                e => e.into(),
            })
    }

    pub async fn set_password_hash(&self, user_id: &str, new_hash: &str) -> Result<()> {
        use crate::schema::users;

        let conn = &mut self.get_db_conn().await?;
        let updated = diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((users::password_hash.eq(new_hash), users::updated_at.eq(now())))
            .execute(conn)
            .await?;
        if updated == 0 {
            return Err(ApiError::not_found("User"));
        }
        Ok(())
    }

    pub async fn touch_last_login(&self, user_id: &str) -> Result<()> {
        use crate::schema::users::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        diesel::update(users.filter(id.eq(user_id)))
            .set(last_login_at.eq(Some(now())))
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn set_user_role(&self, actor_id: &str, user_id: &str, new_role: Role) -> Result<User> {
        use crate::schema::users::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        let user = diesel::update(users.filter(id.eq(user_id)))
            .set((role.eq(new_role.as_str()), updated_at.eq(now())))
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ApiError::not_found("User"),
                e => e.into(),
            })?;

        self.record_audit(AuditLog::new(
            Some(actor_id),
            "user.role_changed",
            "user",
            Some(user_id),
            Some(&serde_json::json!({ "role": new_role })),
        ))
        .await;
        Ok(user)
    }

    /// Deactivation also revokes every session of the user
    pub async fn set_user_active(&self, actor_id: &str, user_id: &str, active: bool) -> Result<User> {
        use crate::schema::users::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        let user = diesel::update(users.filter(id.eq(user_id)))
            .set((is_active.eq(active), updated_at.eq(now())))
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ApiError::not_found("User"),
                e => e.into(),
            })?;

        if !active {
            self.delete_user_sessions(user_id, None).await?;
        }

        self.record_audit(AuditLog::new(
            Some(actor_id),
            if active { "user.activated" } else { "user.deactivated" },
            "user",
            Some(user_id),
            None,
        ))
        .await;
        Ok(user)
    }

    /// Users with payments, attempts or authored exams are kept for the history
    pub async fn delete_user(&self, actor_id: &str, user_id: &str) -> Result<()> {
        use crate::schema::{exam_attempts, exams, payments, users};

        let conn = &mut self.get_db_conn().await?;

        let payment_count = payments::table
            .filter(payments::user_id.eq(user_id))
            .count()
            .get_result::<i64>(conn)
            .await?;
        let attempt_count = exam_attempts::table
            .filter(exam_attempts::user_id.eq(user_id))
            .count()
            .get_result::<i64>(conn)
            .await?;
        if payment_count > 0 || attempt_count > 0 {
            return Err(ApiError::Conflict(
                "User has payments or attempts and cannot be deleted; deactivate instead".to_string(),
            ));
        }
        let exam_count = exams::table
            .filter(exams::created_by.eq(user_id))
            .count()
            .get_result::<i64>(conn)
            .await?;
        if exam_count > 0 {
            return Err(ApiError::Conflict(
                "User still owns exams and cannot be deleted; deactivate instead".to_string(),
            ));
        }

        let deleted = diesel::delete(users::table.filter(users::id.eq(user_id)))
            .execute(conn)
            .await?;
        if deleted == 0 {
            return Err(ApiError::not_found("User"));
        }

        self.record_audit(AuditLog::new(Some(actor_id), "user.deleted", "user", Some(user_id), None))
            .await;
        Ok(())
    }

    pub async fn create_session(&self, user_id: &str, ttl_hours: i64) -> Result<UserSession> {
        use crate::schema::user_sessions;

        let conn = &mut self.get_db_conn().await?;
        let session = UserSession::new(user_id, ttl_hours);
        diesel::insert_into(user_sessions::table)
            .values(&session)
            .execute(conn)
            .await?;
        info!("Session created for user: {}", user_id);
        Ok(session)
    }

    /// Resolves a bearer token to its user. Expired sessions are not returned.
    pub async fn get_user_by_session(&self, token: &str) -> Result<Option<User>> {
        use crate::schema::{user_sessions, users};

        let conn = &mut self.get_db_conn().await?;
        match user_sessions::table
            .inner_join(users::table)
            .filter(user_sessions::id.eq(token))
            .filter(user_sessions::expires_at.gt(now()))
            .select(users::all_columns)
            .first::<User>(conn)
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(diesel::result::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_session(&self, token: &str) -> Result<()> {
        use crate::schema::user_sessions::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        diesel::delete(user_sessions.filter(id.eq(token)))
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Deletes all sessions of a user, optionally keeping one
    pub async fn delete_user_sessions(&self, owner_id: &str, keep: Option<&str>) -> Result<usize> {
        use crate::schema::user_sessions::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        let deleted = match keep {
            Some(token) => {
                diesel::delete(user_sessions.filter(user_id.eq(owner_id).and(id.ne(token))))
                    .execute(conn)
                    .await?
            }
            None => {
                diesel::delete(user_sessions.filter(user_id.eq(owner_id)))
                    .execute(conn)
                    .await?
            }
        };
        Ok(deleted)
    }

    pub async fn purge_expired_sessions(&self) -> Result<usize> {
        use crate::schema::user_sessions::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        diesel::delete(user_sessions.filter(expires_at.le(now())))
            .execute(conn)
            .await
            .map_err(Into::into)
    }
}

fn filtered_users(filter: &UserFilterParams) -> crate::schema::users::BoxedQuery<'static, Pg> {
    use crate::schema::users;

    let mut query = users::table.into_boxed();
    if let Some(r) = filter.role {
        query = query.filter(users::role.eq(r.as_str()));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{term}%");
        query = query.filter(
            users::email
                .ilike(pattern.clone())
                .or(users::full_name.ilike(pattern)),
        );
    }
    query
}
