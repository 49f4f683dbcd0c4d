use super::DbClient;
use crate::db::models::{new_id, now, AuditLog, CategoryParams, ExamCategory};
use crate::errors::ApiError;
use crate::Result;
use diesel::{expression_methods::ExpressionMethods, query_dsl::QueryDsl};
use diesel_async::RunQueryDsl;
use tracing::info;

fn map_category_error(e: diesel::result::Error) -> ApiError {
    match e {
        diesel::result::Error::NotFound => ApiError::not_found("Category"),
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => ApiError::Conflict("A category with this name already exists".to_string()),
        e => e.into(),
    }
}

/// DbClient helper functions for the exam_categories table
impl DbClient {
    pub async fn list_categories(&self, include_inactive: bool) -> Result<Vec<ExamCategory>> {
        use crate::schema::exam_categories::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        let mut query = exam_categories.into_boxed();
        if !include_inactive {
            query = query.filter(is_active.eq(true));
        }
        query
            .order(name.asc())
            .load::<ExamCategory>(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn get_category(&self, category_id: &str) -> Result<ExamCategory> {
        use crate::schema::exam_categories::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        exam_categories
            .filter(id.eq(category_id))
            .first::<ExamCategory>(conn)
            .await
            .map_err(map_category_error)
    }

    pub async fn create_category(
        &self,
        actor_id: &str,
        params: &CategoryParams,
    ) -> Result<ExamCategory> {
        use crate::schema::exam_categories::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        let ts = now();
        let category = ExamCategory {
            id: new_id(),
            name: params.name.trim().to_string(),
            description: params.description.clone(),
            is_active: params.is_active.unwrap_or(true),
            created_at: ts,
            updated_at: ts,
        };

        let created = diesel::insert_into(exam_categories)
            .values(&category)
            .get_result::<ExamCategory>(conn)
            .await
            .map_err(map_category_error)?;
        info!("Category created: {}", created.name);

        self.record_audit(AuditLog::new(
            Some(actor_id),
            "category.created",
            "category",
            Some(&created.id),
            Some(&serde_json::json!({ "name": created.name })),
        ))
        .await;
        Ok(created)
    }

    pub async fn update_category(
        &self,
        actor_id: &str,
        category_id: &str,
        params: &CategoryParams,
    ) -> Result<ExamCategory> {
        use crate::schema::exam_categories::dsl::*;

        let mut category = self.get_category(category_id).await?;
        category.name = params.name.trim().to_string();
        category.description = params.description.clone();
        if let Some(active) = params.is_active {
            category.is_active = active;
        }
        category.updated_at = now();

        let conn = &mut self.get_db_conn().await?;
        let updated = diesel::update(exam_categories.filter(id.eq(category_id)))
            .set(&category)
            .get_result::<ExamCategory>(conn)
            .await
            .map_err(map_category_error)?;

        self.record_audit(AuditLog::new(
            Some(actor_id),
            "category.updated",
            "category",
            Some(category_id),
            Some(&serde_json::json!({
                "name": updated.name,
                "is_active": updated.is_active,
            })),
        ))
        .await;
        Ok(updated)
    }

    /// Categories that still hold exams cannot be removed
    pub async fn delete_category(&self, actor_id: &str, category_id: &str) -> Result<()> {
        use crate::schema::{exam_categories, exams};

        let conn = &mut self.get_db_conn().await?;
        let exam_count = exams::table
            .filter(exams::category_id.eq(category_id))
            .count()
            .get_result::<i64>(conn)
            .await?;
        if exam_count > 0 {
            return Err(ApiError::Conflict(format!(
                "Category still has {exam_count} exam(s)"
            )));
        }

        let deleted =
            diesel::delete(exam_categories::table.filter(exam_categories::id.eq(category_id)))
                .execute(conn)
                .await?;
        if deleted == 0 {
            return Err(ApiError::not_found("Category"));
        }

        self.record_audit(AuditLog::new(
            Some(actor_id),
            "category.deleted",
            "category",
            Some(category_id),
            None,
        ))
        .await;
        Ok(())
    }
}
