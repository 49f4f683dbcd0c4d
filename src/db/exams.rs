use super::DbClient;
use crate::db::models::{new_id, now, AuditLog, Exam, ExamFilterParams, ExamParams, Role, User};
use crate::errors::{ApiError, ErrorMessages};
use crate::services::misc::Page;
use crate::Result;
use diesel::{
    expression_methods::ExpressionMethods, pg::Pg, query_dsl::QueryDsl, PgTextExpressionMethods,
};
use diesel_async::RunQueryDsl;
use tracing::info;

const DEFAULT_CURRENCY: &str = "USD";

/// Admins may modify any exam, instructors only the exams they created
pub fn ensure_exam_owner(exam: &Exam, user: &User) -> Result<()> {
    match user.role()? {
        Role::Admin => Ok(()),
        Role::Instructor if exam.created_by == user.id => Ok(()),
        _ => Err(ApiError::Forbidden(ErrorMessages::Forbidden.to_string())),
    }
}

/// An exam can be published once its questions add up to its total marks
pub fn check_publishable(total_marks: i32, question_count: i64, marks_sum: i64) -> std::result::Result<(), String> {
    if question_count == 0 {
        return Err("An exam needs at least one question before publishing".to_string());
    }
    if marks_sum != total_marks as i64 {
        return Err(format!(
            "Question marks add up to {marks_sum} but the exam total is {total_marks}"
        ));
    }
    Ok(())
}

/// DbClient helper functions for the exams table
impl DbClient {
    pub async fn list_exams(
        &self,
        filter: &ExamFilterParams,
        include_unpublished: bool,
        page: Page,
    ) -> Result<(Vec<Exam>, i64)> {
        use crate::schema::exams::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        let total = filtered_exams(filter, include_unpublished)
            .count()
            .get_result::<i64>(conn)
            .await?;
        let rows = filtered_exams(filter, include_unpublished)
            .order(created_at.desc())
            .limit(page.per_page)
            .offset(page.offset())
            .load::<Exam>(conn)
            .await?;
        Ok((rows, total))
    }

    pub async fn get_exam(&self, exam_id: &str) -> Result<Exam> {
        use crate::schema::exams::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        exams
            .filter(id.eq(exam_id))
            .first::<Exam>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ApiError::not_found("Exam"),
                e => e.into(),
            })
    }

    /// Referenced category must exist and be active
    async fn ensure_active_category(&self, category_id: &str) -> Result<()> {
        match self.get_category(category_id).await {
            Ok(category) if category.is_active => Ok(()),
            Ok(_) => Err(ApiError::Validation("Category is inactive".to_string())),
            Err(ApiError::NotFound(_)) => {
                Err(ApiError::Validation("Category does not exist".to_string()))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create_exam(&self, actor: &User, params: &ExamParams) -> Result<Exam> {
        use crate::schema::exams::dsl::*;

        self.ensure_active_category(&params.category_id).await?;

        let ts = now();
        let exam = Exam {
            id: new_id(),
            category_id: params.category_id.clone(),
            title: params.title.trim().to_string(),
            description: params.description.clone(),
            duration_minutes: params.duration_minutes,
            total_marks: params.total_marks,
            passing_marks: params.passing_marks,
            price_cents: params.price_cents,
            currency: params
                .currency
                .clone()
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            max_attempts: params.max_attempts,
            is_published: false,
            created_by: actor.id.clone(),
            created_at: ts,
            updated_at: ts,
        };

        let conn = &mut self.get_db_conn().await?;
        let created = diesel::insert_into(exams)
            .values(&exam)
            .get_result::<Exam>(conn)
            .await?;
        info!("Exam created: {} ({})", created.title, created.id);

        self.record_audit(AuditLog::new(
            Some(&actor.id),
            "exam.created",
            "exam",
            Some(&created.id),
            Some(&serde_json::json!({ "title": created.title })),
        ))
        .await;
        Ok(created)
    }

    pub async fn update_exam(&self, actor: &User, exam_id: &str, params: &ExamParams) -> Result<Exam> {
        use crate::schema::exams::dsl::*;

        let mut exam = self.get_exam(exam_id).await?;
        ensure_exam_owner(&exam, actor)?;

        if exam.category_id != params.category_id {
            self.ensure_active_category(&params.category_id).await?;
        }
        if exam.is_published && exam.total_marks != params.total_marks {
            return Err(ApiError::Conflict(
                "Unpublish the exam before changing total_marks".to_string(),
            ));
        }

        exam.category_id = params.category_id.clone();
        exam.title = params.title.trim().to_string();
        exam.description = params.description.clone();
        exam.duration_minutes = params.duration_minutes;
        exam.total_marks = params.total_marks;
        exam.passing_marks = params.passing_marks;
        exam.price_cents = params.price_cents;
        if let Some(code) = &params.currency {
            exam.currency = code.clone();
        }
        exam.max_attempts = params.max_attempts;
        exam.updated_at = now();

        let conn = &mut self.get_db_conn().await?;
        let updated = diesel::update(exams.filter(id.eq(exam_id)))
            .set(&exam)
            .get_result::<Exam>(conn)
            .await?;

        self.record_audit(AuditLog::new(
            Some(&actor.id),
            "exam.updated",
            "exam",
            Some(exam_id),
            None,
        ))
        .await;
        Ok(updated)
    }

    /// Exams that were ever booked stay for the booking history
    pub async fn delete_exam(&self, actor: &User, exam_id: &str) -> Result<()> {
        use crate::schema::{exam_bookings, exams};

        let exam = self.get_exam(exam_id).await?;
        ensure_exam_owner(&exam, actor)?;

        let conn = &mut self.get_db_conn().await?;
        let booking_count = exam_bookings::table
            .filter(exam_bookings::exam_id.eq(exam_id))
            .count()
            .get_result::<i64>(conn)
            .await?;
        if booking_count > 0 {
            return Err(ApiError::Conflict(
                "Exam has bookings and cannot be deleted; unpublish it instead".to_string(),
            ));
        }

        diesel::delete(exams::table.filter(exams::id.eq(exam_id)))
            .execute(conn)
            .await?;

        self.record_audit(AuditLog::new(
            Some(&actor.id),
            "exam.deleted",
            "exam",
            Some(exam_id),
            Some(&serde_json::json!({ "title": exam.title })),
        ))
        .await;
        Ok(())
    }

    pub async fn set_exam_published(&self, actor: &User, exam_id: &str, publish: bool) -> Result<Exam> {
        use crate::schema::{exams, questions};

        let exam = self.get_exam(exam_id).await?;
        ensure_exam_owner(&exam, actor)?;

        let conn = &mut self.get_db_conn().await?;
        if publish {
            let question_count = questions::table
                .filter(questions::exam_id.eq(exam_id))
                .count()
                .get_result::<i64>(conn)
                .await?;
            let marks_sum = questions::table
                .filter(questions::exam_id.eq(exam_id))
                .select(diesel::dsl::sum(questions::marks))
                .first::<Option<i64>>(conn)
                .await?
                .unwrap_or(0);
            check_publishable(exam.total_marks, question_count, marks_sum)
                .map_err(ApiError::Conflict)?;
        }

        let updated = diesel::update(exams::table.filter(exams::id.eq(exam_id)))
            .set((exams::is_published.eq(publish), exams::updated_at.eq(now())))
            .get_result::<Exam>(conn)
            .await?;

        self.record_audit(AuditLog::new(
            Some(&actor.id),
            if publish { "exam.published" } else { "exam.unpublished" },
            "exam",
            Some(exam_id),
            None,
        ))
        .await;
        Ok(updated)
    }
}

fn filtered_exams(
    filter: &ExamFilterParams,
    include_unpublished: bool,
) -> crate::schema::exams::BoxedQuery<'static, Pg> {
    use crate::schema::exams;

    let mut query = exams::table.into_boxed();
    if !include_unpublished {
        query = query.filter(exams::is_published.eq(true));
    }
    if let Some(category) = filter.category_id.as_deref().filter(|s| !s.is_empty()) {
        query = query.filter(exams::category_id.eq(category.to_string()));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query = query.filter(exams::title.ilike(format!("%{term}%")));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exam_by(creator: &str) -> Exam {
        let ts = now();
        Exam {
            id: new_id(),
            category_id: "cat".into(),
            title: "Rust basics".into(),
            description: None,
            duration_minutes: 30,
            total_marks: 10,
            passing_marks: 5,
            price_cents: 0,
            currency: "USD".into(),
            max_attempts: 1,
            is_published: false,
            created_by: creator.into(),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_exam_ownership() {
        let owner = User::new("owner@x.io", "h".into(), "Owner", None, Role::Instructor);
        let other = User::new("other@x.io", "h".into(), "Other", None, Role::Instructor);
        let admin = User::new("admin@x.io", "h".into(), "Admin", None, Role::Admin);
        let student = User::new("student@x.io", "h".into(), "Student", None, Role::Student);
        let exam = exam_by(&owner.id);

        assert!(ensure_exam_owner(&exam, &owner).is_ok());
        assert!(ensure_exam_owner(&exam, &admin).is_ok());
        assert!(matches!(ensure_exam_owner(&exam, &other), Err(ApiError::Forbidden(_))));
        assert!(matches!(ensure_exam_owner(&exam, &student), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn test_check_publishable() {
        assert_eq!(check_publishable(10, 3, 10), Ok(()));
        assert!(check_publishable(10, 0, 0).is_err());
        assert_eq!(
            check_publishable(10, 2, 8),
            Err("Question marks add up to 8 but the exam total is 10".to_string())
        );
    }
}
