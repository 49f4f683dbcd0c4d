use super::DbClient;
use crate::db::models::{
    new_id, now, AuditLog, Difficulty, Exam, Question, QuestionOption, QuestionParams,
    QuestionWithOptions, User,
};
use crate::db::exams::ensure_exam_owner;
use crate::errors::ApiError;
use crate::Result;
use diesel::{expression_methods::ExpressionMethods, query_dsl::QueryDsl};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use std::collections::HashMap;

/// Builds the question row and its option rows from a request payload
fn build_question(
    exam_id: &str,
    params: &QuestionParams,
    position: i32,
) -> (Question, Vec<QuestionOption>) {
    let ts = now();
    let question = Question {
        id: new_id(),
        exam_id: exam_id.to_string(),
        question_type: params.question_type.into(),
        text: params.text.trim().to_string(),
        marks: params.marks,
        difficulty: params.difficulty.unwrap_or(Difficulty::Medium).into(),
        model_answer: params.model_answer.clone(),
        keywords: params
            .keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
        min_words: params.min_words,
        position,
        created_at: ts,
        updated_at: ts,
    };
    let options = build_options(&question.id, params);
    (question, options)
}

fn build_options(question_id: &str, params: &QuestionParams) -> Vec<QuestionOption> {
    params
        .options
        .iter()
        .enumerate()
        .map(|(i, o)| QuestionOption {
            id: new_id(),
            question_id: question_id.to_string(),
            text: o.text.trim().to_string(),
            is_correct: o.is_correct,
            position: i as i32 + 1,
        })
        .collect()
}

fn ensure_editable(exam: &Exam) -> Result<()> {
    if exam.is_published {
        return Err(ApiError::Conflict(
            "Questions of a published exam cannot be changed; unpublish it first".to_string(),
        ));
    }
    Ok(())
}

const ANSWERED_QUESTION_CONFLICT: &str =
    "Question already has graded responses and cannot be changed";

/// Past responses were graded against the current content, so it is frozen
async fn ensure_unanswered(conn: &mut AsyncPgConnection, question_key: &str) -> Result<()> {
    use crate::schema::question_responses;

    let answered = question_responses::table
        .filter(question_responses::question_id.eq(question_key))
        .count()
        .get_result::<i64>(conn)
        .await?;
    if answered > 0 {
        return Err(ApiError::Conflict(ANSWERED_QUESTION_CONFLICT.to_string()));
    }
    Ok(())
}

/// DbClient helper functions for the questions and question_options tables
impl DbClient {
    /// Questions of an exam in position order, each with its options
    pub async fn get_questions_with_options(&self, exam_id: &str) -> Result<Vec<QuestionWithOptions>> {
        use crate::schema::{question_options, questions};

        let conn = &mut self.get_db_conn().await?;
        let rows = questions::table
            .filter(questions::exam_id.eq(exam_id))
            .order((questions::position.asc(), questions::created_at.asc()))
            .load::<Question>(conn)
            .await?;

        let ids: Vec<String> = rows.iter().map(|q| q.id.clone()).collect();
        let options = question_options::table
            .filter(question_options::question_id.eq_any(ids))
            .order(question_options::position.asc())
            .load::<QuestionOption>(conn)
            .await?;

        let mut grouped: HashMap<String, Vec<QuestionOption>> = HashMap::new();
        for option in options {
            grouped
                .entry(option.question_id.clone())
                .or_default()
                .push(option);
        }

        Ok(rows
            .into_iter()
            .map(|question| {
                let options = grouped.remove(&question.id).unwrap_or_default();
                QuestionWithOptions { question, options }
            })
            .collect())
    }

    pub async fn get_question(&self, question_id: &str) -> Result<Question> {
        use crate::schema::questions::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        questions
            .filter(id.eq(question_id))
            .first::<Question>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ApiError::not_found("Question"),
                e => e.into(),
            })
    }

    pub async fn create_question(
        &self,
        actor: &User,
        exam_id: &str,
        params: &QuestionParams,
    ) -> Result<QuestionWithOptions> {
        use crate::schema::{question_options, questions};

        let exam = self.get_exam(exam_id).await?;
        ensure_exam_owner(&exam, actor)?;
        ensure_editable(&exam)?;

        let conn = &mut self.get_db_conn().await?;
        let position = match params.position {
            Some(p) => p,
            None => {
                questions::table
                    .filter(questions::exam_id.eq(exam_id))
                    .select(diesel::dsl::max(questions::position))
                    .first::<Option<i32>>(conn)
                    .await?
                    .unwrap_or(0)
                    + 1
            }
        };
        let (question, options) = build_question(exam_id, params, position);

        let created = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let question = diesel::insert_into(questions::table)
                        .values(&question)
                        .get_result::<Question>(conn)
                        .await?;
                    if !options.is_empty() {
                        diesel::insert_into(question_options::table)
                            .values(&options)
                            .execute(conn)
                            .await?;
                    }
                    Ok(QuestionWithOptions { question, options })
                }
                .scope_boxed()
            })
            .await?;

        self.record_audit(AuditLog::new(
            Some(&actor.id),
            "question.created",
            "question",
            Some(&created.question.id),
            Some(&serde_json::json!({ "exam_id": exam_id })),
        ))
        .await;
        Ok(created)
    }

    /// Replaces the question content and its whole option list
    pub async fn update_question(
        &self,
        actor: &User,
        question_id: &str,
        params: &QuestionParams,
    ) -> Result<QuestionWithOptions> {
        use crate::schema::{question_options, questions};

        let existing = self.get_question(question_id).await?;
        let exam = self.get_exam(&existing.exam_id).await?;
        ensure_exam_owner(&exam, actor)?;
        ensure_editable(&exam)?;

        let (mut question, _) =
            build_question(&exam.id, params, params.position.unwrap_or(existing.position));
        question.id = existing.id.clone();
        question.created_at = existing.created_at;
        let options = build_options(&question.id, params);

        let conn = &mut self.get_db_conn().await?;
        let updated = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    ensure_unanswered(conn, &question.id).await?;
                    let question = diesel::update(questions::table.filter(questions::id.eq(&question.id)))
                        .set(&question)
                        .get_result::<Question>(conn)
                        .await?;
                    diesel::delete(
                        question_options::table.filter(question_options::question_id.eq(&question.id)),
                    )
                    .execute(conn)
                    .await?;
                    if !options.is_empty() {
                        diesel::insert_into(question_options::table)
                            .values(&options)
                            .execute(conn)
                            .await?;
                    }
                    Ok(QuestionWithOptions { question, options })
                }
                .scope_boxed()
            })
            .await?;

        self.record_audit(AuditLog::new(
            Some(&actor.id),
            "question.updated",
            "question",
            Some(question_id),
            None,
        ))
        .await;
        Ok(updated)
    }

    pub async fn delete_question(&self, actor: &User, question_id: &str) -> Result<()> {
        use crate::schema::questions;

        let existing = self.get_question(question_id).await?;
        let exam = self.get_exam(&existing.exam_id).await?;
        ensure_exam_owner(&exam, actor)?;
        ensure_editable(&exam)?;

        let conn = &mut self.get_db_conn().await?;
        ensure_unanswered(conn, question_id).await?;
        diesel::delete(questions::table.filter(questions::id.eq(question_id)))
            .execute(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                    _,
                ) => ApiError::Conflict(ANSWERED_QUESTION_CONFLICT.to_string()),
                e => e.into(),
            })?;

        self.record_audit(AuditLog::new(
            Some(&actor.id),
            "question.deleted",
            "question",
            Some(question_id),
            Some(&serde_json::json!({ "exam_id": exam.id })),
        ))
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{OptionParams, QuestionType};

    #[test]
    fn test_build_question_rows() {
        let params = QuestionParams {
            question_type: QuestionType::SingleChoice,
            text: "  Which keyword moves a value?  ".into(),
            marks: 2,
            difficulty: None,
            model_answer: None,
            keywords: vec![" move ".into(), "".into()],
            min_words: None,
            position: None,
            options: vec![
                OptionParams { text: "move".into(), is_correct: true },
                OptionParams { text: "copy".into(), is_correct: false },
            ],
        };

        let (question, options) = build_question("exam-1", &params, 3);
        assert_eq!(question.text, "Which keyword moves a value?");
        assert_eq!(question.difficulty, "medium");
        assert_eq!(question.question_type, "single_choice");
        assert_eq!(question.keywords, vec!["move".to_string()]);
        assert_eq!(question.position, 3);

        assert_eq!(options.len(), 2);
        assert!(options.iter().all(|o| o.question_id == question.id));
        assert_eq!(options[0].position, 1);
        assert!(options[0].is_correct);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_answered_question_is_frozen() {
        use crate::db::models::Role;
        use crate::db::test_support::*;

        let client = test_client();
        let admin = create_user(&client, Role::Admin).await;
        let student = create_user(&client, Role::Student).await;
        let fixture = published_exam(&client, &admin, 0, 1).await;
        let booking = book(&client, &student, &fixture.exam).await;
        open_booking_slot(&client, &booking.id).await;
        let started = client.start_attempt(&student, &booking.id).await.unwrap();
        client
            .submit_attempt(&student, &started.attempt.id, &fixture.answer(fixture.correct_option()))
            .await
            .unwrap();

        client.set_exam_published(&admin, &fixture.exam.id, false).await.unwrap();
        let answered = &fixture.question.question.id;

        let params = QuestionParams {
            question_type: QuestionType::TrueFalse,
            text: "Borrowing moves ownership".into(),
            marks: 4,
            difficulty: None,
            model_answer: None,
            keywords: vec![],
            min_words: None,
            position: None,
            options: vec![
                OptionParams { text: "true".into(), is_correct: false },
                OptionParams { text: "false".into(), is_correct: true },
            ],
        };
        let updated = client.update_question(&admin, answered, &params).await;
        assert!(matches!(updated, Err(ApiError::Conflict(_))));
        let deleted = client.delete_question(&admin, answered).await;
        assert!(matches!(deleted, Err(ApiError::Conflict(_))));
        assert!(client.get_question(answered).await.is_ok());

        // Questions nobody answered yet stay editable
        let fresh = client.create_question(&admin, &fixture.exam.id, &params).await.unwrap();
        client.delete_question(&admin, &fresh.question.id).await.unwrap();
    }
}
