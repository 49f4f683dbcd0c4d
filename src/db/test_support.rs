//! Fixtures for the database-backed tests. They need `TEST_DATABASE_URL` and
//! `TEST_REDIS_URL` pointing at a migrated database.

use super::DbClient;
use crate::db::models::{
    now, AnswerParams, CategoryParams, CreateBookingParams, Exam, ExamBooking, ExamParams,
    OptionParams, QuestionParams, QuestionType, QuestionWithOptions, Role, SubmitAttemptParams,
    User,
};
use crate::services::auth::hash_password;
use chrono::Duration;
use diesel::{expression_methods::ExpressionMethods, query_dsl::QueryDsl};
use diesel_async::RunQueryDsl;

pub fn test_client() -> DbClient {
    dotenv::dotenv().ok();
    let db_url = std::env::var("TEST_DATABASE_URL").unwrap();
    let redis_url = std::env::var("TEST_REDIS_URL").unwrap();
    DbClient::new(&db_url, &redis_url)
}

pub async fn create_user(client: &DbClient, role: Role) -> User {
    let email = format!("{}@test.local", uuid::Uuid::new_v4());
    let hash = hash_password("password1").await.unwrap();
    client
        .insert_user(&User::new(&email, hash, "Test User", None, role))
        .await
        .unwrap()
}

/// A published exam with one single-choice question worth all of its marks
pub struct PublishedExam {
    pub exam: Exam,
    pub question: QuestionWithOptions,
}

impl PublishedExam {
    pub fn correct_option(&self) -> String {
        self.question
            .options
            .iter()
            .find(|o| o.is_correct)
            .map(|o| o.id.clone())
            .unwrap()
    }

    pub fn wrong_option(&self) -> String {
        self.question
            .options
            .iter()
            .find(|o| !o.is_correct)
            .map(|o| o.id.clone())
            .unwrap()
    }

    /// Submission choosing `option_id` for the only question
    pub fn answer(&self, option_id: String) -> SubmitAttemptParams {
        let mut answers = std::collections::HashMap::new();
        answers.insert(
            self.question.question.id.clone(),
            AnswerParams {
                selected_option_ids: vec![option_id],
                answer_text: None,
            },
        );
        SubmitAttemptParams { answers }
    }
}

pub async fn published_exam(
    client: &DbClient,
    owner: &User,
    price_cents: i64,
    max_attempts: i32,
) -> PublishedExam {
    let category = client
        .create_category(
            &owner.id,
            &CategoryParams {
                name: format!("Category {}", uuid::Uuid::new_v4()),
                description: None,
                is_active: None,
            },
        )
        .await
        .unwrap();
    let exam = client
        .create_exam(
            owner,
            &ExamParams {
                category_id: category.id,
                title: "Ownership basics".into(),
                description: None,
                duration_minutes: 30,
                total_marks: 4,
                passing_marks: 2,
                price_cents,
                currency: Some("USD".into()),
                max_attempts,
            },
        )
        .await
        .unwrap();
    let question = client
        .create_question(
            owner,
            &exam.id,
            &QuestionParams {
                question_type: QuestionType::SingleChoice,
                text: "Which keyword transfers ownership?".into(),
                marks: 4,
                difficulty: None,
                model_answer: None,
                keywords: vec![],
                min_words: None,
                position: None,
                options: vec![
                    OptionParams { text: "move".into(), is_correct: true },
                    OptionParams { text: "copy".into(), is_correct: false },
                ],
            },
        )
        .await
        .unwrap();
    let exam = client.set_exam_published(owner, &exam.id, true).await.unwrap();
    PublishedExam { exam, question }
}

pub async fn book(client: &DbClient, user: &User, exam: &Exam) -> ExamBooking {
    client
        .create_booking(
            user,
            &CreateBookingParams {
                exam_id: exam.id.clone(),
                scheduled_at: now() + Duration::days(1),
            },
        )
        .await
        .unwrap()
}

/// Moves the booking slot into the past so an attempt can start
pub async fn open_booking_slot(client: &DbClient, booking_id: &str) {
    use crate::schema::exam_bookings::dsl::*;

    let conn = &mut client.get_db_conn().await.unwrap();
    diesel::update(exam_bookings.filter(id.eq(booking_id)))
        .set(scheduled_at.eq(now() - Duration::minutes(1)))
        .execute(conn)
        .await
        .unwrap();
}

/// Pretends the attempt started `minutes` ago
pub async fn backdate_attempt(client: &DbClient, attempt_id: &str, minutes: i64) {
    use crate::schema::exam_attempts::dsl::*;

    let conn = &mut client.get_db_conn().await.unwrap();
    diesel::update(exam_attempts.filter(id.eq(attempt_id)))
        .set(started_at.eq(now() - Duration::minutes(minutes)))
        .execute(conn)
        .await
        .unwrap();
}
