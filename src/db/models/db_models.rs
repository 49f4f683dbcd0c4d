use crate::schema::{
    audit_logs, certificates, exam_attempts, exam_bookings, exam_categories, exams, payments,
    question_options, question_responses, questions, user_sessions, users,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    AttemptStatus, BookingStatus, Difficulty, PaymentMethod, PaymentStatus, QuestionType, Role,
};
use crate::Result;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[derive(Clone, Debug, Serialize, Deserialize, Insertable, Identifiable, Queryable, Selectable)]
#[diesel(table_name = users, primary_key(id))]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn new(email: &str, password_hash: String, full_name: &str, phone: Option<String>, role: Role) -> Self {
        let ts = now();
        User {
            id: new_id(),
            email: email.trim().to_lowercase(),
            password_hash,
            full_name: full_name.trim().to_string(),
            phone,
            role: role.into(),
            is_active: true,
            last_login_at: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    pub fn role(&self) -> Result<Role> {
        self.role.parse()
    }
}

#[derive(Clone, Debug, Insertable, Identifiable, Queryable, Selectable)]
#[diesel(table_name = user_sessions, primary_key(id))]
pub struct UserSession {
    pub id: String,
    pub user_id: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl UserSession {
    pub fn new(user_id: &str, ttl_hours: i64) -> Self {
        let ts = now();
        UserSession {
            id: new_id(),
            user_id: user_id.to_string(),
            created_at: ts,
            expires_at: ts + chrono::Duration::hours(ttl_hours),
        }
    }

    pub fn is_expired(&self, at: NaiveDateTime) -> bool {
        self.expires_at <= at
    }
}

#[derive(
    Clone, Debug, Serialize, Deserialize, Insertable, Identifiable, Queryable, Selectable, AsChangeset,
)]
#[diesel(table_name = exam_categories, primary_key(id))]
pub struct ExamCategory {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(
    Clone, Debug, Serialize, Deserialize, Insertable, Identifiable, Queryable, Selectable, AsChangeset,
)]
#[diesel(table_name = exams, primary_key(id))]
pub struct Exam {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub total_marks: i32,
    pub passing_marks: i32,
    pub price_cents: i64,
    pub currency: String,
    pub max_attempts: i32,
    pub is_published: bool,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Exam {
    pub fn is_free(&self) -> bool {
        self.price_cents == 0
    }
}

#[derive(
    Clone, Debug, Serialize, Deserialize, Insertable, Identifiable, Queryable, Selectable, AsChangeset,
)]
#[diesel(table_name = questions, primary_key(id))]
pub struct Question {
    pub id: String,
    pub exam_id: String,
    pub question_type: String,
    pub text: String,
    pub marks: i32,
    pub difficulty: String,
    pub model_answer: Option<String>,
    pub keywords: Vec<String>,
    pub min_words: Option<i32>,
    pub position: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Question {
    pub fn kind(&self) -> Result<QuestionType> {
        self.question_type.parse()
    }

    pub fn difficulty(&self) -> Result<Difficulty> {
        self.difficulty.parse()
    }
}

#[derive(
    Clone, Debug, Serialize, Deserialize, Insertable, Identifiable, Queryable, Selectable, AsChangeset,
)]
#[diesel(table_name = question_options, primary_key(id))]
pub struct QuestionOption {
    pub id: String,
    pub question_id: String,
    pub text: String,
    pub is_correct: bool,
    pub position: i32,
}

#[derive(
    Clone, Debug, Serialize, Deserialize, Insertable, Identifiable, Queryable, Selectable, AsChangeset,
)]
#[diesel(table_name = exam_bookings, primary_key(id))]
pub struct ExamBooking {
    pub id: String,
    pub user_id: String,
    pub exam_id: String,
    pub scheduled_at: NaiveDateTime,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ExamBooking {
    pub fn status(&self) -> Result<BookingStatus> {
        self.status.parse()
    }
}

#[derive(
    Clone, Debug, Serialize, Deserialize, Insertable, Identifiable, Queryable, Selectable, AsChangeset,
)]
#[diesel(table_name = payments, primary_key(id))]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub transaction_ref: Option<String>,
    pub paid_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Payment {
    pub fn status(&self) -> Result<PaymentStatus> {
        self.status.parse()
    }

    pub fn method(&self) -> Result<PaymentMethod> {
        self.method.parse()
    }
}

#[derive(
    Clone, Debug, Serialize, Deserialize, Insertable, Identifiable, Queryable, Selectable, AsChangeset,
)]
#[diesel(table_name = exam_attempts, primary_key(id))]
pub struct ExamAttempt {
    pub id: String,
    pub user_id: String,
    pub exam_id: String,
    pub booking_id: String,
    pub status: String,
    pub started_at: NaiveDateTime,
    pub submitted_at: Option<NaiveDateTime>,
    pub score: Option<f64>,
    pub percentage: Option<f64>,
    pub passed: Option<bool>,
}

impl ExamAttempt {
    pub fn status(&self) -> Result<AttemptStatus> {
        self.status.parse()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Insertable, Identifiable, Queryable, Selectable)]
#[diesel(table_name = question_responses, primary_key(id))]
pub struct QuestionResponse {
    pub id: String,
    pub attempt_id: String,
    pub question_id: String,
    pub selected_option_ids: Vec<String>,
    pub answer_text: Option<String>,
    pub is_correct: Option<bool>,
    pub marks_awarded: f64,
    pub feedback: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize, Insertable, Identifiable, Queryable, Selectable)]
#[diesel(table_name = certificates, primary_key(id))]
pub struct Certificate {
    pub id: String,
    pub user_id: String,
    pub exam_id: String,
    pub attempt_id: String,
    pub certificate_number: String,
    pub percentage: f64,
    pub issued_at: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize, Insertable, Identifiable, Queryable, Selectable)]
#[diesel(table_name = audit_logs, primary_key(id))]
pub struct AuditLog {
    pub id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    pub created_at: NaiveDateTime,
}

impl AuditLog {
    pub fn new(
        user_id: Option<&str>,
        action: &str,
        entity_type: &str,
        entity_id: Option<&str>,
        details: Option<&serde_json::Value>,
    ) -> Self {
        AuditLog {
            id: new_id(),
            user_id: user_id.map(ToOwned::to_owned),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.map(ToOwned::to_owned),
            details: details.map(|d| d.to_string()),
            created_at: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_normalizes_email() {
        let user = User::new("  Alice@Example.COM ", "hash".into(), " Alice ", None, Role::Student);
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.full_name, "Alice");
        assert_eq!(user.role().unwrap(), Role::Student);
        assert!(user.is_active);
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let user = User::new("a@b.io", "secret-hash".into(), "A", None, Role::Admin);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn test_session_expiry() {
        let session = UserSession::new("user-1", 24);
        assert!(!session.is_expired(session.created_at));
        assert!(session.is_expired(session.created_at + chrono::Duration::hours(24)));
    }
}
