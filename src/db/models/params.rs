use super::{Difficulty, PaymentMethod, QuestionType, Role};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Registration payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterParams {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "password must be 8 to 128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "full_name must be 1 to 100 characters"))]
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginParams {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProfileParams {
    #[validate(length(min = 1, max = 100, message = "full_name must be 1 to 100 characters"))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordParams {
    #[validate(length(min = 1, message = "current_password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128, message = "new_password must be 8 to 128 characters"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoleParams {
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserStatusParams {
    pub is_active: bool,
}

/// Query string shared by every paginated listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Filters are read from the same query string as [`PageParams`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilterParams {
    pub role: Option<Role>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogFilterParams {
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryListParams {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CategoryParams {
    #[validate(length(min = 2, max = 100, message = "name must be 2 to 100 characters"))]
    pub name: String,
    #[validate(length(max = 1000, message = "description must be at most 1000 characters"))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamFilterParams {
    pub category_id: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExamParams {
    pub category_id: String,
    #[validate(length(min = 3, max = 200, message = "title must be 3 to 200 characters"))]
    pub title: String,
    #[validate(length(max = 5000, message = "description must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 600, message = "duration_minutes must be between 1 and 600"))]
    pub duration_minutes: i32,
    #[validate(range(min = 1, message = "total_marks must be at least 1"))]
    pub total_marks: i32,
    #[validate(range(min = 0, message = "passing_marks must not be negative"))]
    pub passing_marks: i32,
    #[validate(range(min = 0, message = "price_cents must not be negative"))]
    #[serde(default)]
    pub price_cents: i64,
    pub currency: Option<String>,
    #[validate(range(min = 1, max = 10, message = "max_attempts must be between 1 and 10"))]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

fn default_max_attempts() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OptionParams {
    #[validate(length(min = 1, max = 1000, message = "option text must be 1 to 1000 characters"))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionParams {
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 5000, message = "text must be 1 to 5000 characters"))]
    pub text: String,
    #[validate(range(min = 1, max = 100, message = "marks must be between 1 and 100"))]
    pub marks: i32,
    pub difficulty: Option<Difficulty>,
    pub model_answer: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[validate(range(min = 1, max = 5000, message = "min_words must be between 1 and 5000"))]
    pub min_words: Option<i32>,
    pub position: Option<i32>,
    #[validate(nested)]
    #[serde(default)]
    pub options: Vec<OptionParams>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilterParams {
    pub status: Option<super::BookingStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingParams {
    pub exam_id: String,
    pub scheduled_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentParams {
    pub booking_id: String,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConfirmPaymentParams {
    pub success: bool,
    #[validate(length(min = 4, max = 100, message = "transaction_ref must be 4 to 100 characters"))]
    pub transaction_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartAttemptParams {
    pub booking_id: String,
}

/// A candidate's answer to one question
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerParams {
    #[serde(default)]
    pub selected_option_ids: Vec<String>,
    pub answer_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAttemptParams {
    /// Keyed by question id
    #[serde(default)]
    pub answers: HashMap<String, AnswerParams>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevenueParams {
    pub months: Option<i64>,
}
