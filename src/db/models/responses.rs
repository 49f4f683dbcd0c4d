use axum::{
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{
    Certificate, ExamAttempt, ExamBooking, Payment, Question, QuestionOption, QuestionResponse,
    User,
};

/// Envelope wrapping every successful response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PaginationMeta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            message: None,
            meta: None,
        }
    }

    pub fn page(data: T, meta: PaginationMeta) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(meta),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse {
            success: true,
            data: None,
            message: Some(message.into()),
            meta: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
    pub items_per_page: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: NaiveDateTime,
    pub user: User,
}

/// Question as seen by staff, answers included
#[derive(Debug, Serialize)]
pub struct QuestionWithOptions {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<QuestionOption>,
}

/// Option as seen by a candidate during an attempt
#[derive(Debug, Serialize)]
pub struct CandidateOption {
    pub id: String,
    pub text: String,
}

/// Question as seen by a candidate: no correctness, model answers or keywords
#[derive(Debug, Serialize)]
pub struct CandidateQuestion {
    pub id: String,
    pub question_type: String,
    pub text: String,
    pub marks: i32,
    pub min_words: Option<i32>,
    pub options: Vec<CandidateOption>,
}

impl From<&QuestionWithOptions> for CandidateQuestion {
    fn from(value: &QuestionWithOptions) -> Self {
        CandidateQuestion {
            id: value.question.id.clone(),
            question_type: value.question.question_type.clone(),
            text: value.question.text.clone(),
            marks: value.question.marks,
            min_words: value.question.min_words,
            options: value
                .options
                .iter()
                .map(|o| CandidateOption {
                    id: o.id.clone(),
                    text: o.text.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: ExamBooking,
    pub exam_title: String,
}

#[derive(Debug, Serialize)]
pub struct StartedAttempt {
    pub attempt: ExamAttempt,
    pub ends_at: NaiveDateTime,
    pub questions: Vec<CandidateQuestion>,
}

#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub attempt: ExamAttempt,
    pub exam_title: String,
    pub total_marks: i32,
    pub passing_marks: i32,
    pub responses: Vec<QuestionResponse>,
    pub certificate: Option<Certificate>,
}

/// Public answer to a certificate lookup
#[derive(Debug, Serialize, Deserialize)]
pub struct CertificateVerification {
    pub certificate_number: String,
    pub holder_name: String,
    pub exam_title: String,
    pub percentage: f64,
    pub issued_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct PaymentWithBooking {
    pub payment: Payment,
    pub booking: ExamBooking,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountByKey {
    pub key: String,
    pub count: i64,
}

/// Platform wide dashboard numbers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformOverview {
    pub users_by_role: Vec<CountByKey>,
    pub total_exams: i64,
    pub published_exams: i64,
    pub bookings_by_status: Vec<CountByKey>,
    pub revenue_cents: i64,
    pub total_attempts: i64,
    pub average_percentage: Option<f64>,
    pub pass_rate: Option<f64>,
    pub certificates_issued: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub revenue_cents: i64,
    pub payments: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionStats {
    pub question_id: String,
    pub text: String,
    pub responses: i64,
    pub correct_rate: Option<f64>,
    pub average_marks: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamAnalytics {
    pub exam_id: String,
    pub title: String,
    pub attempts: i64,
    pub average_percentage: Option<f64>,
    pub highest_percentage: Option<f64>,
    pub lowest_percentage: Option<f64>,
    pub pass_rate: Option<f64>,
    pub questions: Vec<QuestionStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserDashboard {
    pub upcoming_bookings: Vec<BookingSummary>,
    pub total_attempts: i64,
    pub average_percentage: Option<f64>,
    pub best_percentage: Option<f64>,
    pub certificates: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingSummary {
    pub booking_id: String,
    pub exam_title: String,
    pub scheduled_at: NaiveDateTime,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_skips_empty_fields() {
        let body = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], serde_json::json!([1, 2]));
        assert!(body.get("message").is_none());
        assert!(body.get("meta").is_none());

        let body = serde_json::to_value(ApiResponse::message("Logged out")).unwrap();
        assert_eq!(body["message"], "Logged out");
        assert!(body.get("data").is_none());
    }
}
