//! API request handlers, grouped by resource.

pub mod analytics;
pub mod attempts;
pub mod audit;
pub mod auth;
pub mod billing;
pub mod bookings;
pub mod categories;
pub mod certificates;
pub mod exams;
pub mod health;
pub mod payments;
pub mod questions;
pub mod users;

pub(crate) use analytics::{get_exam_analytics, get_overview, get_revenue, get_user_dashboard};
pub(crate) use attempts::{get_attempt, list_attempts, start_attempt, submit_attempt};
pub(crate) use audit::list_audit_logs;
pub(crate) use auth::{change_password, get_profile, login, logout, register, update_profile};
pub(crate) use billing::download_invoice;
pub(crate) use bookings::{cancel_booking, create_booking, get_booking, list_bookings};
pub(crate) use categories::{create_category, delete_category, list_categories, update_category};
pub(crate) use certificates::{download_certificate, list_certificates, verify_certificate};
pub(crate) use exams::{
    create_exam, delete_exam, get_exam, list_exams, publish_exam, unpublish_exam, update_exam,
};
pub(crate) use health::health_check;
pub(crate) use payments::{confirm_payment, create_payment, list_payments, refund_payment};
pub(crate) use questions::{create_question, delete_question, list_exam_questions, update_question};
pub(crate) use users::{delete_user, get_user, list_users, update_user_role, update_user_status};

use axum::{
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};

/// Serves rendered PDF bytes as a download
pub fn pdf_response(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}.pdf\""),
            ),
        ],
        bytes,
    )
        .into_response()
}
