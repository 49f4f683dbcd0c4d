use crate::api::extractors::CurrentUser;
use crate::db::models::{
    ApiResponse, ConfirmPaymentParams, CreatePaymentParams, PageParams, Payment, PaymentWithBooking,
    Permission,
};
use crate::db::DbClient;
use crate::services::misc::Page;
use crate::Result;
use axum::extract::{Path, Query, State};
use axum::{http::StatusCode, Json};
use validator::Validate;

// Route handler for GET /api/payments
pub(crate) async fn list_payments(
    State(db): State<DbClient>,
    current: CurrentUser,
    Query(page): Query<PageParams>,
) -> Result<ApiResponse<Vec<Payment>>> {
    let page = Page::from(&page);
    let owner = if current.require(Permission::ViewAllPayments).is_ok() {
        None
    } else {
        Some(current.id())
    };
    let (payments, total) = db.list_payments(owner, page).await?;
    Ok(ApiResponse::page(payments, page.meta(total)))
}

// Route handler for POST /api/payments
pub(crate) async fn create_payment(
    State(db): State<DbClient>,
    current: CurrentUser,
    Json(payload): Json<CreatePaymentParams>,
) -> Result<(StatusCode, ApiResponse<Payment>)> {
    current.require(Permission::TakeExams)?;
    let payment = db.create_payment(&current.user, &payload).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(payment).with_message("Payment initiated"),
    ))
}

// Route handler for POST /api/payments/:id/confirm
pub(crate) async fn confirm_payment(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(payment_id): Path<String>,
    Json(payload): Json<ConfirmPaymentParams>,
) -> Result<ApiResponse<PaymentWithBooking>> {
    payload.validate()?;
    let result = db.confirm_payment(&current.user, &payment_id, &payload).await?;
    let message = if payload.success {
        "Payment completed"
    } else {
        "Payment failed"
    };
    Ok(ApiResponse::ok(result).with_message(message))
}

// Route handler for POST /api/payments/:id/refund
pub(crate) async fn refund_payment(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(payment_id): Path<String>,
) -> Result<ApiResponse<PaymentWithBooking>> {
    current.require(Permission::RefundPayments)?;
    let result = db.refund_payment(current.id(), &payment_id).await?;
    Ok(ApiResponse::ok(result).with_message("Payment refunded"))
}
