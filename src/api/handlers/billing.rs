use super::pdf_response;
use crate::api::extractors::CurrentUser;
use crate::db::models::Permission;
use crate::db::DbClient;
use crate::errors::ApiError;
use crate::services::misc::{format_amount, invoice_number};
use crate::services::pdf::{render_invoice, InvoiceData};
use crate::{Result, CONFIG};
use axum::extract::{Path, State};
use axum::response::Response;

// Route handler for GET /api/billing/:payment_id/invoice
pub(crate) async fn download_invoice(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(payment_id): Path<String>,
) -> Result<Response> {
    let payment = db.get_payment(&payment_id).await?;
    current.require_owner_or(&payment.user_id, Permission::ViewAllPayments)?;

    let status = payment.status()?;
    let paid_at = match payment.paid_at {
        Some(at) if status.is_billable() => at,
        _ => {
            return Err(ApiError::Conflict(format!(
                "No invoice is available for a {status} payment"
            )))
        }
    };

    let booking = db.get_booking(&payment.booking_id).await?;
    let exam = db.get_exam(&booking.exam_id).await?;
    let customer = db.get_user(&payment.user_id).await?;

    let number = invoice_number(paid_at, &payment.id);
    let bytes = render_invoice(&InvoiceData {
        organization: CONFIG.organization_name.clone(),
        invoice_number: number.clone(),
        issued_at: paid_at,
        customer_name: customer.full_name,
        customer_email: customer.email,
        exam_title: exam.title,
        scheduled_at: booking.scheduled_at,
        payment_method: payment.method()?.as_str().replace('_', " "),
        transaction_ref: payment.transaction_ref.clone(),
        amount: format_amount(payment.amount_cents, &payment.currency),
        status: status.to_string(),
    })?;

    tracing::info!("Invoice {} rendered for payment {}", number, payment.id);
    Ok(pdf_response(&number, bytes))
}
