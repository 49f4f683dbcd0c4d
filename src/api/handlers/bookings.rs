use crate::api::extractors::CurrentUser;
use crate::db::models::{
    ApiResponse, BookingDetails, BookingFilterParams, BookingStatus, CreateBookingParams,
    ExamBooking, PageParams, Permission,
};
use crate::db::DbClient;
use crate::services::misc::Page;
use crate::Result;
use axum::extract::{Path, Query, State};
use axum::{http::StatusCode, Json};

// Route handler for GET /api/bookings
pub(crate) async fn list_bookings(
    State(db): State<DbClient>,
    current: CurrentUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<BookingFilterParams>,
) -> Result<ApiResponse<Vec<BookingDetails>>> {
    let page = Page::from(&page);
    let owner = if current.require(Permission::ViewAllBookings).is_ok() {
        None
    } else {
        Some(current.id())
    };
    let (bookings, total) = db.list_bookings(owner, &filter, page).await?;
    Ok(ApiResponse::page(bookings, page.meta(total)))
}

// Route handler for POST /api/bookings
pub(crate) async fn create_booking(
    State(db): State<DbClient>,
    current: CurrentUser,
    Json(payload): Json<CreateBookingParams>,
) -> Result<(StatusCode, ApiResponse<ExamBooking>)> {
    current.require(Permission::TakeExams)?;
    let booking = db.create_booking(&current.user, &payload).await?;
    let message = match booking.status()? {
        BookingStatus::Confirmed => "Booking confirmed",
        _ => "Booking created, awaiting payment",
    };
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(booking).with_message(message),
    ))
}

// Route handler for GET /api/bookings/:id
pub(crate) async fn get_booking(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(booking_id): Path<String>,
) -> Result<ApiResponse<BookingDetails>> {
    let details = db.get_booking_details(&booking_id).await?;
    current.require_owner_or(&details.booking.user_id, Permission::ViewAllBookings)?;
    Ok(ApiResponse::ok(details))
}

// Route handler for POST /api/bookings/:id/cancel
pub(crate) async fn cancel_booking(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(booking_id): Path<String>,
) -> Result<ApiResponse<ExamBooking>> {
    let booking = db.get_booking(&booking_id).await?;
    current.require_owner_or(&booking.user_id, Permission::ViewAllBookings)?;
    let cancelled = db.cancel_booking(current.id(), &booking_id).await?;
    Ok(ApiResponse::ok(cancelled).with_message("Booking cancelled"))
}
