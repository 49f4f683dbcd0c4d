use super::DbClient;
use crate::db::models::{
    new_id, now, AttemptStatus, AuditLog, BookingDetails, BookingFilterParams, BookingStatus,
    CreateBookingParams, ExamBooking, PaymentStatus, User,
};
use crate::db::payments::move_booking_payments;
use crate::errors::ApiError;
use crate::services::misc::Page;
use crate::validation::validate_schedule;
use crate::Result;
use diesel::{expression_methods::ExpressionMethods, pg::Pg, query_dsl::QueryDsl};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use std::collections::HashMap;
use tracing::info;

const ACTIVE_BOOKING_CONFLICT: &str = "You already have an active booking for this exam";

/// Refuses any move the booking status machine does not allow
pub fn check_booking_transition(from: BookingStatus, to: BookingStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ApiError::Conflict(format!(
            "Booking cannot move from {from} to {to}"
        )))
    }
}

/// Moves a booking from `from` to `to`, failing if another request moved it first
pub(crate) async fn set_booking_status(
    conn: &mut AsyncPgConnection,
    booking_key: &str,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<ExamBooking> {
    use crate::schema::exam_bookings::dsl::*;

    check_booking_transition(from, to)?;
    diesel::update(
        exam_bookings
            .filter(id.eq(booking_key))
            .filter(status.eq(from.as_str())),
    )
    .set((status.eq(to.as_str()), updated_at.eq(now())))
    .get_result::<ExamBooking>(conn)
    .await
    .map_err(|e| match e {
        diesel::result::Error::NotFound => {
            ApiError::Conflict("Booking status changed concurrently".to_string())
        }
        e => e.into(),
    })
}

/// Loads a booking and holds its row lock until the surrounding transaction ends
pub(crate) async fn lock_booking(
    conn: &mut AsyncPgConnection,
    booking_key: &str,
) -> Result<ExamBooking> {
    use crate::schema::exam_bookings::dsl::*;

    exam_bookings
        .filter(id.eq(booking_key))
        .for_update()
        .first::<ExamBooking>(conn)
        .await
        .map_err(|e| match e {
            diesel::result::Error::NotFound => ApiError::not_found("Booking"),
            e => e.into(),
        })
}

/// A booking with a running attempt cannot be cancelled or refunded
pub(crate) async fn ensure_no_attempt_in_progress(
    conn: &mut AsyncPgConnection,
    booking_key: &str,
) -> Result<()> {
    use crate::schema::exam_attempts;

    let running = exam_attempts::table
        .filter(exam_attempts::booking_id.eq(booking_key))
        .filter(exam_attempts::status.eq(AttemptStatus::InProgress.as_str()))
        .count()
        .get_result::<i64>(conn)
        .await?;
    if running > 0 {
        return Err(ApiError::Conflict(
            "An attempt on this booking is in progress; submit it first".to_string(),
        ));
    }
    Ok(())
}

/// DbClient helper functions for the exam_bookings table
impl DbClient {
    /// Lists bookings, restricted to one user unless `owner` is `None`
    pub async fn list_bookings(
        &self,
        owner: Option<&str>,
        filter: &BookingFilterParams,
        page: Page,
    ) -> Result<(Vec<BookingDetails>, i64)> {
        use crate::schema::{exam_bookings, exams};

        let conn = &mut self.get_db_conn().await?;
        let total = filtered_bookings(owner, filter)
            .count()
            .get_result::<i64>(conn)
            .await?;
        let bookings = filtered_bookings(owner, filter)
            .order(exam_bookings::scheduled_at.desc())
            .limit(page.per_page)
            .offset(page.offset())
            .load::<ExamBooking>(conn)
            .await?;

        let exam_ids: Vec<String> = bookings.iter().map(|b| b.exam_id.clone()).collect();
        let titles: HashMap<String, String> = exams::table
            .filter(exams::id.eq_any(exam_ids))
            .select((exams::id, exams::title))
            .load::<(String, String)>(conn)
            .await?
            .into_iter()
            .collect();

        let rows = bookings
            .into_iter()
            .map(|booking| BookingDetails {
                exam_title: titles.get(&booking.exam_id).cloned().unwrap_or_default(),
                booking,
            })
            .collect();
        Ok((rows, total))
    }

    pub async fn get_booking(&self, booking_id: &str) -> Result<ExamBooking> {
        use crate::schema::exam_bookings::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        exam_bookings
            .filter(id.eq(booking_id))
            .first::<ExamBooking>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ApiError::not_found("Booking"),
                e => e.into(),
            })
    }

    pub async fn get_booking_details(&self, booking_id: &str) -> Result<BookingDetails> {
        let booking = self.get_booking(booking_id).await?;
        let exam = self.get_exam(&booking.exam_id).await?;
        Ok(BookingDetails {
            booking,
            exam_title: exam.title,
        })
    }

    /// Free exams are confirmed right away, paid ones wait for a payment
    pub async fn create_booking(&self, user: &User, params: &CreateBookingParams) -> Result<ExamBooking> {
        use crate::schema::exam_bookings::dsl::*;

        let ts = now();
        validate_schedule(params.scheduled_at, ts).map_err(ApiError::Validation)?;

        let exam = self.get_exam(&params.exam_id).await?;
        if !exam.is_published {
            return Err(ApiError::Validation("Exam is not open for booking".to_string()));
        }

        let conn = &mut self.get_db_conn().await?;
        let active_codes = vec![BookingStatus::Pending.as_str(), BookingStatus::Confirmed.as_str()];
        let active = exam_bookings
            .filter(user_id.eq(&user.id))
            .filter(exam_id.eq(&exam.id))
            .filter(status.eq_any(active_codes))
            .count()
            .get_result::<i64>(conn)
            .await?;
        if active > 0 {
            return Err(ApiError::Conflict(ACTIVE_BOOKING_CONFLICT.to_string()));
        }

        let initial = if exam.is_free() {
            BookingStatus::Confirmed
        } else {
            BookingStatus::Pending
        };
        let booking = ExamBooking {
            id: new_id(),
            user_id: user.id.clone(),
            exam_id: exam.id.clone(),
            scheduled_at: params.scheduled_at,
            status: initial.into(),
            created_at: ts,
            updated_at: ts,
        };
        let created = diesel::insert_into(exam_bookings)
            .values(&booking)
            .get_result::<ExamBooking>(conn)
            .await
            .map_err(|e| ApiError::conflict_on_unique(e, ACTIVE_BOOKING_CONFLICT))?;
        info!("Booking {} created with status {}", created.id, created.status);

        self.record_audit(AuditLog::new(
            Some(&user.id),
            "booking.created",
            "booking",
            Some(&created.id),
            Some(&serde_json::json!({ "exam_id": exam.id, "status": initial })),
        ))
        .await;
        Ok(created)
    }

    /// Cancels a booking. A completed payment is refunded and an open one fails.
    pub async fn cancel_booking(&self, actor_id: &str, booking_id: &str) -> Result<ExamBooking> {
        let conn = &mut self.get_db_conn().await?;
        let (previous, cancelled, refunded, failed) = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let booking = lock_booking(conn, booking_id).await?;
                    let current = booking.status()?;
                    check_booking_transition(current, BookingStatus::Cancelled)?;
                    ensure_no_attempt_in_progress(conn, booking_id).await?;

                    let cancelled =
                        set_booking_status(conn, booking_id, current, BookingStatus::Cancelled)
                            .await?;
                    let refunded = move_booking_payments(
                        conn,
                        booking_id,
                        PaymentStatus::Completed,
                        PaymentStatus::Refunded,
                    )
                    .await?;
                    let failed = move_booking_payments(
                        conn,
                        booking_id,
                        PaymentStatus::Pending,
                        PaymentStatus::Failed,
                    )
                    .await?;
                    Ok((current, cancelled, refunded, failed))
                }
                .scope_boxed()
            })
            .await?;

        self.record_audit(AuditLog::new(
            Some(actor_id),
            "booking.cancelled",
            "booking",
            Some(booking_id),
            Some(&serde_json::json!({
                "from": previous,
                "refunded_payments": refunded,
                "failed_payments": failed,
            })),
        ))
        .await;
        if refunded > 0 {
            self.invalidate_platform_overview().await;
        }
        Ok(cancelled)
    }

    /// Pending bookings whose slot has passed can no longer be paid for.
    /// Their open payments fail with them.
    pub async fn expire_stale_bookings(&self) -> Result<usize> {
        use crate::schema::{exam_bookings, payments};

        let conn = &mut self.get_db_conn().await?;
        let ts = now();
        let (expired, failed) = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let expired = diesel::update(
                        exam_bookings::table
                            .filter(exam_bookings::status.eq(BookingStatus::Pending.as_str()))
                            .filter(exam_bookings::scheduled_at.lt(ts)),
                    )
                    .set((
                        exam_bookings::status.eq(BookingStatus::Expired.as_str()),
                        exam_bookings::updated_at.eq(ts),
                    ))
                    .returning(exam_bookings::id)
                    .get_results::<String>(conn)
                    .await?;

                    let failed = if expired.is_empty() {
                        0
                    } else {
                        diesel::update(
                            payments::table
                                .filter(payments::booking_id.eq_any(expired.clone()))
                                .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
                        )
                        .set((
                            payments::status.eq(PaymentStatus::Failed.as_str()),
                            payments::updated_at.eq(ts),
                        ))
                        .execute(conn)
                        .await?
                    };
                    Ok((expired, failed))
                }
                .scope_boxed()
            })
            .await?;

        if !expired.is_empty() {
            self.record_audit(AuditLog::new(
                None,
                "booking.expired",
                "booking",
                None,
                Some(&serde_json::json!({ "count": expired.len(), "failed_payments": failed })),
            ))
            .await;
        }
        Ok(expired.len())
    }
}

fn filtered_bookings(
    owner: Option<&str>,
    filter: &BookingFilterParams,
) -> crate::schema::exam_bookings::BoxedQuery<'static, Pg> {
    use crate::schema::exam_bookings;

    let mut query = exam_bookings::table.into_boxed();
    if let Some(owner_id) = owner {
        query = query.filter(exam_bookings::user_id.eq(owner_id.to_string()));
    }
    if let Some(code) = filter.status {
        query = query.filter(exam_bookings::status.eq(code.as_str()));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_transitions() {
        assert!(check_booking_transition(BookingStatus::Pending, BookingStatus::Confirmed).is_ok());
        assert!(check_booking_transition(BookingStatus::Confirmed, BookingStatus::Cancelled).is_ok());
        assert!(check_booking_transition(BookingStatus::Confirmed, BookingStatus::Completed).is_ok());

        let refused = check_booking_transition(BookingStatus::Completed, BookingStatus::Cancelled);
        match refused {
            Err(ApiError::Conflict(msg)) => {
                assert_eq!(msg, "Booking cannot move from completed to cancelled")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(check_booking_transition(BookingStatus::Expired, BookingStatus::Confirmed).is_err());
        assert!(check_booking_transition(BookingStatus::Pending, BookingStatus::Completed).is_err());
    }

    use crate::db::models::{CreatePaymentParams, PaymentMethod, Role};
    use crate::db::test_support::*;

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_one_active_booking_per_exam() {
        let client = test_client();
        let admin = create_user(&client, Role::Admin).await;
        let student = create_user(&client, Role::Student).await;
        let fixture = published_exam(&client, &admin, 1500, 3).await;

        let booking = book(&client, &student, &fixture.exam).await;
        assert_eq!(booking.status().unwrap(), BookingStatus::Pending);

        let again = client
            .create_booking(
                &student,
                &CreateBookingParams {
                    exam_id: fixture.exam.id.clone(),
                    scheduled_at: booking.scheduled_at,
                },
            )
            .await;
        assert!(matches!(again, Err(ApiError::Conflict(_))));

        // A cancelled booking no longer blocks a new one
        client.cancel_booking(&student.id, &booking.id).await.unwrap();
        let rebooked = book(&client, &student, &fixture.exam).await;
        assert_ne!(rebooked.id, booking.id);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_cancel_refused_while_attempt_in_progress() {
        let client = test_client();
        let admin = create_user(&client, Role::Admin).await;
        let student = create_user(&client, Role::Student).await;
        let fixture = published_exam(&client, &admin, 0, 1).await;

        let booking = book(&client, &student, &fixture.exam).await;
        assert_eq!(booking.status().unwrap(), BookingStatus::Confirmed);
        open_booking_slot(&client, &booking.id).await;
        let started = client.start_attempt(&student, &booking.id).await.unwrap();

        let cancelled = client.cancel_booking(&student.id, &booking.id).await;
        assert!(matches!(cancelled, Err(ApiError::Conflict(_))));
        let unchanged = client.get_booking(&booking.id).await.unwrap();
        assert_eq!(unchanged.status().unwrap(), BookingStatus::Confirmed);

        // The running attempt can still be submitted and completes the booking
        let result = client
            .submit_attempt(&student, &started.attempt.id, &fixture.answer(fixture.correct_option()))
            .await
            .unwrap();
        assert_eq!(result.attempt.status().unwrap(), AttemptStatus::Submitted);
        let completed = client.get_booking(&booking.id).await.unwrap();
        assert_eq!(completed.status().unwrap(), BookingStatus::Completed);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_cancel_settles_payments() {
        let client = test_client();
        let admin = create_user(&client, Role::Admin).await;
        let student = create_user(&client, Role::Student).await;
        let fixture = published_exam(&client, &admin, 2500, 3).await;

        // An unpaid booking fails its open payment
        let booking = book(&client, &student, &fixture.exam).await;
        let payment = client
            .create_payment(
                &student,
                &CreatePaymentParams {
                    booking_id: booking.id.clone(),
                    method: PaymentMethod::Card,
                },
            )
            .await
            .unwrap();
        let cancelled = client.cancel_booking(&student.id, &booking.id).await.unwrap();
        assert_eq!(cancelled.status().unwrap(), BookingStatus::Cancelled);
        let failed = client.get_payment(&payment.id).await.unwrap();
        assert_eq!(failed.status().unwrap(), PaymentStatus::Failed);

        // A paid booking is refunded
        let booking = book(&client, &student, &fixture.exam).await;
        let payment = client
            .create_payment(
                &student,
                &CreatePaymentParams {
                    booking_id: booking.id.clone(),
                    method: PaymentMethod::Card,
                },
            )
            .await
            .unwrap();
        client
            .confirm_payment(
                &student,
                &payment.id,
                &crate::db::models::ConfirmPaymentParams {
                    success: true,
                    transaction_ref: Some("txn-0001".into()),
                },
            )
            .await
            .unwrap();
        client.cancel_booking(&student.id, &booking.id).await.unwrap();
        let refunded = client.get_payment(&payment.id).await.unwrap();
        assert_eq!(refunded.status().unwrap(), PaymentStatus::Refunded);
    }
}
