use super::DbClient;
use crate::db::bookings::{ensure_no_attempt_in_progress, lock_booking, set_booking_status};
use crate::db::models::{
    new_id, now, AuditLog, BookingStatus, ConfirmPaymentParams, CreatePaymentParams, Payment,
    PaymentStatus, PaymentWithBooking, User,
};
use crate::errors::{ApiError, ErrorMessages};
use crate::services::misc::Page;
use crate::Result;
use diesel::{expression_methods::ExpressionMethods, query_dsl::QueryDsl};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use tracing::info;

const ACTIVE_PAYMENT_CONFLICT: &str = "Booking already has an open or completed payment";

pub fn check_payment_transition(from: PaymentStatus, to: PaymentStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ApiError::Conflict(format!(
            "Payment cannot move from {from} to {to}"
        )))
    }
}

/// Moves a payment from `from` to `to` with optional settlement details
async fn set_payment_status(
    conn: &mut AsyncPgConnection,
    payment_key: &str,
    from: PaymentStatus,
    to: PaymentStatus,
    reference: Option<String>,
    settled_at: Option<chrono::NaiveDateTime>,
) -> Result<Payment> {
    use crate::schema::payments::dsl::*;

    check_payment_transition(from, to)?;
    let query = payments
        .filter(id.eq(payment_key))
        .filter(status.eq(from.as_str()));
    let ts = now();
    let result = match settled_at {
        Some(at) => {
            diesel::update(query)
                .set((
                    status.eq(to.as_str()),
                    transaction_ref.eq(reference),
                    paid_at.eq(Some(at)),
                    updated_at.eq(ts),
                ))
                .get_result::<Payment>(conn)
                .await
        }
        None => {
            diesel::update(query)
                .set((status.eq(to.as_str()), updated_at.eq(ts)))
                .get_result::<Payment>(conn)
                .await
        }
    };
    result.map_err(|e| match e {
        diesel::result::Error::NotFound => {
            ApiError::Conflict("Payment status changed concurrently".to_string())
        }
        e => e.into(),
    })
}

/// Moves every payment of a booking that is in `from` to `to`
pub(crate) async fn move_booking_payments(
    conn: &mut AsyncPgConnection,
    booking_key: &str,
    from: PaymentStatus,
    to: PaymentStatus,
) -> Result<usize> {
    use crate::schema::payments::dsl::*;

    check_payment_transition(from, to)?;
    diesel::update(
        payments
            .filter(booking_id.eq(booking_key))
            .filter(status.eq(from.as_str())),
    )
    .set((status.eq(to.as_str()), updated_at.eq(now())))
    .execute(conn)
    .await
    .map_err(Into::into)
}

/// DbClient helper functions for the payments table
impl DbClient {
    pub async fn list_payments(&self, owner: Option<&str>, page: Page) -> Result<(Vec<Payment>, i64)> {
        use crate::schema::payments::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        let mut count_query = payments.into_boxed();
        let mut rows_query = payments.into_boxed();
        if let Some(owner_id) = owner {
            count_query = count_query.filter(user_id.eq(owner_id.to_string()));
            rows_query = rows_query.filter(user_id.eq(owner_id.to_string()));
        }

        let total = count_query.count().get_result::<i64>(conn).await?;
        let rows = rows_query
            .order(created_at.desc())
            .limit(page.per_page)
            .offset(page.offset())
            .load::<Payment>(conn)
            .await?;
        Ok((rows, total))
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<Payment> {
        use crate::schema::payments::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        payments
            .filter(id.eq(payment_id))
            .first::<Payment>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ApiError::not_found("Payment"),
                e => e.into(),
            })
    }

    /// Opens a payment for the caller's pending booking, priced from the exam
    pub async fn create_payment(&self, user: &User, params: &CreatePaymentParams) -> Result<Payment> {
        use crate::schema::payments;

        let booking = self.get_booking(&params.booking_id).await?;
        if booking.user_id != user.id {
            return Err(ApiError::Forbidden(ErrorMessages::Forbidden.to_string()));
        }
        let exam = self.get_exam(&booking.exam_id).await?;

        let ts = now();
        let payment = Payment {
            id: new_id(),
            booking_id: booking.id.clone(),
            user_id: user.id.clone(),
            amount_cents: exam.price_cents,
            currency: exam.currency.clone(),
            method: params.method.into(),
            status: PaymentStatus::Pending.into(),
            transaction_ref: None,
            paid_at: None,
            created_at: ts,
            updated_at: ts,
        };

        let conn = &mut self.get_db_conn().await?;
        let created = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let booking = lock_booking(conn, &payment.booking_id).await?;
                    if booking.status()? != BookingStatus::Pending {
                        return Err(ApiError::Conflict(format!(
                            "Booking is {} and does not await payment",
                            booking.status
                        )));
                    }

                    let active_codes =
                        vec![PaymentStatus::Pending.as_str(), PaymentStatus::Completed.as_str()];
                    let active = payments::table
                        .filter(payments::booking_id.eq(&booking.id))
                        .filter(payments::status.eq_any(active_codes))
                        .count()
                        .get_result::<i64>(conn)
                        .await?;
                    if active > 0 {
                        return Err(ApiError::Conflict(ACTIVE_PAYMENT_CONFLICT.to_string()));
                    }

                    diesel::insert_into(payments::table)
                        .values(&payment)
                        .get_result::<Payment>(conn)
                        .await
                        .map_err(|e| ApiError::conflict_on_unique(e, ACTIVE_PAYMENT_CONFLICT))
                }
                .scope_boxed()
            })
            .await?;
        info!("Payment {} opened for booking {}", created.id, created.booking_id);

        self.record_audit(AuditLog::new(
            Some(&user.id),
            "payment.created",
            "payment",
            Some(&created.id),
            Some(&serde_json::json!({
                "booking_id": created.booking_id,
                "amount_cents": created.amount_cents,
                "method": params.method,
            })),
        ))
        .await;
        Ok(created)
    }

    /// Gateway outcome reported by the payer. Success confirms the booking.
    pub async fn confirm_payment(
        &self,
        user: &User,
        payment_id: &str,
        params: &ConfirmPaymentParams,
    ) -> Result<PaymentWithBooking> {
        let payment = self.get_payment(payment_id).await?;
        if payment.user_id != user.id {
            return Err(ApiError::Forbidden(ErrorMessages::Forbidden.to_string()));
        }
        let current = payment.status()?;
        let next = if params.success {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };
        check_payment_transition(current, next)?;

        let reference = match (params.success, params.transaction_ref.as_deref()) {
            (true, Some(r)) if !r.trim().is_empty() => Some(r.trim().to_string()),
            (true, _) => {
                return Err(ApiError::Validation(
                    "transaction_ref is required for a successful payment".to_string(),
                ))
            }
            (false, r) => r.map(str::to_string),
        };

        let booking = self.get_booking(&payment.booking_id).await?;
        let booking_status = booking.status()?;
        if params.success && booking_status != BookingStatus::Pending {
            return Err(ApiError::Conflict(format!(
                "Booking is {booking_status} and can no longer be paid"
            )));
        }

        let conn = &mut self.get_db_conn().await?;
        let payment_key = payment.id.clone();
        let result = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    if params.success {
                        let payment = set_payment_status(
                            conn,
                            &payment_key,
                            current,
                            next,
                            reference,
                            Some(now()),
                        )
                        .await?;
                        let booking = set_booking_status(
                            conn,
                            &booking.id,
                            BookingStatus::Pending,
                            BookingStatus::Confirmed,
                        )
                        .await?;
                        Ok(PaymentWithBooking { payment, booking })
                    } else {
                        let payment =
                            set_payment_status(conn, &payment_key, current, next, None, None).await?;
                        Ok(PaymentWithBooking { payment, booking })
                    }
                }
                .scope_boxed()
            })
            .await?;

        self.record_audit(AuditLog::new(
            Some(&user.id),
            if params.success { "payment.completed" } else { "payment.failed" },
            "payment",
            Some(payment_id),
            params
                .transaction_ref
                .as_ref()
                .map(|r| serde_json::json!({ "transaction_ref": r }))
                .as_ref(),
        ))
        .await;
        if params.success {
            self.invalidate_platform_overview().await;
        }
        Ok(result)
    }

    /// Refunds a completed payment and cancels its booking unless the exam was taken
    pub async fn refund_payment(&self, actor_id: &str, payment_id: &str) -> Result<PaymentWithBooking> {
        let payment = self.get_payment(payment_id).await?;
        let current = payment.status()?;
        check_payment_transition(current, PaymentStatus::Refunded)?;

        let conn = &mut self.get_db_conn().await?;
        let payment_key = payment.id.clone();
        let booking_key = payment.booking_id.clone();
        let result = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let booking = lock_booking(conn, &booking_key).await?;
                    let booking_status = booking.status()?;
                    let cancel = booking_status.can_transition_to(BookingStatus::Cancelled);
                    if cancel {
                        ensure_no_attempt_in_progress(conn, &booking_key).await?;
                    }

                    let payment = set_payment_status(
                        conn,
                        &payment_key,
                        current,
                        PaymentStatus::Refunded,
                        None,
                        None,
                    )
                    .await?;
                    let booking = if cancel {
                        set_booking_status(conn, &booking.id, booking_status, BookingStatus::Cancelled)
                            .await?
                    } else {
                        booking
                    };
                    Ok(PaymentWithBooking { payment, booking })
                }
                .scope_boxed()
            })
            .await?;

        self.record_audit(AuditLog::new(
            Some(actor_id),
            "payment.refunded",
            "payment",
            Some(payment_id),
            Some(&serde_json::json!({
                "amount_cents": result.payment.amount_cents,
                "booking_status": result.booking.status,
            })),
        ))
        .await;
        self.invalidate_platform_overview().await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_transitions() {
        assert!(check_payment_transition(PaymentStatus::Pending, PaymentStatus::Completed).is_ok());
        assert!(check_payment_transition(PaymentStatus::Pending, PaymentStatus::Failed).is_ok());
        assert!(check_payment_transition(PaymentStatus::Completed, PaymentStatus::Refunded).is_ok());

        assert!(matches!(
            check_payment_transition(PaymentStatus::Failed, PaymentStatus::Completed),
            Err(ApiError::Conflict(_))
        ));
        assert!(check_payment_transition(PaymentStatus::Pending, PaymentStatus::Refunded).is_err());
        assert!(check_payment_transition(PaymentStatus::Refunded, PaymentStatus::Completed).is_err());
    }

    use crate::db::models::{ExamBooking, PaymentMethod, Role};
    use crate::db::test_support::*;

    async fn pay(client: &DbClient, user: &User, booking: &ExamBooking) -> Payment {
        let payment = client
            .create_payment(
                user,
                &CreatePaymentParams {
                    booking_id: booking.id.clone(),
                    method: PaymentMethod::Card,
                },
            )
            .await
            .unwrap();
        client
            .confirm_payment(
                user,
                &payment.id,
                &ConfirmPaymentParams {
                    success: true,
                    transaction_ref: Some("txn-4242".into()),
                },
            )
            .await
            .unwrap()
            .payment
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_payment_confirms_booking_and_refund_cancels_it() {
        let client = test_client();
        let admin = create_user(&client, Role::Admin).await;
        let student = create_user(&client, Role::Student).await;
        let fixture = published_exam(&client, &admin, 1999, 2).await;
        let booking = book(&client, &student, &fixture.exam).await;

        let payment = pay(&client, &student, &booking).await;
        assert_eq!(payment.status().unwrap(), PaymentStatus::Completed);
        assert_eq!(payment.amount_cents, 1999);
        assert_eq!(payment.transaction_ref.as_deref(), Some("txn-4242"));
        assert!(payment.paid_at.is_some());
        let confirmed = client.get_booking(&booking.id).await.unwrap();
        assert_eq!(confirmed.status().unwrap(), BookingStatus::Confirmed);

        let refunded = client.refund_payment(&admin.id, &payment.id).await.unwrap();
        assert_eq!(refunded.payment.status().unwrap(), PaymentStatus::Refunded);
        assert_eq!(refunded.booking.status().unwrap(), BookingStatus::Cancelled);

        let twice = client.refund_payment(&admin.id, &payment.id).await;
        assert!(matches!(twice, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_second_payment_for_booking_conflicts() {
        let client = test_client();
        let admin = create_user(&client, Role::Admin).await;
        let student = create_user(&client, Role::Student).await;
        let fixture = published_exam(&client, &admin, 500, 1).await;
        let booking = book(&client, &student, &fixture.exam).await;

        let params = CreatePaymentParams {
            booking_id: booking.id.clone(),
            method: PaymentMethod::Card,
        };
        let (first, second) = tokio::join!(
            client.create_payment(&student, &params),
            client.create_payment(&student, &params)
        );
        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        assert!(matches!(
            if first.is_ok() { second } else { first },
            Err(ApiError::Conflict(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_refund_refused_while_attempt_in_progress() {
        let client = test_client();
        let admin = create_user(&client, Role::Admin).await;
        let student = create_user(&client, Role::Student).await;
        let fixture = published_exam(&client, &admin, 1000, 1).await;
        let booking = book(&client, &student, &fixture.exam).await;
        let payment = pay(&client, &student, &booking).await;

        open_booking_slot(&client, &booking.id).await;
        let started = client.start_attempt(&student, &booking.id).await.unwrap();

        let refused = client.refund_payment(&admin.id, &payment.id).await;
        assert!(matches!(refused, Err(ApiError::Conflict(_))));
        let still_paid = client.get_payment(&payment.id).await.unwrap();
        assert_eq!(still_paid.status().unwrap(), PaymentStatus::Completed);

        client
            .submit_attempt(&student, &started.attempt.id, &fixture.answer(fixture.wrong_option()))
            .await
            .unwrap();

        // Once the exam was taken the refund leaves the completed booking alone
        let refunded = client.refund_payment(&admin.id, &payment.id).await.unwrap();
        assert_eq!(refunded.payment.status().unwrap(), PaymentStatus::Refunded);
        assert_eq!(refunded.booking.status().unwrap(), BookingStatus::Completed);
    }
}
