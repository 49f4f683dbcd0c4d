use super::DbClient;
use crate::db::bookings::{lock_booking, set_booking_status};
use crate::db::models::{
    new_id, now, AttemptResult, AttemptStatus, AuditLog, BookingStatus, CandidateQuestion,
    Certificate, ExamAttempt, QuestionResponse, StartedAttempt, SubmitAttemptParams, User,
};
use crate::errors::{ApiError, ErrorMessages};
use crate::services::misc::{certificate_number, Page};
use crate::services::scoring::{grade_question, summarize};
use crate::Result;
use chrono::{Duration, NaiveDateTime};
use diesel::{expression_methods::ExpressionMethods, query_dsl::QueryDsl};
use diesel_async::{AsyncConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use std::collections::HashSet;
use tracing::info;

/// Submissions this long after the time limit are still graded but flagged
pub const SUBMISSION_GRACE_MINUTES: i64 = 2;

pub fn attempt_ends_at(started_at: NaiveDateTime, duration_minutes: i32) -> NaiveDateTime {
    started_at + Duration::minutes(duration_minutes as i64)
}

/// Status a submission receives at `submitted_at`
pub fn submission_status(
    started_at: NaiveDateTime,
    duration_minutes: i32,
    submitted_at: NaiveDateTime,
) -> AttemptStatus {
    let deadline =
        attempt_ends_at(started_at, duration_minutes) + Duration::minutes(SUBMISSION_GRACE_MINUTES);
    if submitted_at > deadline {
        AttemptStatus::TimedOut
    } else {
        AttemptStatus::Submitted
    }
}

/// DbClient helper functions for the exam_attempts and question_responses tables
impl DbClient {
    pub async fn get_attempt(&self, attempt_id: &str) -> Result<ExamAttempt> {
        use crate::schema::exam_attempts::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        exam_attempts
            .filter(id.eq(attempt_id))
            .first::<ExamAttempt>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ApiError::not_found("Attempt"),
                e => e.into(),
            })
    }

    pub async fn list_attempts(&self, owner_id: &str, page: Page) -> Result<(Vec<ExamAttempt>, i64)> {
        use crate::schema::exam_attempts::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        let total = exam_attempts
            .filter(user_id.eq(owner_id))
            .count()
            .get_result::<i64>(conn)
            .await?;
        let rows = exam_attempts
            .filter(user_id.eq(owner_id))
            .order(started_at.desc())
            .limit(page.per_page)
            .offset(page.offset())
            .load::<ExamAttempt>(conn)
            .await?;
        Ok((rows, total))
    }

    /// Starts an attempt on a confirmed booking, or resumes the one in progress
    pub async fn start_attempt(&self, user: &User, booking_id: &str) -> Result<StartedAttempt> {
        use crate::schema::exam_attempts;

        let booking = self.get_booking(booking_id).await?;
        if booking.user_id != user.id {
            return Err(ApiError::Forbidden(ErrorMessages::Forbidden.to_string()));
        }
        if booking.status()? != BookingStatus::Confirmed {
            return Err(ApiError::Conflict(format!(
                "Booking is {} and cannot be used to start an attempt",
                booking.status
            )));
        }
        let ts = now();
        if ts < booking.scheduled_at {
            return Err(ApiError::Validation(format!(
                "The exam opens at {}",
                booking.scheduled_at.format("%Y-%m-%d %H:%M UTC")
            )));
        }

        let exam = self.get_exam(&booking.exam_id).await?;
        let questions = self.get_questions_with_options(&exam.id).await?;

        let conn = &mut self.get_db_conn().await?;
        let exam_key = exam.id.clone();
        let max_attempts = exam.max_attempts as i64;
        let (attempt, created) = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    // Serializes concurrent starts, cancellations and refunds of this booking
                    let booking = lock_booking(conn, booking_id).await?;
                    if booking.status()? != BookingStatus::Confirmed {
                        return Err(ApiError::Conflict(format!(
                            "Booking is {} and cannot be used to start an attempt",
                            booking.status
                        )));
                    }

                    let in_progress = exam_attempts::table
                        .filter(exam_attempts::booking_id.eq(&booking.id))
                        .filter(exam_attempts::status.eq(AttemptStatus::InProgress.as_str()))
                        .first::<ExamAttempt>(conn)
                        .await;
                    match in_progress {
                        Ok(existing) => return Ok((existing, false)),
                        Err(diesel::result::Error::NotFound) => {}
                        Err(e) => return Err(e.into()),
                    }

                    let previous = exam_attempts::table
                        .filter(exam_attempts::user_id.eq(&booking.user_id))
                        .filter(exam_attempts::exam_id.eq(&exam_key))
                        .count()
                        .get_result::<i64>(conn)
                        .await?;
                    if previous >= max_attempts {
                        return Err(ApiError::Conflict(format!(
                            "Maximum of {max_attempts} attempt(s) reached for this exam"
                        )));
                    }

                    let attempt = ExamAttempt {
                        id: new_id(),
                        user_id: booking.user_id.clone(),
                        exam_id: exam_key.clone(),
                        booking_id: booking.id.clone(),
                        status: AttemptStatus::InProgress.into(),
                        started_at: ts,
                        submitted_at: None,
                        score: None,
                        percentage: None,
                        passed: None,
                    };
                    let created = diesel::insert_into(exam_attempts::table)
                        .values(&attempt)
                        .get_result::<ExamAttempt>(conn)
                        .await
                        .map_err(|e| {
                            ApiError::conflict_on_unique(
                                e,
                                "An attempt on this booking is already in progress",
                            )
                        })?;
                    Ok((created, true))
                }
                .scope_boxed()
            })
            .await?;

        if created {
            info!("Attempt {} started by {}", attempt.id, user.id);
            self.record_audit(AuditLog::new(
                Some(&user.id),
                "attempt.started",
                "attempt",
                Some(&attempt.id),
                Some(&serde_json::json!({ "exam_id": exam.id })),
            ))
            .await;
        }

        Ok(StartedAttempt {
            ends_at: attempt_ends_at(attempt.started_at, exam.duration_minutes),
            attempt,
            questions: questions.iter().map(CandidateQuestion::from).collect(),
        })
    }

    /// Grades the answers, completes the booking and issues a certificate on a pass
    pub async fn submit_attempt(
        &self,
        user: &User,
        attempt_id: &str,
        params: &SubmitAttemptParams,
    ) -> Result<AttemptResult> {
        use crate::schema::{certificates, exam_attempts, question_responses};

        let attempt = self.get_attempt(attempt_id).await?;
        if attempt.user_id != user.id {
            return Err(ApiError::Forbidden(ErrorMessages::Forbidden.to_string()));
        }
        if attempt.status()?.is_finished() {
            return Err(ApiError::Conflict("Attempt has already been submitted".to_string()));
        }

        let exam = self.get_exam(&attempt.exam_id).await?;
        let questions = self.get_questions_with_options(&exam.id).await?;

        let known: HashSet<&str> = questions.iter().map(|q| q.question.id.as_str()).collect();
        let mut unknown: Vec<&str> = params
            .answers
            .keys()
            .map(String::as_str)
            .filter(|key| !known.contains(key))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(ApiError::Validation(format!(
                "Unknown question id(s): {}",
                unknown.join(", ")
            )));
        }

        let submitted_at = now();
        let mut responses = Vec::with_capacity(questions.len());
        for question in &questions {
            let answer = params.answers.get(&question.question.id);
            let outcome = grade_question(question, answer)?;
            responses.push(QuestionResponse {
                id: new_id(),
                attempt_id: attempt.id.clone(),
                question_id: question.question.id.clone(),
                selected_option_ids: answer
                    .map(|a| a.selected_option_ids.clone())
                    .unwrap_or_default(),
                answer_text: answer.and_then(|a| a.answer_text.clone()),
                is_correct: outcome.is_correct,
                marks_awarded: outcome.marks_awarded,
                feedback: outcome.feedback,
                created_at: submitted_at,
            });
        }

        let awarded: Vec<f64> = responses.iter().map(|r| r.marks_awarded).collect();
        let score = summarize(&awarded, exam.total_marks, exam.passing_marks);
        let final_status = submission_status(attempt.started_at, exam.duration_minutes, submitted_at);

        let certificate = score.passed.then(|| {
            let cert_id = new_id();
            Certificate {
                certificate_number: certificate_number(submitted_at, &cert_id),
                id: cert_id,
                user_id: user.id.clone(),
                exam_id: exam.id.clone(),
                attempt_id: attempt.id.clone(),
                percentage: score.percentage,
                issued_at: submitted_at,
            }
        });

        let conn = &mut self.get_db_conn().await?;
        let attempt_key = attempt.id.clone();
        let booking_key = attempt.booking_id.clone();
        let (graded, responses, certificate) = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let graded = diesel::update(
                        exam_attempts::table
                            .filter(exam_attempts::id.eq(&attempt_key))
                            .filter(exam_attempts::status.eq(AttemptStatus::InProgress.as_str())),
                    )
                    .set((
                        exam_attempts::status.eq(final_status.as_str()),
                        exam_attempts::submitted_at.eq(Some(submitted_at)),
                        exam_attempts::score.eq(Some(score.score)),
                        exam_attempts::percentage.eq(Some(score.percentage)),
                        exam_attempts::passed.eq(Some(score.passed)),
                    ))
                    .get_result::<ExamAttempt>(conn)
                    .await
                    .map_err(|e| match e {
                        diesel::result::Error::NotFound => {
                            ApiError::Conflict("Attempt has already been submitted".to_string())
                        }
                        e => e.into(),
                    })?;

                    if !responses.is_empty() {
                        diesel::insert_into(question_responses::table)
                            .values(&responses)
                            .execute(conn)
                            .await?;
                    }

                    set_booking_status(
                        conn,
                        &booking_key,
                        BookingStatus::Confirmed,
                        BookingStatus::Completed,
                    )
                    .await?;

                    if let Some(cert) = &certificate {
                        diesel::insert_into(certificates::table)
                            .values(cert)
                            .execute(conn)
                            .await?;
                    }
                    Ok((graded, responses, certificate))
                }
                .scope_boxed()
            })
            .await?;

        info!(
            "Attempt {} graded: {} / {} ({}%)",
            graded.id, score.score, exam.total_marks, score.percentage
        );
        self.record_audit(AuditLog::new(
            Some(&user.id),
            "attempt.submitted",
            "attempt",
            Some(&graded.id),
            Some(&serde_json::json!({
                "status": graded.status,
                "score": score.score,
                "percentage": score.percentage,
                "passed": score.passed,
            })),
        ))
        .await;
        if let Some(cert) = &certificate {
            self.record_audit(AuditLog::new(
                Some(&user.id),
                "certificate.issued",
                "certificate",
                Some(&cert.id),
                Some(&serde_json::json!({ "certificate_number": cert.certificate_number })),
            ))
            .await;
        }

        Ok(AttemptResult {
            attempt: graded,
            exam_title: exam.title,
            total_marks: exam.total_marks,
            passing_marks: exam.passing_marks,
            responses,
            certificate,
        })
    }

    /// Attempt with its graded responses and certificate, if any
    pub async fn get_attempt_result(&self, attempt_id: &str) -> Result<AttemptResult> {
        use crate::schema::{certificates, question_responses};

        let attempt = self.get_attempt(attempt_id).await?;
        let exam = self.get_exam(&attempt.exam_id).await?;

        let conn = &mut self.get_db_conn().await?;
        let responses = question_responses::table
            .filter(question_responses::attempt_id.eq(&attempt.id))
            .order(question_responses::created_at.asc())
            .load::<QuestionResponse>(conn)
            .await?;
        let certificate = match certificates::table
            .filter(certificates::attempt_id.eq(&attempt.id))
            .first::<Certificate>(conn)
            .await
        {
            Ok(cert) => Some(cert),
            Err(diesel::result::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        Ok(AttemptResult {
            attempt,
            exam_title: exam.title,
            total_marks: exam.total_marks,
            passing_marks: exam.passing_marks,
            responses,
            certificate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_attempt_ends_at() {
        assert_eq!(attempt_ends_at(at(9, 0), 90), at(10, 30));
    }

    #[test]
    fn test_submission_status_grace_period() {
        let started = at(9, 0);
        assert_eq!(submission_status(started, 30, at(9, 29)), AttemptStatus::Submitted);
        assert_eq!(submission_status(started, 30, at(9, 32)), AttemptStatus::Submitted);
        assert_eq!(submission_status(started, 30, at(9, 33)), AttemptStatus::TimedOut);
    }

    use crate::db::models::Role;
    use crate::db::test_support::*;

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_passing_attempt_issues_certificate() {
        let client = test_client();
        let admin = create_user(&client, Role::Admin).await;
        let student = create_user(&client, Role::Student).await;
        let fixture = published_exam(&client, &admin, 0, 2).await;
        let booking = book(&client, &student, &fixture.exam).await;

        let early = client.start_attempt(&student, &booking.id).await;
        assert!(matches!(early, Err(ApiError::Validation(_))));

        open_booking_slot(&client, &booking.id).await;
        let started = client.start_attempt(&student, &booking.id).await.unwrap();
        assert_eq!(started.questions.len(), 1);
        assert_eq!(
            started.ends_at,
            attempt_ends_at(started.attempt.started_at, fixture.exam.duration_minutes)
        );

        // Starting again resumes the same attempt
        let resumed = client.start_attempt(&student, &booking.id).await.unwrap();
        assert_eq!(resumed.attempt.id, started.attempt.id);

        let result = client
            .submit_attempt(&student, &started.attempt.id, &fixture.answer(fixture.correct_option()))
            .await
            .unwrap();
        assert_eq!(result.attempt.status().unwrap(), AttemptStatus::Submitted);
        assert_eq!(result.attempt.score, Some(4.0));
        assert_eq!(result.attempt.passed, Some(true));
        assert_eq!(result.responses.len(), 1);
        let certificate = result.certificate.unwrap();
        assert_eq!(certificate.attempt_id, started.attempt.id);

        let booking = client.get_booking(&booking.id).await.unwrap();
        assert_eq!(booking.status().unwrap(), BookingStatus::Completed);

        let twice = client
            .submit_attempt(&student, &started.attempt.id, &fixture.answer(fixture.correct_option()))
            .await;
        assert!(matches!(twice, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_concurrent_starts_share_one_attempt() {
        use crate::schema::exam_attempts;

        let client = test_client();
        let admin = create_user(&client, Role::Admin).await;
        let student = create_user(&client, Role::Student).await;
        let fixture = published_exam(&client, &admin, 0, 3).await;
        let booking = book(&client, &student, &fixture.exam).await;
        open_booking_slot(&client, &booking.id).await;

        let (first, second) = tokio::join!(
            client.start_attempt(&student, &booking.id),
            client.start_attempt(&student, &booking.id)
        );
        let (first, second) = match (first, second) {
            (Ok(a), Ok(b)) => (a, b),
            _ => panic!("both starts should succeed"),
        };
        assert_eq!(first.attempt.id, second.attempt.id);

        let conn = &mut client.get_db_conn().await.unwrap();
        let running = exam_attempts::table
            .filter(exam_attempts::booking_id.eq(&booking.id))
            .count()
            .get_result::<i64>(conn)
            .await
            .unwrap();
        assert_eq!(running, 1);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_late_submission_is_timed_out() {
        let client = test_client();
        let admin = create_user(&client, Role::Admin).await;
        let student = create_user(&client, Role::Student).await;
        let fixture = published_exam(&client, &admin, 0, 1).await;
        let booking = book(&client, &student, &fixture.exam).await;
        open_booking_slot(&client, &booking.id).await;

        let started = client.start_attempt(&student, &booking.id).await.unwrap();
        let late = fixture.exam.duration_minutes as i64 + SUBMISSION_GRACE_MINUTES + 1;
        backdate_attempt(&client, &started.attempt.id, late).await;

        let result = client
            .submit_attempt(&student, &started.attempt.id, &fixture.answer(fixture.correct_option()))
            .await
            .unwrap();
        assert_eq!(result.attempt.status().unwrap(), AttemptStatus::TimedOut);
        assert_eq!(result.attempt.passed, Some(true));
    }
}
