//! Dashboard aggregation.

use super::DbClient;
use crate::db::models::{
    now, AttemptStatus, BookingStatus, BookingSummary, CountByKey, ExamAnalytics, MonthlyRevenue,
    PaymentStatus, PlatformOverview, QuestionStats, UserDashboard,
};
use crate::services::misc::round2;
use crate::Result;
use chrono::{Datelike, NaiveDate};
use diesel::{
    dsl::{avg as avg_of, count_star, max as max_of},
    expression_methods::ExpressionMethods,
    query_dsl::QueryDsl,
    sql_query,
    sql_types::{BigInt, Double, Integer, Nullable, Text},
    QueryableByName,
};
use diesel_async::RunQueryDsl;
use std::collections::HashMap;
use tracing::{info, warn};

pub const OVERVIEW_CACHE_KEY: &str = "analytics:overview";
pub const DEFAULT_REVENUE_MONTHS: i64 = 12;
pub const MAX_REVENUE_MONTHS: i64 = 36;
const UPCOMING_BOOKINGS_LIMIT: i64 = 5;

#[derive(QueryableByName)]
struct TotalRow {
    #[diesel(sql_type = BigInt)]
    total: i64,
}

#[derive(QueryableByName)]
struct MonthRow {
    #[diesel(sql_type = Text)]
    month: String,
    #[diesel(sql_type = BigInt)]
    revenue_cents: i64,
    #[diesel(sql_type = BigInt)]
    payments: i64,
}

#[derive(QueryableByName)]
struct ExamSummaryRow {
    #[diesel(sql_type = BigInt)]
    attempts: i64,
    #[diesel(sql_type = Nullable<Double>)]
    average_percentage: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    highest_percentage: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    lowest_percentage: Option<f64>,
    #[diesel(sql_type = BigInt)]
    passed: i64,
}

#[derive(QueryableByName)]
struct QuestionStatsRow {
    #[diesel(sql_type = Text)]
    question_id: String,
    #[diesel(sql_type = Text)]
    text: String,
    #[diesel(sql_type = BigInt)]
    responses: i64,
    #[diesel(sql_type = BigInt)]
    correct: i64,
    #[diesel(sql_type = Nullable<Double>)]
    average_marks: Option<f64>,
}

/// Share of `part` in `whole` as a percentage, `None` when there is nothing to measure
pub fn rate(part: i64, whole: i64) -> Option<f64> {
    (whole > 0).then(|| round2(part as f64 / whole as f64 * 100.0))
}

/// Clamps the requested revenue window to 1..=36 months
pub fn revenue_window(months: Option<i64>) -> i64 {
    months
        .unwrap_or(DEFAULT_REVENUE_MONTHS)
        .clamp(1, MAX_REVENUE_MONTHS)
}

/// One entry per calendar month ending with the month of `today`, oldest first.
/// Months without payments are reported with zero revenue.
pub fn fill_months(rows: Vec<MonthlyRevenue>, today: NaiveDate, months: i64) -> Vec<MonthlyRevenue> {
    let mut by_month: HashMap<String, MonthlyRevenue> =
        rows.into_iter().map(|r| (r.month.clone(), r)).collect();

    let current = today.year() as i64 * 12 + today.month0() as i64;
    (0..months)
        .rev()
        .map(|back| {
            let index = current - back;
            let key = format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1);
            by_month.remove(&key).unwrap_or(MonthlyRevenue {
                month: key,
                revenue_cents: 0,
                payments: 0,
            })
        })
        .collect()
}

fn to_counts(rows: Vec<(String, i64)>) -> Vec<CountByKey> {
    let mut counts: Vec<CountByKey> = rows
        .into_iter()
        .map(|(key, count)| CountByKey { key, count })
        .collect();
    counts.sort_by(|a, b| a.key.cmp(&b.key));
    counts
}

/// DbClient helper functions for dashboard analytics
impl DbClient {
    /// Platform totals, served from Redis while fresh
    pub async fn platform_overview(&self, cache_seconds: u64) -> Result<PlatformOverview> {
        if let Ok(cached) = self.get_cache(OVERVIEW_CACHE_KEY).await {
            match serde_json::from_str::<PlatformOverview>(&cached) {
                Ok(overview) => {
                    info!("Cache hit for platform overview");
                    return Ok(overview);
                }
                Err(_) => warn!("Cached overview failed to deserialize, recomputing"),
            }
        }

        let overview = self.compute_platform_overview().await?;
        match serde_json::to_string(&overview) {
            Ok(serialized) => {
                if let Err(e) = self
                    .set_cache(OVERVIEW_CACHE_KEY, &serialized, cache_seconds)
                    .await
                {
                    warn!("Failed to cache platform overview: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize platform overview: {}", e),
        }
        Ok(overview)
    }

    /// Drops the cached totals after money moves so revenue is not reported stale
    pub async fn invalidate_platform_overview(&self) {
        if let Err(e) = self.invalidate_cache(OVERVIEW_CACHE_KEY).await {
            warn!("Failed to invalidate platform overview: {}", e);
        }
    }

    async fn compute_platform_overview(&self) -> Result<PlatformOverview> {
        use crate::schema::{certificates, exam_attempts, exam_bookings, exams, users};

        let conn = &mut self.get_db_conn().await?;

        let users_by_role = users::table
            .group_by(users::role)
            .select((users::role, count_star()))
            .load::<(String, i64)>(conn)
            .await?;
        let total_exams = exams::table.count().get_result::<i64>(conn).await?;
        let published_exams = exams::table
            .filter(exams::is_published.eq(true))
            .count()
            .get_result::<i64>(conn)
            .await?;
        let bookings_by_status = exam_bookings::table
            .group_by(exam_bookings::status)
            .select((exam_bookings::status, count_star()))
            .load::<(String, i64)>(conn)
            .await?;

        let revenue = sql_query(
            "SELECT COALESCE(SUM(amount_cents), 0)::BIGINT AS total FROM payments WHERE status = $1",
        )
        .bind::<Text, _>(PaymentStatus::Completed.as_str())
        .get_result::<TotalRow>(conn)
        .await?;

        let graded = exam_attempts::table
            .filter(exam_attempts::status.ne(AttemptStatus::InProgress.as_str()));
        let total_attempts = graded.clone().count().get_result::<i64>(conn).await?;
        let average_percentage = graded
            .clone()
            .select(avg_of(exam_attempts::percentage))
            .first::<Option<f64>>(conn)
            .await?;
        let passed = graded
            .filter(exam_attempts::passed.eq(true))
            .count()
            .get_result::<i64>(conn)
            .await?;
        let certificates_issued = certificates::table.count().get_result::<i64>(conn).await?;

        Ok(PlatformOverview {
            users_by_role: to_counts(users_by_role),
            total_exams,
            published_exams,
            bookings_by_status: to_counts(bookings_by_status),
            revenue_cents: revenue.total,
            total_attempts,
            average_percentage: average_percentage.map(round2),
            pass_rate: rate(passed, total_attempts),
            certificates_issued,
        })
    }

    /// Completed revenue per calendar month over the last `months` months
    pub async fn monthly_revenue(&self, months: i64) -> Result<Vec<MonthlyRevenue>> {
        let conn = &mut self.get_db_conn().await?;
        let rows = sql_query(
            r#"
            SELECT
                to_char(date_trunc('month', paid_at), 'YYYY-MM') AS month,
                COALESCE(SUM(amount_cents), 0)::BIGINT AS revenue_cents,
                COUNT(*) AS payments
            FROM payments
            WHERE status = $1
              AND paid_at IS NOT NULL
              AND paid_at >= date_trunc('month', $2::timestamp) - make_interval(months => $3)
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind::<Text, _>(PaymentStatus::Completed.as_str())
        .bind::<diesel::sql_types::Timestamp, _>(now())
        .bind::<Integer, _>((months - 1) as i32)
        .load::<MonthRow>(conn)
        .await?;

        let rows = rows
            .into_iter()
            .map(|r| MonthlyRevenue {
                month: r.month,
                revenue_cents: r.revenue_cents,
                payments: r.payments,
            })
            .collect();
        Ok(fill_months(rows, now().date(), months))
    }

    pub async fn exam_analytics(&self, exam_id: &str) -> Result<ExamAnalytics> {
        let exam = self.get_exam(exam_id).await?;
        let conn = &mut self.get_db_conn().await?;

        let summary = sql_query(
            r#"
            SELECT
                COUNT(*) AS attempts,
                AVG(percentage) AS average_percentage,
                MAX(percentage) AS highest_percentage,
                MIN(percentage) AS lowest_percentage,
                COUNT(*) FILTER (WHERE passed) AS passed
            FROM exam_attempts
            WHERE exam_id = $1 AND status <> $2
            "#,
        )
        .bind::<Text, _>(exam.id.as_str())
        .bind::<Text, _>(AttemptStatus::InProgress.as_str())
        .get_result::<ExamSummaryRow>(conn)
        .await?;

        let questions = sql_query(
            r#"
            SELECT
                q.id AS question_id,
                q.text AS text,
                COUNT(r.id) AS responses,
                COUNT(r.id) FILTER (WHERE r.is_correct) AS correct,
                AVG(r.marks_awarded) AS average_marks
            FROM questions q
            LEFT JOIN question_responses r ON r.question_id = q.id
            WHERE q.exam_id = $1
            GROUP BY q.id, q.text, q.position
            ORDER BY q.position
            "#,
        )
        .bind::<Text, _>(exam.id.as_str())
        .load::<QuestionStatsRow>(conn)
        .await?;

        Ok(ExamAnalytics {
            exam_id: exam.id,
            title: exam.title,
            attempts: summary.attempts,
            average_percentage: summary.average_percentage.map(round2),
            highest_percentage: summary.highest_percentage,
            lowest_percentage: summary.lowest_percentage,
            pass_rate: rate(summary.passed, summary.attempts),
            questions: questions
                .into_iter()
                .map(|q| QuestionStats {
                    question_id: q.question_id,
                    text: q.text,
                    responses: q.responses,
                    correct_rate: rate(q.correct, q.responses),
                    average_marks: q.average_marks.map(round2),
                })
                .collect(),
        })
    }

    /// Personal numbers shown to any signed in user
    pub async fn user_dashboard(&self, owner_id: &str) -> Result<UserDashboard> {
        use crate::schema::{certificates, exam_attempts, exam_bookings, exams};

        let conn = &mut self.get_db_conn().await?;
        let active_codes = vec![BookingStatus::Pending.as_str(), BookingStatus::Confirmed.as_str()];
        let upcoming = exam_bookings::table
            .inner_join(exams::table)
            .filter(exam_bookings::user_id.eq(owner_id))
            .filter(exam_bookings::status.eq_any(active_codes))
            .filter(exam_bookings::scheduled_at.ge(now()))
            .order(exam_bookings::scheduled_at.asc())
            .limit(UPCOMING_BOOKINGS_LIMIT)
            .select((
                exam_bookings::id,
                exams::title,
                exam_bookings::scheduled_at,
                exam_bookings::status,
            ))
            .load::<(String, String, chrono::NaiveDateTime, String)>(conn)
            .await?;

        let graded = exam_attempts::table
            .filter(exam_attempts::user_id.eq(owner_id))
            .filter(exam_attempts::status.ne(AttemptStatus::InProgress.as_str()));
        let total_attempts = graded.clone().count().get_result::<i64>(conn).await?;
        let average_percentage = graded
            .clone()
            .select(avg_of(exam_attempts::percentage))
            .first::<Option<f64>>(conn)
            .await?;
        let best_percentage = graded
            .clone()
            .select(max_of(exam_attempts::percentage))
            .first::<Option<f64>>(conn)
            .await?;
        let certificate_count = certificates::table
            .filter(certificates::user_id.eq(owner_id))
            .count()
            .get_result::<i64>(conn)
            .await?;

        Ok(UserDashboard {
            upcoming_bookings: upcoming
                .into_iter()
                .map(|(booking_id, exam_title, scheduled_at, status)| BookingSummary {
                    booking_id,
                    exam_title,
                    scheduled_at,
                    status,
                })
                .collect(),
            total_attempts,
            average_percentage: average_percentage.map(round2),
            best_percentage,
            certificates: certificate_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate() {
        assert_eq!(rate(0, 0), None);
        assert_eq!(rate(1, 3), Some(33.33));
        assert_eq!(rate(4, 4), Some(100.0));
    }

    #[test]
    fn test_revenue_window() {
        assert_eq!(revenue_window(None), 12);
        assert_eq!(revenue_window(Some(0)), 1);
        assert_eq!(revenue_window(Some(60)), 36);
        assert_eq!(revenue_window(Some(6)), 6);
    }

    #[test]
    fn test_fill_months_across_year_boundary() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        let rows = vec![MonthlyRevenue {
            month: "2023-12".into(),
            revenue_cents: 5000,
            payments: 2,
        }];

        let filled = fill_months(rows, today, 4);
        let months: Vec<&str> = filled.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert_eq!(filled[1].revenue_cents, 5000);
        assert_eq!(filled[1].payments, 2);
        assert_eq!(filled[0].revenue_cents, 0);
        assert_eq!(filled[3].payments, 0);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_dashboard_aggregates_graded_attempts() {
        use crate::db::models::Role;
        use crate::db::test_support::*;

        let client = test_client();
        let admin = create_user(&client, Role::Admin).await;
        let student = create_user(&client, Role::Student).await;

        let passed = published_exam(&client, &admin, 0, 1).await;
        let failed = published_exam(&client, &admin, 0, 1).await;
        for (fixture, option) in [
            (&passed, passed.correct_option()),
            (&failed, failed.wrong_option()),
        ] {
            let booking = book(&client, &student, &fixture.exam).await;
            open_booking_slot(&client, &booking.id).await;
            let started = client.start_attempt(&student, &booking.id).await.unwrap();
            client
                .submit_attempt(&student, &started.attempt.id, &fixture.answer(option))
                .await
                .unwrap();
        }
        let upcoming = published_exam(&client, &admin, 900, 1).await;
        let pending = book(&client, &student, &upcoming.exam).await;

        let dashboard = client.user_dashboard(&student.id).await.unwrap();
        assert_eq!(dashboard.total_attempts, 2);
        assert_eq!(dashboard.average_percentage, Some(50.0));
        assert_eq!(dashboard.best_percentage, Some(100.0));
        assert_eq!(dashboard.certificates, 1);
        assert_eq!(dashboard.upcoming_bookings.len(), 1);
        assert_eq!(dashboard.upcoming_bookings[0].booking_id, pending.id);

        let stats = client.exam_analytics(&passed.exam.id).await.unwrap();
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.highest_percentage, Some(100.0));
        assert_eq!(stats.pass_rate, Some(100.0));
        assert_eq!(stats.questions[0].correct_rate, Some(100.0));
    }
}
