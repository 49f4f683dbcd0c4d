use crate::api::extractors::CurrentUser;
use crate::db::analytics::revenue_window;
use crate::db::models::{
    ApiResponse, ExamAnalytics, MonthlyRevenue, Permission, PlatformOverview, RevenueParams,
    UserDashboard,
};
use crate::db::DbClient;
use crate::{Result, CONFIG};
use axum::extract::{Path, Query, State};

// Route handler for GET /api/analytics/overview
pub(crate) async fn get_overview(
    State(db): State<DbClient>,
    current: CurrentUser,
) -> Result<ApiResponse<PlatformOverview>> {
    current.require(Permission::ViewPlatformAnalytics)?;
    let overview = db.platform_overview(CONFIG.analytics_cache_seconds).await?;
    Ok(ApiResponse::ok(overview))
}

// Route handler for GET /api/analytics/revenue
pub(crate) async fn get_revenue(
    State(db): State<DbClient>,
    current: CurrentUser,
    Query(params): Query<RevenueParams>,
) -> Result<ApiResponse<Vec<MonthlyRevenue>>> {
    current.require(Permission::ViewPlatformAnalytics)?;
    let months = revenue_window(params.months);
    Ok(ApiResponse::ok(db.monthly_revenue(months).await?))
}

// Route handler for GET /api/analytics/exams/:id
pub(crate) async fn get_exam_analytics(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<ApiResponse<ExamAnalytics>> {
    current.require(Permission::ViewAnalytics)?;
    Ok(ApiResponse::ok(db.exam_analytics(&exam_id).await?))
}

// Route handler for GET /api/analytics/dashboard
pub(crate) async fn get_user_dashboard(
    State(db): State<DbClient>,
    current: CurrentUser,
) -> Result<ApiResponse<UserDashboard>> {
    Ok(ApiResponse::ok(db.user_dashboard(current.id()).await?))
}
