use crate::api::extractors::CurrentUser;
use crate::db::models::{ApiResponse, AuditLog, AuditLogFilterParams, PageParams, Permission};
use crate::db::DbClient;
use crate::services::misc::Page;
use crate::Result;
use axum::extract::{Query, State};

// Route handler for GET /api/admin/audit-logs
pub(crate) async fn list_audit_logs(
    State(db): State<DbClient>,
    current: CurrentUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<AuditLogFilterParams>,
) -> Result<ApiResponse<Vec<AuditLog>>> {
    current.require(Permission::ManageUsers)?;
    let page = Page::from(&page);
    let (entries, total) = db.list_audit_logs(&filter, page).await?;
    Ok(ApiResponse::page(entries, page.meta(total)))
}
