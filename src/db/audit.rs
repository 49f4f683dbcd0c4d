use super::DbClient;
use crate::db::models::{AuditLog, AuditLogFilterParams};
use crate::logging::log_audit;
use crate::services::misc::Page;
use crate::Result;
use diesel::{expression_methods::ExpressionMethods, pg::Pg, query_dsl::QueryDsl};
use diesel_async::RunQueryDsl;
use tracing::error;

/// DbClient helper functions for the audit_logs table
impl DbClient {
    /// Persists an audit entry and mirrors it to the audit log target.
    /// A failed insert is logged and never fails the calling operation.
    pub async fn record_audit(&self, entry: AuditLog) {
        let details = entry
            .details
            .as_deref()
            .and_then(|d| serde_json::from_str::<serde_json::Value>(d).ok());
        let entity = match &entry.entity_id {
            Some(entity_id) => format!("{}:{}", entry.entity_type, entity_id),
            None => entry.entity_type.clone(),
        };
        log_audit(entry.user_id.as_deref(), &entry.action, &entity, details.as_ref());

        if let Err(e) = self.insert_audit_log(&entry).await {
            error!("Failed to store audit entry {}: {}", entry.action, e);
        }
    }

    async fn insert_audit_log(&self, entry: &AuditLog) -> Result<()> {
        use crate::schema::audit_logs::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        diesel::insert_into(audit_logs)
            .values(entry)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn list_audit_logs(
        &self,
        filter: &AuditLogFilterParams,
        page: Page,
    ) -> Result<(Vec<AuditLog>, i64)> {
        use crate::schema::audit_logs::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        let total = filtered_audit_logs(filter)
            .count()
            .get_result::<i64>(conn)
            .await?;
        let rows = filtered_audit_logs(filter)
            .order(created_at.desc())
            .limit(page.per_page)
            .offset(page.offset())
            .load::<AuditLog>(conn)
            .await?;
        Ok((rows, total))
    }
}

fn filtered_audit_logs(
    filter: &AuditLogFilterParams,
) -> crate::schema::audit_logs::BoxedQuery<'static, Pg> {
    use crate::schema::audit_logs;

    let mut query = audit_logs::table.into_boxed();
    if let Some(kind) = filter.entity_type.as_deref().filter(|s| !s.is_empty()) {
        query = query.filter(audit_logs::entity_type.eq(kind.to_string()));
    }
    query
}
