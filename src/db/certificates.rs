use super::DbClient;
use crate::db::models::{Certificate, CertificateVerification};
use crate::errors::ApiError;
use crate::Result;
use diesel::{expression_methods::ExpressionMethods, query_dsl::QueryDsl};
use diesel_async::RunQueryDsl;

/// DbClient helper functions for the certificates table
impl DbClient {
    pub async fn list_certificates(&self, owner_id: &str) -> Result<Vec<Certificate>> {
        use crate::schema::certificates::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        certificates
            .filter(user_id.eq(owner_id))
            .order(issued_at.desc())
            .load::<Certificate>(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn get_certificate(&self, certificate_id: &str) -> Result<Certificate> {
        use crate::schema::certificates::dsl::*;

        let conn = &mut self.get_db_conn().await?;
        certificates
            .filter(id.eq(certificate_id))
            .first::<Certificate>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ApiError::not_found("Certificate"),
                e => e.into(),
            })
    }

    /// Public view of a certificate, looked up by its printed number
    pub async fn verify_certificate(&self, number: &str) -> Result<CertificateVerification> {
        use crate::schema::{certificates, exams, users};

        let conn = &mut self.get_db_conn().await?;
        let (cert, holder_name, exam_title) = certificates::table
            .inner_join(users::table)
            .inner_join(exams::table)
            .filter(certificates::certificate_number.eq(number.trim().to_uppercase()))
            .select((
                certificates::all_columns,
                users::full_name,
                exams::title,
            ))
            .first::<(Certificate, String, String)>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ApiError::not_found("Certificate"),
                e => e.into(),
            })?;

        Ok(CertificateVerification {
            certificate_number: cert.certificate_number,
            holder_name,
            exam_title,
            percentage: cert.percentage,
            issued_at: cert.issued_at,
        })
    }
}
