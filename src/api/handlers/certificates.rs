use super::pdf_response;
use crate::api::extractors::CurrentUser;
use crate::db::models::{ApiResponse, Certificate, CertificateVerification, Permission};
use crate::db::DbClient;
use crate::services::pdf::{render_certificate, CertificateData};
use crate::{Result, CONFIG};
use axum::extract::{Path, State};
use axum::response::Response;

// Route handler for GET /api/certificates
pub(crate) async fn list_certificates(
    State(db): State<DbClient>,
    current: CurrentUser,
) -> Result<ApiResponse<Vec<Certificate>>> {
    Ok(ApiResponse::ok(db.list_certificates(current.id()).await?))
}

// Route handler for GET /api/certificates/:id/pdf
pub(crate) async fn download_certificate(
    State(db): State<DbClient>,
    current: CurrentUser,
    Path(certificate_id): Path<String>,
) -> Result<Response> {
    let certificate = db.get_certificate(&certificate_id).await?;
    current.require_owner_or(&certificate.user_id, Permission::ManageUsers)?;

    let holder = db.get_user(&certificate.user_id).await?;
    let exam = db.get_exam(&certificate.exam_id).await?;
    let bytes = render_certificate(&CertificateData {
        organization: CONFIG.organization_name.clone(),
        certificate_number: certificate.certificate_number.clone(),
        holder_name: holder.full_name,
        exam_title: exam.title,
        percentage: certificate.percentage,
        issued_at: certificate.issued_at,
    })?;

    Ok(pdf_response(&certificate.certificate_number, bytes))
}

// Route handler for GET /api/certificates/verify/:number
pub(crate) async fn verify_certificate(
    State(db): State<DbClient>,
    Path(number): Path<String>,
) -> Result<ApiResponse<CertificateVerification>> {
    let verification = db.verify_certificate(&number).await?;
    Ok(ApiResponse::ok(verification).with_message("Certificate is valid"))
}
