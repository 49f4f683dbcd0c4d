//! Invoice and certificate rendering.

use crate::{errors::ApiError, Result};
use chrono::NaiveDateTime;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

const A4_WIDTH: f32 = 210.0;
const A4_HEIGHT: f32 = 297.0;
const LEFT_MARGIN: f32 = 20.0;

/// Data printed on a bill
#[derive(Debug, Clone)]
pub struct InvoiceData {
    pub organization: String,
    pub invoice_number: String,
    pub issued_at: NaiveDateTime,
    pub customer_name: String,
    pub customer_email: String,
    pub exam_title: String,
    pub scheduled_at: NaiveDateTime,
    pub payment_method: String,
    pub transaction_ref: Option<String>,
    pub amount: String,
    pub status: String,
}

/// Data printed on a certificate
#[derive(Debug, Clone)]
pub struct CertificateData {
    pub organization: String,
    pub certificate_number: String,
    pub holder_name: String,
    pub exam_title: String,
    pub percentage: f64,
    pub issued_at: NaiveDateTime,
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Writes left aligned lines top to bottom
struct Cursor<'a> {
    layer: &'a PdfLayerReference,
    fonts: &'a Fonts,
    y: f32,
}

impl<'a> Cursor<'a> {
    fn heading(&mut self, text: &str, size: f32) {
        self.layer
            .use_text(text, size, Mm(LEFT_MARGIN), Mm(self.y), &self.fonts.bold);
        self.y -= size * 0.6;
    }

    fn line(&mut self, text: &str) {
        self.layer
            .use_text(text, 11.0, Mm(LEFT_MARGIN), Mm(self.y), &self.fonts.regular);
        self.y -= 7.0;
    }

    fn field(&mut self, label: &str, value: &str) {
        self.layer
            .use_text(label, 11.0, Mm(LEFT_MARGIN), Mm(self.y), &self.fonts.bold);
        self.layer
            .use_text(value, 11.0, Mm(LEFT_MARGIN + 50.0), Mm(self.y), &self.fonts.regular);
        self.y -= 7.0;
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }
}

fn render<F>(title: &str, draw: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut Cursor<'_>),
{
    let (doc, page, layer) = PdfDocument::new(title, Mm(A4_WIDTH), Mm(A4_HEIGHT), "Layer 1");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ApiError::Pdf(e.to_string()))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ApiError::Pdf(e.to_string()))?,
    };
    let layer = doc.get_page(page).get_layer(layer);

    let mut cursor = Cursor {
        layer: &layer,
        fonts: &fonts,
        y: A4_HEIGHT - 25.0,
    };
    draw(&mut cursor);

    doc.save_to_bytes().map_err(|e| ApiError::Pdf(e.to_string()))
}

pub fn render_invoice(data: &InvoiceData) -> Result<Vec<u8>> {
    render(&format!("Invoice {}", data.invoice_number), |c| {
        c.heading(&data.organization, 20.0);
        c.heading("INVOICE", 14.0);
        c.gap(4.0);
        c.field("Invoice no.", &data.invoice_number);
        c.field("Date", &data.issued_at.format("%Y-%m-%d %H:%M UTC").to_string());
        c.field("Status", &data.status);
        c.gap(6.0);
        c.heading("Billed to", 12.0);
        c.line(&data.customer_name);
        c.line(&data.customer_email);
        c.gap(6.0);
        c.heading("Details", 12.0);
        c.field("Exam", &data.exam_title);
        c.field("Scheduled", &data.scheduled_at.format("%Y-%m-%d %H:%M UTC").to_string());
        c.field("Method", &data.payment_method);
        if let Some(reference) = &data.transaction_ref {
            c.field("Transaction", reference);
        }
        c.gap(6.0);
        c.field("Total", &data.amount);
    })
}

pub fn render_certificate(data: &CertificateData) -> Result<Vec<u8>> {
    render(&format!("Certificate {}", data.certificate_number), |c| {
        c.heading(&data.organization, 20.0);
        c.gap(10.0);
        c.heading("CERTIFICATE OF ACHIEVEMENT", 18.0);
        c.gap(10.0);
        c.line("This certifies that");
        c.heading(&data.holder_name, 16.0);
        c.line("has successfully passed the examination");
        c.heading(&data.exam_title, 14.0);
        c.line(&format!("with a score of {:.2}%", data.percentage));
        c.gap(10.0);
        c.field("Certificate no.", &data.certificate_number);
        c.field("Issued", &data.issued_at.format("%Y-%m-%d").to_string());
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_render_invoice() {
        let bytes = render_invoice(&InvoiceData {
            organization: "Mock Exam Center".into(),
            invoice_number: "INV-20240601-ABCDEF12".into(),
            issued_at: at(),
            customer_name: "Jane Doe".into(),
            customer_email: "jane@example.com".into(),
            exam_title: "Rust Fundamentals".into(),
            scheduled_at: at(),
            payment_method: "card".into(),
            transaction_ref: Some("txn_1234".into()),
            amount: "25.00 USD".into(),
            status: "completed".into(),
        })
        .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_certificate() {
        let bytes = render_certificate(&CertificateData {
            organization: "Mock Exam Center".into(),
            certificate_number: "CERT-20240601-ABCDEF12".into(),
            holder_name: "Jane Doe".into(),
            exam_title: "Rust Fundamentals".into(),
            percentage: 87.5,
            issued_at: at(),
        })
        .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
