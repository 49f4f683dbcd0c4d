use crate::db::models::{PageParams, PaginationMeta};
use chrono::NaiveDateTime;

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Resolved pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn meta(&self, total: i64) -> PaginationMeta {
        let total_pages = if total == 0 {
            0
        } else {
            (total + self.per_page - 1) / self.per_page
        };
        PaginationMeta {
            total,
            page: self.page,
            total_pages,
            items_per_page: self.per_page,
            has_next_page: self.page < total_pages,
            has_prev_page: self.page > 1,
        }
    }
}

impl From<&PageParams> for Page {
    fn from(params: &PageParams) -> Self {
        Page {
            page: params.page.unwrap_or(1).max(1),
            per_page: params
                .per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        }
    }
}

/// Lower-cases, trims and collapses inner whitespace
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `CERT-YYYYMMDD-XXXXXXXX`
pub fn certificate_number(issued_at: NaiveDateTime, id: &str) -> String {
    format!("CERT-{}-{}", issued_at.format("%Y%m%d"), short_code(id))
}

/// `INV-YYYYMMDD-XXXXXXXX`
pub fn invoice_number(paid_at: NaiveDateTime, payment_id: &str) -> String {
    format!("INV-{}-{}", paid_at.format("%Y%m%d"), short_code(payment_id))
}

fn short_code(id: &str) -> String {
    id.chars()
        .filter(char::is_ascii_hexdigit)
        .take(8)
        .collect::<String>()
        .to_uppercase()
}

/// Renders minor units as `12.50 USD`
pub fn format_amount(amount_cents: i64, currency: &str) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_page_defaults_and_clamping() {
        let page = Page::from(&PageParams::default());
        assert_eq!(page, Page { page: 1, per_page: 20 });
        assert_eq!(page.offset(), 0);

        let page = Page::from(&PageParams {
            page: Some(-3),
            per_page: Some(1000),
        });
        assert_eq!(page, Page { page: 1, per_page: 100 });

        let page = Page::from(&PageParams {
            page: Some(3),
            per_page: Some(0),
        });
        assert_eq!(page, Page { page: 3, per_page: 1 });
        assert_eq!(page.offset(), 2);
    }

    #[test]
    fn test_pagination_meta() {
        let page = Page { page: 2, per_page: 20 };
        let meta = page.meta(45);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(meta.has_prev_page);

        let meta = Page { page: 1, per_page: 20 }.meta(0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next_page);
        assert!(!meta.has_prev_page);

        let meta = Page { page: 3, per_page: 20 }.meta(60);
        assert!(!meta.has_next_page);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello   World\n"), "hello world");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(33.333333), 33.33);
        assert_eq!(round2(66.666666), 66.67);
    }

    #[test]
    fn test_document_numbers() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let id = "3f2a9c1b-77de-4b7a-9b1e-0c2d4e6f8a10";
        assert_eq!(certificate_number(at, id), "CERT-20240309-3F2A9C1B");
        assert_eq!(invoice_number(at, id), "INV-20240309-3F2A9C1B");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1250, "USD"), "12.50 USD");
        assert_eq!(format_amount(5, "EUR"), "0.05 EUR");
        assert_eq!(format_amount(0, "USD"), "0.00 USD");
    }
}
