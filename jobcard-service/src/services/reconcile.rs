//! Invoice-vs-scanned-file reconciliation.
//!
//! One side is the accounting provider's invoice list, the other the
//! file names sitting in the scanned-documents folder. Both sides are
//! reduced to normalized invoice numbers (trimmed, uppercased) before
//! set comparison, so case and stray whitespace never produce a false
//! mismatch.

use crate::models::InvoiceStatus;
use crate::services::providers::RemoteInvoice;
use chrono::NaiveDate;
use service_core::error::AppError;
use std::collections::HashSet;

/// Map a human currency selection onto an ISO code. Known aliases for
/// Kenyan shillings and US dollars are folded in; anything else is
/// passed through uppercased.
pub fn normalize_currency(selected: &str) -> String {
    let folded = selected.trim().to_lowercase();
    match folded.as_str() {
        "ksh" | "kes" | "kenyan shillings" | "kenyan shilling" => "KES".to_string(),
        "usd" | "dollars" | "dollar" | "us dollars" => "USD".to_string(),
        _ => selected.trim().to_uppercase(),
    }
}

/// How invoice numbers are carved out of scanned file names: find the
/// marker, keep everything from it up to the next dot.
#[derive(Debug, Clone)]
pub struct FilenameRule {
    pub marker: String,
}

impl Default for FilenameRule {
    fn default() -> Self {
        Self {
            marker: "INV".to_string(),
        }
    }
}

impl FilenameRule {
    /// Extract the normalized invoice number from a file name, or None
    /// when the marker is absent.
    pub fn extract(&self, file_name: &str) -> Option<String> {
        let upper = file_name.to_ascii_uppercase();
        let marker = self.marker.to_ascii_uppercase();
        let start = upper.find(&marker)?;
        let end = upper[start..]
            .find('.')
            .map(|offset| start + offset)
            .unwrap_or(upper.len());
        let number = upper[start..end].trim().to_string();
        if number.is_empty() {
            None
        } else {
            Some(number)
        }
    }
}

/// Parse client-supplied status filters, rejecting the whole request on
/// the first unknown value.
pub fn parse_status_filters(raw: &[String]) -> Result<Vec<InvoiceStatus>, AppError> {
    raw.iter()
        .map(|value| {
            InvoiceStatus::parse(value).ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("unknown invoice status filter `{}`", value))
            })
        })
        .collect()
}

fn status_matches(status: InvoiceStatus, filters: &[InvoiceStatus]) -> bool {
    if filters.is_empty() {
        // No filter means every non-draft invoice is in scope.
        return status != InvoiceStatus::Draft;
    }
    filters.iter().any(|filter| status.matches_filter(*filter))
}

/// Reduce the provider's invoice list to the normalized numbers that
/// fall inside the requested currency, status, and date window.
pub fn filter_invoice_numbers(
    invoices: &[RemoteInvoice],
    currency_code: &str,
    filters: &[InvoiceStatus],
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) -> Result<Vec<String>, AppError> {
    let mut numbers = Vec::new();
    for invoice in invoices {
        let status = InvoiceStatus::parse(&invoice.status).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "malformed provider payload: unrecognized status `{}` on invoice {}",
                invoice.status,
                invoice.invoice_number
            ))
        })?;

        if !currency_code.is_empty() && invoice.currency_code != currency_code {
            continue;
        }
        if !status_matches(status, filters) {
            continue;
        }
        // Date bounds only apply to invoices that carry a date.
        if let Some(date) = invoice.date {
            if date_from.is_some_and(|from| date < from) {
                continue;
            }
            if date_to.is_some_and(|to| date > to) {
                continue;
            }
        }

        numbers.push(invoice.invoice_number.trim().to_ascii_uppercase());
    }
    Ok(numbers)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub matched: usize,
    pub missing: Vec<String>,
}

/// Partition book numbers by presence in the scanned-file set. Every
/// book number lands in exactly one bucket; the missing list comes back
/// sorted.
pub fn classify(book_numbers: &[String], file_numbers: &[String]) -> Classification {
    let present: HashSet<&str> = file_numbers.iter().map(String::as_str).collect();

    let mut matched = 0;
    let mut missing = Vec::new();
    for number in book_numbers {
        if present.contains(number.as_str()) {
            matched += 1;
        } else {
            missing.push(number.clone());
        }
    }
    missing.sort();

    Classification { matched, missing }
}

pub fn report_subject(currency_code: &str, statuses: &[String], missing: usize) -> String {
    let scope = if statuses.is_empty() {
        "all".to_string()
    } else {
        statuses.join(", ")
    };
    format!(
        "Invoice reconciliation ({} / {}): {} missing",
        currency_code, scope, missing
    )
}

/// HTML body for the reconciliation report email. Long missing lists
/// are truncated; the full set is in the API response.
pub fn render_report_html(
    currency_code: &str,
    books_count: usize,
    files_count: usize,
    matched: usize,
    missing: &[String],
) -> String {
    const MAX_LISTED: usize = 40;

    let mut items = String::new();
    for number in missing.iter().take(MAX_LISTED) {
        items.push_str(&format!("<li>{}</li>", number));
    }
    if missing.len() > MAX_LISTED {
        items.push_str(&format!("<li>... and {} more</li>", missing.len() - MAX_LISTED));
    }
    let missing_section = if missing.is_empty() {
        "<p>All invoices have a scanned copy on file.</p>".to_string()
    } else {
        format!("<p>Missing scanned copies:</p><ul>{}</ul>", items)
    };

    format!(
        r#"<html><body>
<h2>Invoice Reconciliation Report</h2>
<p>Currency: <strong>{currency}</strong></p>
<table border="1" cellpadding="6" cellspacing="0">
<tr><td>Invoices in books</td><td>{books}</td></tr>
<tr><td>Scanned files</td><td>{files}</td></tr>
<tr><td>Matched</td><td>{matched}</td></tr>
<tr><td>Missing</td><td>{missing_count}</td></tr>
</table>
{missing_section}
</body></html>"#,
        currency = currency_code,
        books = books_count,
        files = files_count,
        matched = matched,
        missing_count = missing.len(),
        missing_section = missing_section,
    )
}

pub fn render_report_text(
    currency_code: &str,
    books_count: usize,
    files_count: usize,
    matched: usize,
    missing: &[String],
) -> String {
    let mut body = format!(
        "Invoice reconciliation report\nCurrency: {}\nInvoices in books: {}\nScanned files: {}\nMatched: {}\nMissing: {}\n",
        currency_code,
        books_count,
        files_count,
        matched,
        missing.len()
    );
    if !missing.is_empty() {
        body.push_str("\nMissing scanned copies:\n");
        for number in missing {
            body.push_str(&format!("  {}\n", number));
        }
    }
    body
}
