//! Invoice sync engine: pulls the authoritative invoice set from the
//! accounting provider and upserts it into the local store.
//!
//! Safe to run concurrently; upserts are keyed by external id and the
//! last writer wins. A failed run leaves earlier upserts in place, and
//! retrying is harmless.

use crate::models::{InvoiceStatus, SyncSummary, UpsertInvoice, UpsertOutcome};
use crate::services::metrics::{SYNC_RUNS, SYNC_UPSERTS};
use crate::services::providers::{AccountingProvider, InvoiceFilter, RemoteInvoice};
use crate::services::store::InvoiceStore;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::instrument;

#[instrument(skip(books, store))]
pub async fn sync_invoices(
    books: &dyn AccountingProvider,
    store: &dyn InvoiceStore,
) -> Result<SyncSummary, AppError> {
    let remote = match books.list_invoices(&InvoiceFilter::default()).await {
        Ok(remote) => remote,
        Err(e) => {
            SYNC_RUNS.with_label_values(&["provider_error"]).inc();
            return Err(e.into());
        }
    };

    let mut summary = SyncSummary {
        fetched: remote.len(),
        ..Default::default()
    };

    for invoice in remote {
        let upsert = match map_remote(&invoice) {
            Ok(upsert) => upsert,
            Err(e) => {
                // Earlier upserts stay persisted; a retry re-walks them
                // idempotently.
                SYNC_RUNS.with_label_values(&["malformed"]).inc();
                return Err(e);
            }
        };

        match store.upsert_invoice(&upsert).await? {
            UpsertOutcome::Created => {
                SYNC_UPSERTS.with_label_values(&["created"]).inc();
                summary.created += 1;
            }
            UpsertOutcome::Updated => {
                SYNC_UPSERTS.with_label_values(&["updated"]).inc();
                summary.updated += 1;
            }
        }
    }

    SYNC_RUNS.with_label_values(&["ok"]).inc();
    tracing::info!(
        fetched = summary.fetched,
        created = summary.created,
        updated = summary.updated,
        "Invoice sync completed"
    );
    Ok(summary)
}

/// Validate one provider record into an upsert, rejecting unknown
/// status strings and totals that disagree with their components.
pub fn map_remote(remote: &RemoteInvoice) -> Result<UpsertInvoice, AppError> {
    let status = InvoiceStatus::parse(&remote.status).ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "sync aborted: unrecognized status `{}` on invoice {}",
            remote.status,
            remote.invoice_number
        ))
    })?;

    let tolerance = Decimal::new(1, 2); // 0.01

    let (amount, tax_rate) = match (remote.sub_total, remote.tax_total) {
        (Some(sub_total), Some(tax_total)) => {
            if (sub_total + tax_total - remote.total).abs() > tolerance {
                return Err(AppError::InternalError(anyhow::anyhow!(
                    "sync aborted: invoice {} total {} disagrees with {} + {}",
                    remote.invoice_number,
                    remote.total,
                    sub_total,
                    tax_total
                )));
            }
            let tax_rate = if sub_total > Decimal::ZERO {
                tax_total / sub_total
            } else {
                Decimal::ZERO
            };
            (sub_total, tax_rate)
        }
        // No breakdown supplied: the total stands alone.
        _ => (remote.total, Decimal::ZERO),
    };

    Ok(UpsertInvoice {
        external_id: remote.invoice_id.clone(),
        invoice_number: remote.invoice_number.clone(),
        client_name: remote.customer_name.clone(),
        client_email: remote.email.clone(),
        description: remote.notes.clone(),
        amount,
        tax_rate,
        total_amount: remote.total,
        balance: remote.balance,
        currency_code: remote.currency_code.clone(),
        status,
        issue_date: remote.date,
        due_date: remote.due_date,
        paid_date: remote.last_payment_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(number: &str, status: &str) -> RemoteInvoice {
        serde_json::from_value(serde_json::json!({
            "invoice_id": format!("ext-{}", number),
            "invoice_number": number,
            "customer_name": "Acme Ltd",
            "status": status,
            "currency_code": "KES",
            "total": 1160.0,
            "sub_total": 1000.0,
            "tax_total": 160.0,
        }))
        .unwrap()
    }

    #[test]
    fn maps_consistent_totals() {
        let upsert = map_remote(&remote("INV-001", "paid")).unwrap();
        assert_eq!(upsert.status, InvoiceStatus::Paid);
        assert_eq!(upsert.amount, Decimal::from(1000));
        assert_eq!(upsert.total_amount, Decimal::from(1160));
        assert_eq!(upsert.tax_rate, Decimal::new(16, 2));
        // The stored fields satisfy total = amount + amount * tax_rate.
        assert_eq!(
            upsert.amount + upsert.amount * upsert.tax_rate,
            upsert.total_amount
        );
    }

    #[test]
    fn rejects_unrecognized_status() {
        let err = map_remote(&remote("INV-002", "viewed")).unwrap_err();
        assert!(err.to_string().contains("unrecognized status"));
    }

    #[test]
    fn rejects_total_mismatch() {
        let mut inv = remote("INV-003", "sent");
        inv.total = Decimal::from(9999);
        let err = map_remote(&inv).unwrap_err();
        assert!(err.to_string().contains("disagrees"));
    }

    #[test]
    fn total_stands_alone_without_breakdown() {
        let mut inv = remote("INV-004", "sent");
        inv.sub_total = None;
        inv.tax_total = None;
        let upsert = map_remote(&inv).unwrap();
        assert_eq!(upsert.amount, inv.total);
        assert_eq!(upsert.tax_rate, Decimal::ZERO);
    }
}
