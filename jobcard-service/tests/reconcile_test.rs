mod common;

use axum::http::StatusCode;
use common::spawn_app;
use serde_json::json;

fn remote_invoice(number: &str, status: &str, currency: &str) -> serde_json::Value {
    json!({
        "invoice_id": format!("ext-{}", number),
        "invoice_number": number,
        "customer_name": "Acme Ltd",
        "status": status,
        "currency_code": currency,
        "total": 1160.0,
        "date": "2026-08-01",
    })
}

#[tokio::test]
async fn reports_missing_scanned_copies() {
    let app = spawn_app();
    app.books.push(remote_invoice("INV-001", "paid", "KES"));
    app.books.push(remote_invoice("INV-002", "overdue", "KES"));
    app.workdrive.push("INV-001.pdf");

    let (status, body) = app
        .post_json("/reconcile", json!({ "currency": "ksh" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["currency"], "KES");
    assert_eq!(body["books_invoices"], 2);
    assert_eq!(body["workdrive_files"], 1);
    assert_eq!(body["matched"], 1);
    assert_eq!(body["missing"], 1);
    assert_eq!(body["missing_list"], json!(["INV-002"]));
    assert_eq!(body["email_sent"], false);

    // Read-only: no report was dispatched without an address.
    assert_eq!(app.email.sent_count(), 0);
    // The configured folder was queried.
    assert_eq!(
        app.workdrive.requested_folders.lock().unwrap().as_slice(),
        &["folder-1".to_string()]
    );
}

#[tokio::test]
async fn missing_list_is_sorted() {
    let app = spawn_app();
    app.books.push(remote_invoice("INV-030", "paid", "KES"));
    app.books.push(remote_invoice("INV-010", "paid", "KES"));
    app.books.push(remote_invoice("INV-020", "paid", "KES"));

    let (status, body) = app.post_json("/reconcile", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["missing_list"], json!(["INV-010", "INV-020", "INV-030"]));
}

#[tokio::test]
async fn unpaid_filter_includes_sent() {
    let app = spawn_app();
    app.books.push(remote_invoice("INV-001", "sent", "KES"));
    app.books.push(remote_invoice("INV-002", "paid", "KES"));

    let (status, body) = app
        .post_json("/reconcile", json!({ "statuses": ["unpaid"] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books_invoices"], 1);
    assert_eq!(body["missing_list"], json!(["INV-001"]));
    assert_eq!(body["statuses"], json!(["unpaid"]));
}

#[tokio::test]
async fn rejects_unknown_status_filter() {
    let app = spawn_app();
    let (status, body) = app
        .post_json("/reconcile", json!({ "statuses": ["archived"] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("archived"));
}

#[tokio::test]
async fn rejects_malformed_dates() {
    let app = spawn_app();
    let (status, _) = app
        .post_json("/reconcile", json!({ "date_from": "01/08/2026" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn emails_report_when_address_supplied() {
    let app = spawn_app();
    app.books.push(remote_invoice("INV-001", "paid", "KES"));

    let (status, body) = app
        .post_json(
            "/reconcile",
            json!({ "email": "finance@example.test", "date_from": "2026-08-01", "date_to": "2026-08-31" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email_sent"], true);
    assert_eq!(body["date_from"], "2026-08-01");
    assert_eq!(body["date_to"], "2026-08-31");

    let sent = app.email.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "finance@example.test");
    assert!(sent[0].body_html.as_ref().unwrap().contains("INV-001"));
}

#[tokio::test]
async fn email_failure_is_downgraded_to_flag() {
    let app = spawn_app();
    app.books.push(remote_invoice("INV-001", "paid", "KES"));
    app.email.fail_next();

    let (status, body) = app
        .post_json("/reconcile", json!({ "email": "finance@example.test" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["email_sent"], false);
}
