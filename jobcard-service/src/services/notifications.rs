//! Job-card email composition. Sending is best-effort; callers report
//! the outcome as a flag, never as a request failure.

use crate::models::{JobCard, JobCardStatus, User};
use crate::services::providers::EmailMessage;

fn status_phrase(status: JobCardStatus) -> (&'static str, &'static str) {
    match status {
        JobCardStatus::Pending => ("Received", "has been received and is pending review"),
        JobCardStatus::InProgress => ("In Progress", "is now in progress"),
        JobCardStatus::Completed => ("Completed", "has been completed"),
        JobCardStatus::OnHold => ("On Hold", "has been placed on hold"),
        JobCardStatus::Cancelled => ("Cancelled", "has been cancelled"),
    }
}

/// Compose the notification for a card entering `status`, addressed to
/// the card's client.
pub fn job_card_email(
    card: &JobCard,
    status: JobCardStatus,
    assigned: Option<&User>,
) -> EmailMessage {
    let (label, phrase) = status_phrase(status);

    let assigned_line_html = assigned
        .map(|user| format!("<p>Assigned to: <strong>{}</strong></p>", user.name))
        .unwrap_or_default();
    let assigned_line_text = assigned
        .map(|user| format!("Assigned to: {}\n", user.name))
        .unwrap_or_default();

    let body_html = format!(
        r#"<html><body>
<h2>Job Card {label}</h2>
<p>Dear {client},</p>
<p>Job card <strong>{number}</strong> for invoice <strong>{invoice}</strong> {phrase}.</p>
{assigned}
<p>Work value: {amount}</p>
</body></html>"#,
        label = label,
        client = card.client_name,
        number = card.job_card_number,
        invoice = card.invoice_number,
        phrase = phrase,
        assigned = assigned_line_html,
        amount = card.total_selected_amount,
    );

    let body_text = format!(
        "Dear {},\n\nJob card {} for invoice {} {}.\n{}Work value: {}\n",
        card.client_name,
        card.job_card_number,
        card.invoice_number,
        phrase,
        assigned_line_text,
        card.total_selected_amount,
    );

    EmailMessage {
        to: card.email.clone(),
        subject: format!("Job Card {}: {}", label, card.job_card_number),
        body_text: Some(body_text),
        body_html: Some(body_html),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sqlx::types::Json;

    fn card() -> JobCard {
        JobCard {
            id: 1,
            job_card_number: "JC-2026-08-0001".to_string(),
            invoice_id: 7,
            invoice_number: "INV-001".to_string(),
            client_name: "Acme Ltd".to_string(),
            email: "ops@acme.test".to_string(),
            status: "pending".to_string(),
            notes: None,
            selected_items: Json(vec![]),
            total_selected_amount: Decimal::from(500),
            work_logs: Json(vec![]),
            assigned_user_id: None,
            photos: Json(vec![]),
            documents: Json(vec![]),
            voice_note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn completed_email_names_card_and_invoice() {
        let message = job_card_email(&card(), JobCardStatus::Completed, None);
        assert_eq!(message.to, "ops@acme.test");
        assert!(message.subject.contains("Completed"));
        assert!(message.subject.contains("JC-2026-08-0001"));
        let html = message.body_html.unwrap();
        assert!(html.contains("INV-001"));
        assert!(html.contains("has been completed"));
    }

    #[test]
    fn assigned_user_appears_when_present() {
        let user = User {
            id: 3,
            name: "Wanjiku".to_string(),
            email: "wanjiku@example.test".to_string(),
            is_admin: false,
            created_at: Utc::now(),
        };
        let message = job_card_email(&card(), JobCardStatus::InProgress, Some(&user));
        assert!(message.body_html.unwrap().contains("Wanjiku"));

        let without = job_card_email(&card(), JobCardStatus::InProgress, None);
        assert!(!without.body_html.unwrap().contains("Assigned to"));
    }
}
