//! Job card and work log models.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCardStatus {
    Pending,
    InProgress,
    Completed,
    OnHold,
    Cancelled,
}

impl JobCardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobCardStatus::Pending => "pending",
            JobCardStatus::InProgress => "in_progress",
            JobCardStatus::Completed => "completed",
            JobCardStatus::OnHold => "on_hold",
            JobCardStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobCardStatus::Pending),
            "in_progress" => Some(JobCardStatus::InProgress),
            "completed" => Some(JobCardStatus::Completed),
            "on_hold" => Some(JobCardStatus::OnHold),
            "cancelled" => Some(JobCardStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobCardStatus::Completed | JobCardStatus::Cancelled)
    }

    /// Legal transitions: pending -> in_progress -> completed, on_hold
    /// reachable from (and back to) pending/in_progress, cancelled from
    /// any non-terminal state. Creation is not a transition.
    pub fn can_transition_to(&self, next: JobCardStatus) -> bool {
        use JobCardStatus::*;
        match (self, next) {
            (Pending, InProgress) | (Pending, OnHold) => true,
            (InProgress, Completed) | (InProgress, OnHold) => true,
            (OnHold, Pending) | (OnHold, InProgress) => true,
            (s, Cancelled) => !s.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Labor,
    Materials,
    Equipment,
    Consultation,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Labor => "labor",
            TaskType::Materials => "materials",
            TaskType::Equipment => "equipment",
            TaskType::Consultation => "consultation",
        }
    }
}

/// One dated/timed record of work against a job card. Persisted as part
/// of the parent row, never on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkLogEntry {
    pub date: NaiveDate,
    pub time: String,
    pub hours: Decimal,
    pub task_type: TaskType,
    #[serde(default)]
    pub description: String,
}

impl WorkLogEntry {
    /// Hours must be non-negative and `time` must be a wall-clock value;
    /// the date and time are caller-supplied, not "now".
    pub fn validate(&self) -> Result<(), String> {
        if self.hours < Decimal::ZERO {
            return Err(format!("work log hours must be non-negative, got {}", self.hours));
        }
        if NaiveTime::parse_from_str(&self.time, "%H:%M").is_err()
            && NaiveTime::parse_from_str(&self.time, "%H:%M:%S").is_err()
        {
            return Err(format!("work log time `{}` is not a valid HH:MM value", self.time));
        }
        Ok(())
    }
}

/// A work order bound to exactly one invoice. Multiple cards per invoice
/// are allowed (re-applications); cards are never hard-deleted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobCard {
    pub id: i64,
    pub job_card_number: String,
    pub invoice_id: i64,
    pub invoice_number: String,
    pub client_name: String,
    pub email: String,
    pub status: String,
    pub notes: Option<String>,
    pub selected_items: Json<Vec<serde_json::Value>>,
    pub total_selected_amount: Decimal,
    pub work_logs: Json<Vec<WorkLogEntry>>,
    pub assigned_user_id: Option<i64>,
    pub photos: Json<Vec<String>>,
    pub documents: Json<Vec<String>>,
    pub voice_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for creating one job card with its work logs.
#[derive(Debug, Clone)]
pub struct NewJobCard {
    pub job_card_number: String,
    pub invoice_id: i64,
    pub invoice_number: String,
    pub client_name: String,
    pub email: String,
    pub status: JobCardStatus,
    pub notes: Option<String>,
    pub selected_items: Vec<serde_json::Value>,
    pub total_selected_amount: Decimal,
    pub work_logs: Vec<WorkLogEntry>,
    pub assigned_user_id: Option<i64>,
}
