//! jobcard-service: invoice sync, reconciliation and the job-card
//! lifecycle over an external accounting provider.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
