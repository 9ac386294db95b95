//! Loan application intake desk: public submission form, a single-admin
//! dashboard with search and date filters, and an Excel export.

pub mod auth;
pub mod config;
pub mod error;
pub mod loans;
pub mod telemetry;
