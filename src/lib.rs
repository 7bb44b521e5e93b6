//! emi-service: student-fee EMI financing.
//!
//! Parents apply to pay an institution's fee structure in installments under
//! an EMI plan; admins review and approve applications, which generates the
//! installment schedule; parents then settle installments one at a time while
//! the application's remaining balance is kept consistent.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::{AppState, Application};
