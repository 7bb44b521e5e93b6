//! Services for emi-service.

mod database;
mod metrics;

pub use database::{Database, PaymentOutcome};
pub use metrics::{
    get_metrics, init_metrics, APPLICATIONS_TOTAL, DB_QUERY_DURATION, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION, PAYMENTS_TOTAL, PAYMENT_AMOUNT_TOTAL,
};
