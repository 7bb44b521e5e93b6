//! Payment model: append-only audit record of a money movement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Completed,
        }
    }
}

/// Payment row. Never updated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub application_id: Uuid,
    pub installment_id: Option<Uuid>,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub transaction_id: String,
    pub status: String,
    pub created_utc: DateTime<Utc>,
}
