//! EMI plan catalog model. Plans are selected by applications, never edited
//! through them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmiPlan {
    pub plan_id: Uuid,
    pub name: String,
    pub installments: i32,
    pub interest_rate: Decimal,
    pub processing_fee: Decimal,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating an EMI plan.
#[derive(Debug, Clone)]
pub struct CreateEmiPlan {
    pub name: String,
    pub installments: i32,
    pub interest_rate: Decimal,
    pub processing_fee: Decimal,
}
