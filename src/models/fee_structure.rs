//! Fee structure catalog model. Institution-scoped and immutable once
//! referenced by an application.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeeStructure {
    pub fee_structure_id: Uuid,
    pub institution_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub academic_year: String,
    pub semester: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a fee structure.
#[derive(Debug, Clone)]
pub struct CreateFeeStructure {
    pub institution_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub academic_year: String,
    pub semester: Option<String>,
}
