//! Fee structure catalog handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::models::CreateFeeStructure;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFeeStructureRequest {
    pub institution_id: Uuid,
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    pub amount: Decimal,
    #[validate(length(min = 1, max = 32))]
    pub academic_year: String,
    pub semester: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListFeeStructuresQuery {
    pub institution_id: Option<Uuid>,
}

/// Create a fee structure catalog entry (admin only).
pub async fn create_fee_structure(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<CreateFeeStructureRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ctx.require_admin()?;
    payload.validate()?;

    if payload.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Fee amount must be positive"
        )));
    }

    let fee_structure = state
        .db
        .create_fee_structure(&CreateFeeStructure {
            institution_id: payload.institution_id,
            name: payload.name,
            amount: payload.amount.round_dp(2),
            academic_year: payload.academic_year,
            semester: payload.semester,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "fee_structure": fee_structure })),
    ))
}

/// List fee structures, optionally for one institution.
pub async fn list_fee_structures(
    State(state): State<AppState>,
    _ctx: AuthContext,
    Query(query): Query<ListFeeStructuresQuery>,
) -> Result<Json<Value>, AppError> {
    let fee_structures = state.db.list_fee_structures(query.institution_id).await?;

    Ok(Json(json!({ "fee_structures": fee_structures })))
}
