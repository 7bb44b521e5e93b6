//! EMI plan catalog handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::models::CreateEmiPlan;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEmiPlanRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(range(min = 1, max = 60))]
    pub installments: i32,
    pub interest_rate: Option<Decimal>,
    pub processing_fee: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ListEmiPlansQuery {
    #[serde(default)]
    pub active_only: bool,
}

/// Create an EMI plan (admin only).
pub async fn create_emi_plan(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<CreateEmiPlanRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ctx.require_admin()?;
    payload.validate()?;

    let interest_rate = payload.interest_rate.unwrap_or(Decimal::ZERO);
    let processing_fee = payload.processing_fee.unwrap_or(Decimal::ZERO);
    if interest_rate < Decimal::ZERO || processing_fee < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Interest rate and processing fee cannot be negative"
        )));
    }

    let plan = state
        .db
        .create_emi_plan(&CreateEmiPlan {
            name: payload.name,
            installments: payload.installments,
            interest_rate,
            processing_fee: processing_fee.round_dp(2),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "plan": plan }))))
}

/// List EMI plans.
pub async fn list_emi_plans(
    State(state): State<AppState>,
    _ctx: AuthContext,
    Query(query): Query<ListEmiPlansQuery>,
) -> Result<Json<Value>, AppError> {
    let plans = state.db.list_emi_plans(query.active_only).await?;

    Ok(Json(json!({ "plans": plans })))
}
