//! Payment handlers: installment settlement and audit listing.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::models::InstallmentStatus;
use crate::services::{PAYMENTS_TOTAL, PAYMENT_AMOUNT_TOTAL};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct PayInstallmentRequest {
    pub method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub application_id: Uuid,
}

/// Pay one installment (owning parent only).
///
/// The settlement itself is a single transaction in the repository; the
/// status pre-check here only produces a friendlier error for the common
/// case, the conditional update inside the transaction is the real guard.
pub async fn pay_installment(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(installment_id): Path<Uuid>,
    Json(payload): Json<PayInstallmentRequest>,
) -> Result<Json<Value>, AppError> {
    let installment = state
        .db
        .get_installment(installment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Installment not found")))?;

    let application = state
        .db
        .get_application(installment.application_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Application not found")))?;

    let student = state
        .db
        .get_student(application.student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;
    ctx.require_owner(student.parent_id)?;

    if InstallmentStatus::from_string(&installment.status) == InstallmentStatus::Paid {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Installment already paid"
        )));
    }

    let method = payload.method.unwrap_or_else(|| "online".to_string());
    let outcome = state
        .db
        .pay_installment(&installment, ctx.user_id, &method)
        .await?;

    PAYMENTS_TOTAL.with_label_values(&[&method]).inc();
    if let Some(amount) = outcome.payment.amount.to_f64() {
        PAYMENT_AMOUNT_TOTAL.with_label_values(&[&method]).inc_by(amount);
    }

    Ok(Json(json!({
        "transaction_id": outcome.payment.transaction_id,
        "remaining_amount": outcome.remaining_amount,
        "application_status": outcome.application_status
    })))
}

/// List the payment audit trail of one application (owner or admin).
pub async fn list_payments(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Value>, AppError> {
    let application = state
        .db
        .get_application(query.application_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Application not found")))?;

    let student = state
        .db
        .get_student(application.student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;
    ctx.require_owner_or_admin(student.parent_id)?;

    let payments = state.db.list_payments(query.application_id).await?;

    Ok(Json(json!({ "payments": payments })))
}
