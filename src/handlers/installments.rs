//! Installment schedule handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::models::ApplicationSummary;
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct ListInstallmentsQuery {
    pub application_id: Uuid,
}

/// Generate the installment schedule for an application (admin only).
///
/// Fails with Conflict when a schedule already exists; never appends.
pub async fn generate_installments(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(application_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ctx.require_admin()?;

    let count = state.db.generate_installments(application_id).await?;

    Ok(Json(json!({ "count": count })))
}

/// List the installments of one application with aggregate figures.
pub async fn list_installments(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListInstallmentsQuery>,
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

    let installments = state.db.list_installments(query.application_id).await?;
    let (paid_count, pending_count, amount_paid) =
        state.db.installment_counts(query.application_id).await?;

    let summary = ApplicationSummary {
        total_amount: application.total_amount,
        remaining_amount: application.remaining_amount,
        amount_paid,
        paid_count,
        pending_count,
    };

    Ok(Json(json!({
        "installments": installments,
        "summary": summary
    })))
}
