//! Fee application lifecycle handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::models::{
    monthly_amount, ApplicationStatus, FeeApplication, ListApplicationsFilter, Student,
};
use crate::services::APPLICATIONS_TOTAL;
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub student_id: Uuid,
    pub fee_structure_id: Uuid,
    pub plan_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ListApplicationsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewApplicationRequest {
    pub action: String,
    pub plan_id: Option<Uuid>,
}

/// Per-installment amount for a split, refusing totals too small to leave a
/// positive amount in every installment once rounded to two decimals.
fn split_monthly(total: Decimal, installments: u32) -> Result<Decimal, AppError> {
    let monthly = monthly_amount(total, installments);
    let last = total - monthly * Decimal::from(installments - 1);
    if monthly < Decimal::new(1, 2) || last < Decimal::new(1, 2) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Fee amount {} cannot be split into {} installments",
            total,
            installments
        )));
    }
    Ok(monthly)
}

/// Resolve an application and its owning student, or NotFound.
async fn load_application(
    state: &AppState,
    application_id: Uuid,
) -> Result<(FeeApplication, Student), AppError> {
    let application = state
        .db
        .get_application(application_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Application not found")))?;

    let student = state
        .db
        .get_student(application.student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

    Ok((application, student))
}

/// Create a fee application for one of the caller's students.
pub async fn create_application(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ctx.require_parent()?;

    let student = state
        .db
        .get_student(payload.student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;
    ctx.require_owner(student.parent_id)?;

    let fee_structure = state
        .db
        .get_fee_structure(payload.fee_structure_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Fee structure not found")))?;

    let (monthly_installment, status) = match payload.plan_id {
        Some(plan_id) => {
            let plan = state
                .db
                .get_emi_plan(plan_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("EMI plan not found")))?;
            if !plan.active {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "EMI plan is not active"
                )));
            }
            (
                Some(split_monthly(fee_structure.amount, plan.installments as u32)?),
                ApplicationStatus::EmiPending,
            )
        }
        None => (None, ApplicationStatus::OnboardingPending),
    };

    let application = state
        .db
        .create_application(
            student.student_id,
            fee_structure.fee_structure_id,
            payload.plan_id,
            fee_structure.amount,
            monthly_installment,
            status,
        )
        .await?;

    APPLICATIONS_TOTAL
        .with_label_values(&[status.as_str()])
        .inc();

    Ok((
        StatusCode::CREATED,
        Json(json!({ "application": application })),
    ))
}

/// List applications: parents see their own, admins see all.
pub async fn list_applications(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListApplicationsQuery>,
) -> Result<Json<Value>, AppError> {
    let status = match query.status.as_deref() {
        Some(s) => {
            let parsed = ApplicationStatus::from_string(s);
            if parsed.as_str() != s {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Unknown status filter: {}",
                    s
                )));
            }
            Some(parsed)
        }
        None => None,
    };

    let filter = ListApplicationsFilter {
        parent_id: if ctx.is_admin() {
            None
        } else {
            Some(ctx.user_id)
        },
        status,
    };

    let applications = state.db.list_applications(&filter).await?;

    Ok(Json(json!({ "applications": applications })))
}

/// Get one application (owner or admin).
pub async fn get_application(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(application_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let (application, student) = load_application(&state, application_id).await?;
    ctx.require_owner_or_admin(student.parent_id)?;

    Ok(Json(json!({ "application": application })))
}

/// Advance the application lifecycle: select_plan and submit (owner parent),
/// approve and reject (admin). Approval generates the installment schedule in
/// the same transaction.
pub async fn review_application(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<ReviewApplicationRequest>,
) -> Result<Json<Value>, AppError> {
    let (application, student) = load_application(&state, application_id).await?;

    let updated = match payload.action.as_str() {
        "select_plan" => {
            ctx.require_owner(student.parent_id)?;
            let plan_id = payload.plan_id.ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("plan_id is required to select a plan"))
            })?;
            let plan = state
                .db
                .get_emi_plan(plan_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("EMI plan not found")))?;
            if !plan.active {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "EMI plan is not active"
                )));
            }
            let monthly = split_monthly(application.total_amount, plan.installments as u32)?;
            state
                .db
                .select_plan(application_id, plan_id, monthly)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(anyhow::anyhow!(
                        "EMI plan can no longer be changed in status {}",
                        application.status
                    ))
                })?
        }
        "submit" => {
            ctx.require_owner(student.parent_id)?;
            state
                .db
                .submit_application(application_id)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(anyhow::anyhow!(
                        "Application is not ready for review in status {}",
                        application.status
                    ))
                })?
        }
        "approve" => {
            ctx.require_admin()?;
            if application.plan_id.is_none() || application.monthly_installment.is_none() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Application has no EMI plan selected"
                )));
            }
            let (approved, _generated) = state
                .db
                .approve_application(application_id)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(anyhow::anyhow!(
                        "Application is not under review in status {}",
                        application.status
                    ))
                })?;
            APPLICATIONS_TOTAL.with_label_values(&["approved"]).inc();
            approved
        }
        "reject" => {
            ctx.require_admin()?;
            let rejected = state
                .db
                .reject_application(application_id)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(anyhow::anyhow!(
                        "Application is not under review in status {}",
                        application.status
                    ))
                })?;
            APPLICATIONS_TOTAL.with_label_values(&["rejected"]).inc();
            rejected
        }
        other => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Unknown action: {}",
                other
            )));
        }
    };

    Ok(Json(json!({
        "status": updated.status,
        "application": updated
    })))
}

/// Delete an application that has not yet reached review. Removing the
/// student's last application removes the student too.
pub async fn delete_application(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(application_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let (application, student) = load_application(&state, application_id).await?;
    ctx.require_owner(student.parent_id)?;

    let status = ApplicationStatus::from_string(&application.status);
    if !status.is_deletable() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Application in status {} cannot be deleted",
            application.status
        )));
    }

    state
        .db
        .delete_application(application_id, student.student_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
