//! Student registration and listing.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::models::CreateStudent;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    pub institution_id: Uuid,
    #[validate(length(min = 1, max = 256))]
    pub full_name: String,
}

/// Register a student owned by the calling parent.
pub async fn create_student(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ctx.require_parent()?;
    payload.validate()?;

    let student = state
        .db
        .create_student(&CreateStudent {
            parent_id: ctx.user_id,
            institution_id: payload.institution_id,
            full_name: payload.full_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "student": student }))))
}

/// List students: parents see their own, admins see all.
pub async fn list_students(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<Value>, AppError> {
    let parent_id = if ctx.is_admin() {
        None
    } else {
        Some(ctx.user_id)
    };

    let students = state.db.list_students(parent_id).await?;

    Ok(Json(json!({ "students": students })))
}
