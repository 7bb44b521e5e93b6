//! Student model. A student belongs to exactly one parent and one
//! institution; a parent may own any number of students.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub student_id: Uuid,
    pub parent_id: Uuid,
    pub institution_id: Uuid,
    pub full_name: String,
    pub created_utc: DateTime<Utc>,
}

/// Input for registering a student under the calling parent.
#[derive(Debug, Clone)]
pub struct CreateStudent {
    pub parent_id: Uuid,
    pub institution_id: Uuid,
    pub full_name: String,
}
