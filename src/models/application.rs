//! Fee application model: the aggregate root of the EMI lifecycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Fee application status.
///
/// Lifecycle: onboarding_pending -> emi_pending -> platform_review ->
/// {approved | rejected}; approved applications move to active on the first
/// payment and to completed once the remaining amount reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    OnboardingPending,
    EmiPending,
    PlatformReview,
    Approved,
    Rejected,
    Active,
    Completed,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::OnboardingPending => "onboarding_pending",
            ApplicationStatus::EmiPending => "emi_pending",
            ApplicationStatus::PlatformReview => "platform_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Active => "active",
            ApplicationStatus::Completed => "completed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "emi_pending" => ApplicationStatus::EmiPending,
            "platform_review" => ApplicationStatus::PlatformReview,
            "approved" => ApplicationStatus::Approved,
            "rejected" => ApplicationStatus::Rejected,
            "active" => ApplicationStatus::Active,
            "completed" => ApplicationStatus::Completed,
            _ => ApplicationStatus::OnboardingPending,
        }
    }

    /// Deletion is permitted only before the application reaches review.
    pub fn is_deletable(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::OnboardingPending | ApplicationStatus::EmiPending
        )
    }
}

/// Fee application row.
///
/// Invariant: `remaining_amount == total_amount - sum(paid installment
/// amounts)` and never leaves the `[0, total_amount]` range.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeeApplication {
    pub application_id: Uuid,
    pub student_id: Uuid,
    pub fee_structure_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub remaining_amount: Decimal,
    pub monthly_installment: Option<Decimal>,
    pub status: String,
    pub applied_utc: DateTime<Utc>,
    pub approved_utc: Option<DateTime<Utc>>,
    pub rejected_utc: Option<DateTime<Utc>>,
}

/// Filter parameters for listing applications.
#[derive(Debug, Clone, Default)]
pub struct ListApplicationsFilter {
    pub parent_id: Option<Uuid>,
    pub status: Option<ApplicationStatus>,
}

/// Aggregate installment figures for one application.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationSummary {
    pub total_amount: Decimal,
    pub remaining_amount: Decimal,
    pub amount_paid: Decimal,
    pub paid_count: i64,
    pub pending_count: i64,
}
