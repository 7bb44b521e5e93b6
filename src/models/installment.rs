//! Installment model and schedule derivation.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Installment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Overdue,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::Paid => "paid",
            InstallmentStatus::Overdue => "overdue",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => InstallmentStatus::Paid,
            "overdue" => InstallmentStatus::Overdue,
            _ => InstallmentStatus::Pending,
        }
    }
}

/// Installment row. Generated exactly once per application; mutated only by
/// the payment path (status, paid_utc, payment_id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Installment {
    pub installment_id: Uuid,
    pub application_id: Uuid,
    pub installment_number: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: String,
    pub paid_utc: Option<DateTime<Utc>>,
    pub payment_id: Option<Uuid>,
}

/// One entry of a derived schedule, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub installment_number: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

/// Derive an installment schedule from a total, a per-installment amount and
/// a count.
///
/// Every installment except the last carries `monthly_installment`; the last
/// carries `total_amount - sum(previous)` so the schedule sums exactly to the
/// total, absorbing any rounding drift. Installment `i` (1-based) falls due
/// on the first day of the month `i` months after `start`.
pub fn build_schedule(
    total_amount: Decimal,
    monthly_installment: Decimal,
    count: u32,
    start: DateTime<Utc>,
) -> Vec<ScheduleEntry> {
    let start_date = start.date_naive();
    let mut entries = Vec::with_capacity(count as usize);
    let mut allocated = Decimal::ZERO;

    for number in 1..=count {
        let amount = if number == count {
            total_amount - allocated
        } else {
            monthly_installment
        };
        allocated += amount;

        let shifted = start_date + Months::new(number);
        let due_date = NaiveDate::from_ymd_opt(shifted.year(), shifted.month(), 1)
            .unwrap_or(shifted);

        entries.push(ScheduleEntry {
            installment_number: number as i32,
            amount,
            due_date,
        });
    }

    entries
}

/// Per-installment amount for a total split over `count` periods, at fixed
/// two-decimal precision.
pub fn monthly_amount(total_amount: Decimal, count: u32) -> Decimal {
    (total_amount / Decimal::from(count)).round_dp(2)
}
