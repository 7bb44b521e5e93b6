//! Domain models for emi-service.

mod application;
mod emi_plan;
mod fee_structure;
mod installment;
mod payment;
mod student;

pub use application::{
    ApplicationStatus, ApplicationSummary, FeeApplication, ListApplicationsFilter,
};
pub use emi_plan::{CreateEmiPlan, EmiPlan};
pub use fee_structure::{CreateFeeStructure, FeeStructure};
pub use installment::{build_schedule, monthly_amount, Installment, InstallmentStatus, ScheduleEntry};
pub use payment::{Payment, PaymentStatus};
pub use student::{CreateStudent, Student};
