//! Database service for emi-service.
//!
//! All multi-row mutations (approve + schedule generation, payment
//! settlement, application deletion with student cleanup) run inside a
//! single transaction so a crash cannot leave the aggregate inconsistent.

use crate::error::AppError;
use crate::models::{
    build_schedule, monthly_amount, ApplicationStatus, CreateEmiPlan, CreateFeeStructure,
    CreateStudent, EmiPlan, FeeApplication, FeeStructure, Installment, ListApplicationsFilter,
    Payment, PaymentStatus, Student,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const APPLICATION_COLUMNS: &str = "application_id, student_id, fee_structure_id, plan_id, \
     total_amount, remaining_amount, monthly_installment, status, \
     applied_utc, approved_utc, rejected_utc";

const INSTALLMENT_COLUMNS: &str = "installment_id, application_id, installment_number, amount, \
     due_date, status, paid_utc, payment_id";

const PAYMENT_COLUMNS: &str = "payment_id, application_id, installment_id, user_id, amount, \
     method, transaction_id, status, created_utc";

/// Outcome of settling one installment.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub remaining_amount: Decimal,
    pub application_status: String,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "emi-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Student Operations
    // -------------------------------------------------------------------------

    /// Register a student under a parent.
    #[instrument(skip(self, input), fields(parent_id = %input.parent_id))]
    pub async fn create_student(&self, input: &CreateStudent) -> Result<Student, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_student"])
            .start_timer();

        let student_id = Uuid::new_v4();
        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (student_id, parent_id, institution_id, full_name)
            VALUES ($1, $2, $3, $4)
            RETURNING student_id, parent_id, institution_id, full_name, created_utc
            "#,
        )
        .bind(student_id)
        .bind(input.parent_id)
        .bind(input.institution_id)
        .bind(&input.full_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create student: {}", e)))?;

        timer.observe_duration();

        info!(student_id = %student.student_id, "Student registered");

        Ok(student)
    }

    /// Get a student by ID.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn get_student(&self, student_id: Uuid) -> Result<Option<Student>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_student"])
            .start_timer();

        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, parent_id, institution_id, full_name, created_utc
            FROM students
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get student: {}", e)))?;

        timer.observe_duration();

        Ok(student)
    }

    /// List students, optionally scoped to one parent.
    #[instrument(skip(self))]
    pub async fn list_students(&self, parent_id: Option<Uuid>) -> Result<Vec<Student>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_students"])
            .start_timer();

        let students = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, parent_id, institution_id, full_name, created_utc
            FROM students
            WHERE ($1::uuid IS NULL OR parent_id = $1)
            ORDER BY created_utc
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list students: {}", e)))?;

        timer.observe_duration();

        Ok(students)
    }

    // -------------------------------------------------------------------------
    // Fee Structure Catalog
    // -------------------------------------------------------------------------

    /// Create a fee structure catalog entry.
    #[instrument(skip(self, input), fields(institution_id = %input.institution_id))]
    pub async fn create_fee_structure(
        &self,
        input: &CreateFeeStructure,
    ) -> Result<FeeStructure, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_fee_structure"])
            .start_timer();

        let fee_structure_id = Uuid::new_v4();
        let fee_structure = sqlx::query_as::<_, FeeStructure>(
            r#"
            INSERT INTO fee_structures (fee_structure_id, institution_id, name, amount, academic_year, semester)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING fee_structure_id, institution_id, name, amount, academic_year, semester, created_utc
            "#,
        )
        .bind(fee_structure_id)
        .bind(input.institution_id)
        .bind(&input.name)
        .bind(input.amount)
        .bind(&input.academic_year)
        .bind(&input.semester)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create fee structure: {}", e))
        })?;

        timer.observe_duration();

        info!(fee_structure_id = %fee_structure.fee_structure_id, "Fee structure created");

        Ok(fee_structure)
    }

    /// Get a fee structure by ID.
    #[instrument(skip(self), fields(fee_structure_id = %fee_structure_id))]
    pub async fn get_fee_structure(
        &self,
        fee_structure_id: Uuid,
    ) -> Result<Option<FeeStructure>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_fee_structure"])
            .start_timer();

        let fee_structure = sqlx::query_as::<_, FeeStructure>(
            r#"
            SELECT fee_structure_id, institution_id, name, amount, academic_year, semester, created_utc
            FROM fee_structures
            WHERE fee_structure_id = $1
            "#,
        )
        .bind(fee_structure_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get fee structure: {}", e))
        })?;

        timer.observe_duration();

        Ok(fee_structure)
    }

    /// List fee structures, optionally scoped to one institution.
    #[instrument(skip(self))]
    pub async fn list_fee_structures(
        &self,
        institution_id: Option<Uuid>,
    ) -> Result<Vec<FeeStructure>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_fee_structures"])
            .start_timer();

        let fee_structures = sqlx::query_as::<_, FeeStructure>(
            r#"
            SELECT fee_structure_id, institution_id, name, amount, academic_year, semester, created_utc
            FROM fee_structures
            WHERE ($1::uuid IS NULL OR institution_id = $1)
            ORDER BY created_utc
            "#,
        )
        .bind(institution_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list fee structures: {}", e))
        })?;

        timer.observe_duration();

        Ok(fee_structures)
    }

    // -------------------------------------------------------------------------
    // EMI Plan Catalog
    // -------------------------------------------------------------------------

    /// Create an EMI plan.
    #[instrument(skip(self, input))]
    pub async fn create_emi_plan(&self, input: &CreateEmiPlan) -> Result<EmiPlan, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_emi_plan"])
            .start_timer();

        let plan_id = Uuid::new_v4();
        let plan = sqlx::query_as::<_, EmiPlan>(
            r#"
            INSERT INTO emi_plans (plan_id, name, installments, interest_rate, processing_fee, active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING plan_id, name, installments, interest_rate, processing_fee, active, created_utc
            "#,
        )
        .bind(plan_id)
        .bind(&input.name)
        .bind(input.installments)
        .bind(input.interest_rate)
        .bind(input.processing_fee)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create EMI plan: {}", e))
        })?;

        timer.observe_duration();

        info!(plan_id = %plan.plan_id, name = %plan.name, "EMI plan created");

        Ok(plan)
    }

    /// Get an EMI plan by ID.
    #[instrument(skip(self), fields(plan_id = %plan_id))]
    pub async fn get_emi_plan(&self, plan_id: Uuid) -> Result<Option<EmiPlan>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_emi_plan"])
            .start_timer();

        let plan = sqlx::query_as::<_, EmiPlan>(
            r#"
            SELECT plan_id, name, installments, interest_rate, processing_fee, active, created_utc
            FROM emi_plans
            WHERE plan_id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get EMI plan: {}", e)))?;

        timer.observe_duration();

        Ok(plan)
    }

    /// List EMI plans.
    #[instrument(skip(self))]
    pub async fn list_emi_plans(&self, active_only: bool) -> Result<Vec<EmiPlan>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_emi_plans"])
            .start_timer();

        let plans = sqlx::query_as::<_, EmiPlan>(
            r#"
            SELECT plan_id, name, installments, interest_rate, processing_fee, active, created_utc
            FROM emi_plans
            WHERE ($1::bool = FALSE OR active = TRUE)
            ORDER BY created_utc
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list EMI plans: {}", e)))?;

        timer.observe_duration();

        Ok(plans)
    }

    // -------------------------------------------------------------------------
    // Fee Application Operations
    // -------------------------------------------------------------------------

    /// Create a fee application. The total is copied from the fee structure
    /// at creation time; choosing a plan up front lands the application in
    /// emi_pending directly.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn create_application(
        &self,
        student_id: Uuid,
        fee_structure_id: Uuid,
        plan_id: Option<Uuid>,
        total_amount: Decimal,
        monthly_installment: Option<Decimal>,
        status: ApplicationStatus,
    ) -> Result<FeeApplication, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_application"])
            .start_timer();

        let application_id = Uuid::new_v4();
        let application = sqlx::query_as::<_, FeeApplication>(&format!(
            r#"
            INSERT INTO fee_applications (
                application_id, student_id, fee_structure_id, plan_id,
                total_amount, remaining_amount, monthly_installment, status
            )
            VALUES ($1, $2, $3, $4, $5, $5, $6, $7)
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(application_id)
        .bind(student_id)
        .bind(fee_structure_id)
        .bind(plan_id)
        .bind(total_amount)
        .bind(monthly_installment)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create application: {}", e))
        })?;

        timer.observe_duration();

        info!(application_id = %application.application_id, status = %application.status, "Fee application created");

        Ok(application)
    }

    /// Get a fee application by ID.
    #[instrument(skip(self), fields(application_id = %application_id))]
    pub async fn get_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<FeeApplication>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_application"])
            .start_timer();

        let application = sqlx::query_as::<_, FeeApplication>(&format!(
            r#"
            SELECT {APPLICATION_COLUMNS}
            FROM fee_applications
            WHERE application_id = $1
            "#
        ))
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get application: {}", e))
        })?;

        timer.observe_duration();

        Ok(application)
    }

    /// List fee applications, optionally scoped to one parent and status.
    #[instrument(skip(self, filter))]
    pub async fn list_applications(
        &self,
        filter: &ListApplicationsFilter,
    ) -> Result<Vec<FeeApplication>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_applications"])
            .start_timer();

        let status_str = filter.status.map(|s| s.as_str().to_string());

        let applications = sqlx::query_as::<_, FeeApplication>(
            r#"
            SELECT a.application_id, a.student_id, a.fee_structure_id, a.plan_id,
                   a.total_amount, a.remaining_amount, a.monthly_installment, a.status,
                   a.applied_utc, a.approved_utc, a.rejected_utc
            FROM fee_applications a
            JOIN students s ON s.student_id = a.student_id
            WHERE ($1::uuid IS NULL OR s.parent_id = $1)
              AND ($2::varchar IS NULL OR a.status = $2)
            ORDER BY a.applied_utc
            "#,
        )
        .bind(filter.parent_id)
        .bind(&status_str)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list applications: {}", e))
        })?;

        timer.observe_duration();

        Ok(applications)
    }

    /// Attach an EMI plan to an application. Conditional on the application
    /// still being in a pre-review state; returns None when the state no
    /// longer allows it.
    #[instrument(skip(self), fields(application_id = %application_id, plan_id = %plan_id))]
    pub async fn select_plan(
        &self,
        application_id: Uuid,
        plan_id: Uuid,
        monthly_installment: Decimal,
    ) -> Result<Option<FeeApplication>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["select_plan"])
            .start_timer();

        let application = sqlx::query_as::<_, FeeApplication>(&format!(
            r#"
            UPDATE fee_applications
            SET plan_id = $2,
                monthly_installment = $3,
                status = 'emi_pending'
            WHERE application_id = $1
              AND status IN ('onboarding_pending', 'emi_pending')
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(application_id)
        .bind(plan_id)
        .bind(monthly_installment)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to select plan: {}", e)))?;

        timer.observe_duration();

        if let Some(ref app) = application {
            info!(application_id = %app.application_id, "EMI plan selected");
        }

        Ok(application)
    }

    /// Submit an application for platform review. Conditional on emi_pending.
    #[instrument(skip(self), fields(application_id = %application_id))]
    pub async fn submit_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<FeeApplication>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["submit_application"])
            .start_timer();

        let application = sqlx::query_as::<_, FeeApplication>(&format!(
            r#"
            UPDATE fee_applications
            SET status = 'platform_review'
            WHERE application_id = $1 AND status = 'emi_pending'
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to submit application: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref app) = application {
            info!(application_id = %app.application_id, "Application submitted for review");
        }

        Ok(application)
    }

    /// Approve an application and generate its installment schedule in one
    /// transaction. If installments already exist the approval still commits
    /// and generation is skipped.
    ///
    /// Returns the updated application and the number of installments
    /// generated, or None when the application is not in platform_review.
    #[instrument(skip(self), fields(application_id = %application_id))]
    pub async fn approve_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<(FeeApplication, u32)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["approve_application"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        // The UPDATE takes the row lock, serializing concurrent reviews.
        let application = sqlx::query_as::<_, FeeApplication>(&format!(
            r#"
            UPDATE fee_applications
            SET status = 'approved',
                approved_utc = NOW()
            WHERE application_id = $1 AND status = 'platform_review'
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to approve application: {}", e))
        })?;

        let application = match application {
            Some(app) => app,
            None => return Ok(None),
        };

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM installments WHERE application_id = $1")
                .bind(application_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to count installments: {}", e))
                })?;

        let generated = if existing > 0 {
            warn!(
                application_id = %application_id,
                existing = existing,
                "Installments already exist, skipping schedule generation on approval"
            );
            0
        } else {
            Self::insert_schedule(&mut tx, &application).await?
        };

        tx.commit().await?;

        timer.observe_duration();

        info!(
            application_id = %application_id,
            installments = generated,
            "Application approved"
        );

        Ok(Some((application, generated)))
    }

    /// Reject an application. Conditional on platform_review; rejected is
    /// terminal.
    #[instrument(skip(self), fields(application_id = %application_id))]
    pub async fn reject_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<FeeApplication>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reject_application"])
            .start_timer();

        let application = sqlx::query_as::<_, FeeApplication>(&format!(
            r#"
            UPDATE fee_applications
            SET status = 'rejected',
                rejected_utc = NOW()
            WHERE application_id = $1 AND status = 'platform_review'
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to reject application: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref app) = application {
            info!(application_id = %app.application_id, "Application rejected");
        }

        Ok(application)
    }

    /// Delete an application that has not yet reached review. Deleting the
    /// student's last application removes the student row too, in the same
    /// transaction.
    ///
    /// Returns whether the student record was also removed.
    #[instrument(skip(self), fields(application_id = %application_id))]
    pub async fn delete_application(
        &self,
        application_id: Uuid,
        student_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_application"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM fee_applications
            WHERE application_id = $1
              AND status IN ('onboarding_pending', 'emi_pending')
            "#,
        )
        .bind(application_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete application: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Application can no longer be deleted"
            )));
        }

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM fee_applications WHERE student_id = $1")
                .bind(student_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to count applications: {}", e))
                })?;

        let student_deleted = remaining == 0;
        if student_deleted {
            sqlx::query("DELETE FROM students WHERE student_id = $1")
                .bind(student_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to delete student: {}", e))
                })?;
        }

        tx.commit().await?;

        timer.observe_duration();

        info!(
            application_id = %application_id,
            student_deleted = student_deleted,
            "Application deleted"
        );

        Ok(student_deleted)
    }

    // -------------------------------------------------------------------------
    // Installment Operations
    // -------------------------------------------------------------------------

    /// Generate the installment schedule for an approved application.
    ///
    /// The application row is locked for the duration of the transaction, so
    /// two concurrent generation requests cannot both pass the existence
    /// check; the UNIQUE(application_id, installment_number) constraint backs
    /// this up.
    #[instrument(skip(self), fields(application_id = %application_id))]
    pub async fn generate_installments(&self, application_id: Uuid) -> Result<u32, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["generate_installments"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let application = sqlx::query_as::<_, FeeApplication>(&format!(
            r#"
            SELECT {APPLICATION_COLUMNS}
            FROM fee_applications
            WHERE application_id = $1
            FOR UPDATE
            "#
        ))
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load application: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Application not found")))?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM installments WHERE application_id = $1")
                .bind(application_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to count installments: {}", e))
                })?;

        if existing > 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Installments already generated for this application"
            )));
        }

        let generated = Self::insert_schedule(&mut tx, &application).await?;

        tx.commit().await?;

        timer.observe_duration();

        info!(
            application_id = %application_id,
            installments = generated,
            "Installment schedule generated"
        );

        Ok(generated)
    }

    /// Derive and bulk-insert the schedule rows for one application. Assumes
    /// the caller holds the application row lock and has verified that no
    /// installments exist yet.
    async fn insert_schedule(
        tx: &mut Transaction<'_, Postgres>,
        application: &FeeApplication,
    ) -> Result<u32, AppError> {
        let plan_id = application.plan_id.ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Application has no EMI plan selected"))
        })?;

        let plan = sqlx::query_as::<_, EmiPlan>(
            r#"
            SELECT plan_id, name, installments, interest_rate, processing_fee, active, created_utc
            FROM emi_plans
            WHERE plan_id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load EMI plan: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("EMI plan not found")))?;

        let monthly = application
            .monthly_installment
            .unwrap_or_else(|| monthly_amount(application.total_amount, plan.installments as u32));

        let base = application.approved_utc.unwrap_or_else(Utc::now);
        let entries = build_schedule(
            application.total_amount,
            monthly,
            plan.installments as u32,
            base,
        );

        for entry in &entries {
            sqlx::query(
                r#"
                INSERT INTO installments (
                    installment_id, application_id, installment_number, amount, due_date, status
                )
                VALUES ($1, $2, $3, $4, $5, 'pending')
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(application.application_id)
            .bind(entry.installment_number)
            .bind(entry.amount)
            .bind(entry.due_date)
            .execute(&mut **tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Installments already generated for this application"
                    ))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to insert installment: {}",
                    e
                )),
            })?;
        }

        Ok(entries.len() as u32)
    }

    /// Get an installment by ID.
    #[instrument(skip(self), fields(installment_id = %installment_id))]
    pub async fn get_installment(
        &self,
        installment_id: Uuid,
    ) -> Result<Option<Installment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_installment"])
            .start_timer();

        let installment = sqlx::query_as::<_, Installment>(&format!(
            r#"
            SELECT {INSTALLMENT_COLUMNS}
            FROM installments
            WHERE installment_id = $1
            "#
        ))
        .bind(installment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get installment: {}", e))
        })?;

        timer.observe_duration();

        Ok(installment)
    }

    /// List the installments of one application, in schedule order.
    #[instrument(skip(self), fields(application_id = %application_id))]
    pub async fn list_installments(
        &self,
        application_id: Uuid,
    ) -> Result<Vec<Installment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_installments"])
            .start_timer();

        let installments = sqlx::query_as::<_, Installment>(&format!(
            r#"
            SELECT {INSTALLMENT_COLUMNS}
            FROM installments
            WHERE application_id = $1
            ORDER BY installment_number
            "#
        ))
        .bind(application_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list installments: {}", e))
        })?;

        timer.observe_duration();

        Ok(installments)
    }

    /// Paid/pending counts and settled amount for one application.
    #[instrument(skip(self), fields(application_id = %application_id))]
    pub async fn installment_counts(
        &self,
        application_id: Uuid,
    ) -> Result<(i64, i64, Decimal), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["installment_counts"])
            .start_timer();

        let (paid, pending, amount_paid): (i64, i64, Option<Decimal>) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'paid'),
                   COUNT(*) FILTER (WHERE status <> 'paid'),
                   SUM(amount) FILTER (WHERE status = 'paid')
            FROM installments
            WHERE application_id = $1
            "#,
        )
        .bind(application_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to summarize installments: {}", e))
        })?;

        timer.observe_duration();

        Ok((paid, pending, amount_paid.unwrap_or(Decimal::ZERO)))
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Settle one installment: insert the payment record, flip the
    /// installment to paid, and decrement the application balance, all in one
    /// transaction.
    ///
    /// The installment flip is a conditional UPDATE on `status = 'pending'`;
    /// a concurrent payment that lost the race sees zero rows affected and
    /// the whole unit rolls back with Conflict. The balance update is equally
    /// conditional on the application being approved or active, so a payment
    /// can never pull an application out of review or out of `rejected`.
    #[instrument(skip(self, installment), fields(installment_id = %installment.installment_id))]
    pub async fn pay_installment(
        &self,
        installment: &Installment,
        user_id: Uuid,
        method: &str,
    ) -> Result<PaymentOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["pay_installment"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let payment_id = Uuid::new_v4();
        let transaction_id = format!("TXN-{}", Uuid::new_v4().simple());
        let amount = installment.amount.round_dp(2);

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (
                payment_id, application_id, installment_id, user_id,
                amount, method, transaction_id, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(installment.application_id)
        .bind(installment.installment_id)
        .bind(user_id)
        .bind(amount)
        .bind(method)
        .bind(&transaction_id)
        .bind(PaymentStatus::Completed.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        let flipped = sqlx::query(
            r#"
            UPDATE installments
            SET status = 'paid',
                paid_utc = NOW(),
                payment_id = $2
            WHERE installment_id = $1 AND status = 'pending'
            "#,
        )
        .bind(installment.installment_id)
        .bind(payment_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update installment: {}", e))
        })?;

        if flipped.rows_affected() == 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Installment already paid"
            )));
        }

        // Only approved or active applications accept payments; anything else
        // (under review, rejected, completed) rolls the settlement back.
        let updated: Option<(Decimal, String)> = sqlx::query_as(
            r#"
            UPDATE fee_applications
            SET remaining_amount = remaining_amount - $2,
                status = CASE
                    WHEN remaining_amount - $2 <= 0 THEN 'completed'
                    ELSE 'active'
                END
            WHERE application_id = $1
              AND status IN ('approved', 'active')
            RETURNING remaining_amount, status
            "#,
        )
        .bind(installment.application_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update application balance: {}", e))
        })?;

        let (remaining_amount, application_status) = updated.ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Application is not accepting payments"))
        })?;

        tx.commit().await?;

        timer.observe_duration();

        info!(
            installment_id = %installment.installment_id,
            transaction_id = %transaction_id,
            remaining_amount = %remaining_amount,
            application_status = %application_status,
            "Installment paid"
        );

        Ok(PaymentOutcome {
            payment,
            remaining_amount,
            application_status,
        })
    }

    /// List the payment audit trail of one application.
    #[instrument(skip(self), fields(application_id = %application_id))]
    pub async fn list_payments(&self, application_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE application_id = $1
            ORDER BY created_utc
            "#
        ))
        .bind(application_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }
}
