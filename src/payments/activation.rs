//! Subscription activation.
//!
//! Turns a confirmed payment into a time-bounded entitlement, exactly once.
//! Webhook delivery is at-least-once, so the insert leans on the UNIQUE
//! constraint on `subscriptions.payment_id`: a duplicate delivery hits the
//! constraint and is reported as `AlreadyActive`, not an error.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::db::{DbPool, Plan};

/// Result of an activation attempt
#[derive(Debug, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// A new subscription row was created
    Activated,
    /// This payment was already activated by an earlier delivery
    AlreadyActive,
}

/// Entitlement window for a plan starting at `start`
pub fn compute_expiry(plan: Plan, start: DateTime<Utc>) -> DateTime<Utc> {
    start + Duration::days(plan.duration_days())
}

/// Insert the subscription row for a confirmed payment.
/// Safe to call concurrently for the same payment; the database decides
/// the winner.
pub async fn activate_subscription(
    pool: &DbPool,
    user_id: &str,
    payment_id: &str,
    plan: Plan,
) -> Result<ActivationOutcome, sqlx::Error> {
    let start = Utc::now();
    let expiry = compute_expiry(plan, start);

    let result = sqlx::query(
        r#"
        INSERT INTO subscriptions (id, user_id, payment_id, plan_type, start_date, expiry_date)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(payment_id)
    .bind(plan.to_string())
    .bind(start.to_rfc3339())
    .bind(expiry.to_rfc3339())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(ActivationOutcome::Activated),
        Err(sqlx::Error::Database(db_err))
            if db_err.message().contains("UNIQUE constraint failed") =>
        {
            Ok(ActivationOutcome::AlreadyActive)
        }
        Err(e) => Err(e),
    }
}
