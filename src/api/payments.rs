use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Html,
    Json,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::auth::middleware::AuthUser;
use crate::db::{Payment, Plan, User};
use crate::payments::activation::{activate_subscription, ActivationOutcome};
use crate::payments::charge_amount;
use crate::AppState;

type HmacSha512 = Hmac<Sha512>;

/// Verify a Paystack webhook signature: HMAC-SHA512 over the exact raw
/// request bytes, hex-encoded in the x-paystack-signature header
fn verify_paystack_signature(secret: &str, signature_header: &str, payload: &[u8]) -> bool {
    let expected = match hex::decode(signature_header) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    // Constant-time comparison
    mac.verify_slice(&expected).is_ok()
}

#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    pub plan: String,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct InitiateResponse {
    pub message: String,
    pub authorization_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChargeEvent {
    pub event: String,
    pub data: Option<ChargeEventData>,
}

#[derive(Debug, Deserialize)]
pub struct ChargeEventData {
    pub reference: String,
    pub amount: Option<i64>,
    pub channel: Option<String>,
}

/// POST /paystack/initiate (authenticated)
///
/// Creates a hosted checkout session and persists the pending Payment row
/// before the authorization URL is returned, so a later webhook always has
/// a local record to reconcile against.
pub async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(request): Json<InitiateRequest>,
) -> Result<Json<InitiateResponse>, ApiError> {
    let plan = Plan::parse(&request.plan)
        .ok_or_else(|| ApiError::validation_field("plan", "Invalid or unsupported plan"))?;
    let amount = charge_amount(plan, &request.currency)
        .ok_or_else(|| ApiError::validation_field("currency", "Unsupported currency"))?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&auth.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let tx = state
        .paystack
        .initialize_transaction(&user.email, amount, &request.currency)
        .await
        .map_err(|e| {
            tracing::error!("Failed to initialize transaction: {}", e);
            ApiError::upstream("Payment initialization failed")
        })?;

    let metadata = serde_json::json!({ "access_code": tx.access_code }).to_string();
    sqlx::query(
        r#"
        INSERT INTO payments (id, user_id, transaction_ref, amount, currency, method, plan, payment_date, metadata)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&user.id)
    .bind(&tx.reference)
    .bind(amount)
    .bind(request.currency.to_ascii_uppercase())
    .bind("paystack")
    .bind(plan.to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(&metadata)
    .execute(&state.db)
    .await?;

    tracing::info!(
        "Initiated {} plan for user {} (ref {})",
        plan,
        user.id,
        tx.reference
    );

    Ok(Json(InitiateResponse {
        message: format!("Initialized {} plan", plan),
        authorization_url: tx.authorization_url,
    }))
}

/// GET /paystack/callback
///
/// Browser redirect target after checkout. Renders a status page and
/// nothing more; the webhook is the only path that mutates entitlement,
/// since this round trip may never happen and cannot be trusted.
pub async fn payment_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> (StatusCode, Html<&'static str>) {
    let Some(reference) = query.reference else {
        return (StatusCode::BAD_REQUEST, Html("Reference not provided"));
    };

    match state.paystack.verify_transaction(&reference).await {
        Ok(tx) if tx.status == "success" => {
            tracing::info!("Callback: payment successful (ref {})", reference);
            (StatusCode::OK, Html("Payment successful. Welcome!"))
        }
        Ok(_) => (StatusCode::OK, Html("Payment failed or incomplete.")),
        Err(e) => {
            tracing::warn!("Callback: could not verify {}: {}", reference, e);
            (StatusCode::OK, Html("Payment status is pending confirmation."))
        }
    }
}

/// POST /paystack/webhook
///
/// The authoritative activation path. Delivery is at-least-once and may be
/// concurrent for the same reference; double activation is prevented by the
/// unique payment_id index, with the conflict treated as a benign no-op.
/// Benign reconciliation misses are acknowledged with 200 so the gateway
/// stops retrying a permanently unresolvable event.
pub async fn paystack_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    let signature = headers
        .get("x-paystack-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_paystack_signature(&state.config.paystack.webhook_secret, signature, &body) {
        tracing::warn!("Webhook signature verification failed");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let event: ChargeEvent = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!("Failed to parse webhook payload: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    if event.event != "charge.success" {
        tracing::debug!("Ignoring webhook event {}", event.event);
        return Ok(StatusCode::OK);
    }

    let Some(data) = event.data else {
        tracing::warn!("charge.success event without data field");
        return Ok(StatusCode::OK);
    };

    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE transaction_ref = ?")
        .bind(&data.reference)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("Webhook payment lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let Some(payment) = payment else {
        // A real event for a reference we never initiated: acknowledge so
        // the gateway stops retrying, surface for investigation
        tracing::warn!("Webhook for unknown transaction_ref {}", data.reference);
        return Ok(StatusCode::OK);
    };

    // The confirmed amount must match what we quoted at initiation;
    // a mismatch goes to manual review instead of silently activating
    if let Some(amount) = data.amount {
        if amount != payment.amount {
            tracing::warn!(
                "Webhook amount mismatch for ref {}: confirmed {} vs initiated {}",
                data.reference,
                amount,
                payment.amount
            );
            return Ok(StatusCode::OK);
        }
    }

    // Plan strings in payments were validated at initiation; anything else
    // here is an invariant violation
    let plan = Plan::parse(&payment.plan).ok_or_else(|| {
        tracing::error!("Payment {} carries unknown plan {:?}", payment.id, payment.plan);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match activate_subscription(&state.db, &payment.user_id, &payment.id, plan).await {
        Ok(ActivationOutcome::Activated) => {
            tracing::info!(
                "Subscription activated for user {} ({} plan, ref {})",
                payment.user_id,
                plan,
                data.reference
            );
        }
        Ok(ActivationOutcome::AlreadyActive) => {
            tracing::debug!("Duplicate webhook delivery for ref {}", data.reference);
        }
        Err(e) => {
            tracing::error!("Activation failed for ref {}: {}", data.reference, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db;
    use axum::http::HeaderValue;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"event":"charge.success"}"#;
        let sig = sign("whsec", body);
        assert!(verify_paystack_signature("whsec", &sig, body));
    }

    #[test]
    fn test_signature_rejects_tampered_body() {
        let sig = sign("whsec", br#"{"event":"charge.success","data":{"amount":100}}"#);
        assert!(!verify_paystack_signature(
            "whsec",
            &sig,
            br#"{"event":"charge.success","data":{"amount":999}}"#
        ));
    }

    #[test]
    fn test_signature_rejects_wrong_secret_and_garbage() {
        let body = b"payload";
        let sig = sign("whsec", body);
        assert!(!verify_paystack_signature("other", &sig, body));
        assert!(!verify_paystack_signature("whsec", "not-hex!", body));
        assert!(!verify_paystack_signature("whsec", "", body));
    }

    async fn test_state() -> Arc<AppState> {
        let mut config = Config::default();
        config.paystack.webhook_secret = "whsec-test".to_string();
        let pool = db::init_in_memory().await.unwrap();
        Arc::new(AppState::new(config, pool))
    }

    async fn seed_payment(state: &AppState, reference: &str, amount: i64) -> (String, String) {
        let user_id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)")
            .bind(&user_id)
            .bind(format!("{user_id}@example.com"))
            .bind("x")
            .execute(&state.db)
            .await
            .unwrap();

        let payment_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO payments (id, user_id, transaction_ref, amount, currency, method, plan, payment_date)
            VALUES (?, ?, ?, ?, 'USD', 'paystack', 'weekly', ?)
            "#,
        )
        .bind(&payment_id)
        .bind(&user_id)
        .bind(reference)
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .execute(&state.db)
        .await
        .unwrap();

        (user_id, payment_id)
    }

    fn signed_headers(secret: &str, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-paystack-signature",
            HeaderValue::from_str(&sign(secret, body)).unwrap(),
        );
        headers
    }

    async fn subscription_count(state: &AppState) -> i64 {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(&state.db)
            .await
            .unwrap();
        count.0
    }

    #[tokio::test]
    async fn test_webhook_duplicate_delivery_activates_once() {
        let state = test_state().await;
        seed_payment(&state, "ref-123", 400).await;

        let body = Bytes::from_static(
            br#"{"event":"charge.success","data":{"reference":"ref-123","amount":400,"channel":"card"}}"#,
        );
        let headers = signed_headers("whsec-test", &body);

        for _ in 0..2 {
            let status = paystack_webhook(
                State(state.clone()),
                headers.clone(),
                body.clone(),
            )
            .await
            .unwrap();
            assert_eq!(status, StatusCode::OK);
        }

        assert_eq!(subscription_count(&state).await, 1);
    }

    #[tokio::test]
    async fn test_webhook_tampered_body_rejected_without_mutation() {
        let state = test_state().await;
        seed_payment(&state, "ref-tamper", 400).await;

        let original =
            br#"{"event":"charge.success","data":{"reference":"ref-tamper","amount":400}}"#;
        let headers = signed_headers("whsec-test", original);
        let tampered = Bytes::from_static(
            br#"{"event":"charge.success","data":{"reference":"ref-tamper","amount":1}}"#,
        );

        let result = paystack_webhook(State(state.clone()), headers, tampered).await;
        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
        assert_eq!(subscription_count(&state).await, 0);
    }

    #[tokio::test]
    async fn test_webhook_missing_signature_rejected() {
        let state = test_state().await;
        let body = Bytes::from_static(br#"{"event":"charge.success"}"#);
        let result = paystack_webhook(State(state.clone()), HeaderMap::new(), body).await;
        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_webhook_unknown_reference_acknowledged() {
        let state = test_state().await;

        let body = Bytes::from_static(
            br#"{"event":"charge.success","data":{"reference":"never-initiated","amount":400}}"#,
        );
        let headers = signed_headers("whsec-test", &body);

        let status = paystack_webhook(State(state.clone()), headers, body)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(subscription_count(&state).await, 0);
    }

    #[tokio::test]
    async fn test_webhook_other_events_ignored() {
        let state = test_state().await;
        seed_payment(&state, "ref-refund", 400).await;

        let body = Bytes::from_static(
            br#"{"event":"refund.processed","data":{"reference":"ref-refund","amount":400}}"#,
        );
        let headers = signed_headers("whsec-test", &body);

        let status = paystack_webhook(State(state.clone()), headers, body)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(subscription_count(&state).await, 0);
    }

    #[tokio::test]
    async fn test_webhook_amount_mismatch_skips_activation() {
        let state = test_state().await;
        seed_payment(&state, "ref-mismatch", 400).await;

        let body = Bytes::from_static(
            br#"{"event":"charge.success","data":{"reference":"ref-mismatch","amount":100}}"#,
        );
        let headers = signed_headers("whsec-test", &body);

        let status = paystack_webhook(State(state.clone()), headers, body)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(subscription_count(&state).await, 0);
    }

    #[tokio::test]
    async fn test_initiate_unsupported_plan_creates_no_payment() {
        let state = test_state().await;
        let auth = AuthUser {
            user_id: "user-1".to_string(),
            role: "standard-seeker".to_string(),
            email_verified: true,
        };

        let result = initiate_payment(
            State(state.clone()),
            auth,
            Json(InitiateRequest {
                plan: "yearly".to_string(),
                currency: "USD".to_string(),
            }),
        )
        .await;
        assert!(result.is_err());

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_initiate_unknown_user_is_not_found() {
        let state = test_state().await;
        let auth = AuthUser {
            user_id: "no-such-user".to_string(),
            role: "standard-seeker".to_string(),
            email_verified: true,
        };

        let result = initiate_payment(
            State(state.clone()),
            auth,
            Json(InitiateRequest {
                plan: "weekly".to_string(),
                currency: "USD".to_string(),
            }),
        )
        .await;
        assert!(result.is_err());
    }
}
