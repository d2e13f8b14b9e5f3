//! Paystack gateway adapter.
//!
//! A narrow client over the hosted-checkout API: initialize a transaction
//! and query its status by reference. Webhook signature verification lives
//! with the webhook handler, since it operates on raw request bytes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PaystackConfig;
use crate::db::Plan;

/// Price table per currency, whole units per plan: (daily, weekly, monthly)
const PRICING: &[(&str, [i64; 3])] = &[
    ("KES", [100, 500, 1500]),
    ("NGN", [200, 1000, 2000]),
    ("GHS", [2, 10, 20]),
    ("ZAR", [5, 25, 50]),
    ("USD", [1, 4, 8]),
];

/// Currencies with no minor unit; amounts are passed as whole numbers
const ZERO_DECIMAL_CURRENCIES: &[&str] = &["JPY", "KRW", "CLP"];

/// Resolve the charge amount for a plan/currency pair, in the unit the
/// gateway expects (minor units unless the currency has none).
/// Returns None for an unsupported currency.
pub fn charge_amount(plan: Plan, currency: &str) -> Option<i64> {
    let currency = currency.to_ascii_uppercase();
    let prices = PRICING
        .iter()
        .find(|(c, _)| *c == currency)
        .map(|(_, p)| p)?;
    let base = match plan {
        Plan::Daily => prices[0],
        Plan::Weekly => prices[1],
        Plan::Monthly => prices[2],
    };
    if ZERO_DECIMAL_CURRENCIES.contains(&currency.as_str()) {
        Some(base)
    } else {
        Some(base * 100)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Deserialize)]
pub struct InitializeData {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyData {
    pub status: String,
    pub reference: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayEnvelope<T> {
    status: bool,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    email: &'a str,
    amount: i64,
    currency: String,
    channels: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
}

/// HTTP client for the Paystack API
pub struct PaystackClient {
    http: reqwest::Client,
    config: PaystackConfig,
}

impl PaystackClient {
    pub fn new(config: PaystackConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Create a hosted checkout session. The returned reference is the key
    /// the webhook later reconciles against.
    pub async fn initialize_transaction(
        &self,
        email: &str,
        amount: i64,
        currency: &str,
    ) -> Result<InitializeData, GatewayError> {
        let url = format!("{}/transaction/initialize", self.config.base_url);
        let request = InitializeRequest {
            email,
            amount,
            currency: currency.to_ascii_uppercase(),
            channels: &["card", "mobile_money"],
            callback_url: self.config.callback_url.as_deref(),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let envelope: GatewayEnvelope<InitializeData> = response.json().await?;
        match envelope.data {
            Some(data) if envelope.status => Ok(data),
            _ => Err(GatewayError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "no data in gateway response".to_string()),
            )),
        }
    }

    /// Query the status of a transaction by reference. Used by the browser
    /// callback page only; never drives activation.
    pub async fn verify_transaction(&self, reference: &str) -> Result<VerifyData, GatewayError> {
        let url = format!("{}/transaction/verify/{}", self.config.base_url, reference);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?
            .error_for_status()?;

        let envelope: GatewayEnvelope<VerifyData> = response.json().await?;
        match envelope.data {
            Some(data) if envelope.status => Ok(data),
            _ => Err(GatewayError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "no data in gateway response".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_unit_multiplication() {
        assert_eq!(charge_amount(Plan::Daily, "USD"), Some(100));
        assert_eq!(charge_amount(Plan::Weekly, "NGN"), Some(100_000));
        assert_eq!(charge_amount(Plan::Monthly, "KES"), Some(150_000));
    }

    #[test]
    fn test_currency_case_insensitive() {
        assert_eq!(charge_amount(Plan::Monthly, "usd"), Some(800));
        assert_eq!(charge_amount(Plan::Monthly, "Usd"), Some(800));
    }

    #[test]
    fn test_unsupported_currency() {
        assert_eq!(charge_amount(Plan::Daily, "EUR"), None);
        assert_eq!(charge_amount(Plan::Daily, ""), None);
    }

    #[test]
    fn test_zero_decimal_currencies_not_in_price_table() {
        // JPY/KRW/CLP are recognized as zero-decimal but have no prices
        // configured, so they are rejected as unsupported
        assert_eq!(charge_amount(Plan::Daily, "JPY"), None);
    }
}
