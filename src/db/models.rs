use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Default role assigned at registration. The platform never elevates roles
/// through this service; the column exists so tokens can carry whatever an
/// operator sets out of band.
pub const DEFAULT_ROLE: &str = "standard-seeker";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    /// Gateway-issued transaction reference; the webhook reconciles on this
    pub transaction_ref: String,
    /// Amount as sent to the gateway (minor units, or whole units for
    /// zero-decimal currencies)
    pub amount: i64,
    pub currency: String,
    pub method: String,
    pub plan: String,
    pub payment_date: String,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub payment_id: String,
    pub plan_type: String,
    pub start_date: String,
    pub expiry_date: String,
}

/// Subscription plans sold through the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Daily,
    Weekly,
    Monthly,
}

impl Plan {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    /// Entitlement window length in days
    pub fn duration_days(&self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_parse() {
        assert_eq!(Plan::parse("daily"), Some(Plan::Daily));
        assert_eq!(Plan::parse("WEEKLY"), Some(Plan::Weekly));
        assert_eq!(Plan::parse("Monthly"), Some(Plan::Monthly));
        assert_eq!(Plan::parse("yearly"), None);
        assert_eq!(Plan::parse(""), None);
    }

    #[test]
    fn test_plan_durations() {
        assert_eq!(Plan::Daily.duration_days(), 1);
        assert_eq!(Plan::Weekly.duration_days(), 7);
        assert_eq!(Plan::Monthly.duration_days(), 30);
    }
}
