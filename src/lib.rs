pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod notifications;
pub mod otp;
pub mod payments;

pub use db::DbPool;

use config::Config;
use notifications::OtpMailer;
use otp::OtpStore;
use payments::PaystackClient;
use std::time::Duration;

/// Shared application state. Every collaborator is constructed here and
/// injected, so tests can build an AppState around doubles (an in-memory
/// pool, an unconfigured mailer, a gateway client pointed at a stub server).
pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub otp_store: OtpStore,
    pub mailer: OtpMailer,
    pub paystack: PaystackClient,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let otp_store = OtpStore::new(Duration::from_secs(config.otp.ttl_seconds));
        let mailer = OtpMailer::new(config.email.clone());
        let paystack = PaystackClient::new(config.paystack.clone());
        Self {
            config,
            db,
            otp_store,
            mailer,
            paystack,
        }
    }
}
