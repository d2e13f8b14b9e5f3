pub mod activation;
pub mod paystack;

pub use paystack::{charge_amount, GatewayError, PaystackClient};
