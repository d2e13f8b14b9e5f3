pub mod email;

pub use email::OtpMailer;
