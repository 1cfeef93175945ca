pub mod health;
pub mod otp;

pub use health::health_check;
pub use otp::{request_otp, validate_otp};
