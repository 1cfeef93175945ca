pub mod otp;

pub use otp::{OtpRecord, OtpStatus};
