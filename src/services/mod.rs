pub mod otp;

pub use otp::{OTP_TTL, OtpPolicy, OtpService, OtpVerdict, generate_code};
