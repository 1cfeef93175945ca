pub mod otp;

pub use otp::{OtpRepository, PgOtpRepository, SchemaError};
