pub mod health;
pub mod totp;

pub use health::health_check;
pub use totp::{activate, disable, enroll, verify};
