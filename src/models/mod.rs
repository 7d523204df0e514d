pub mod audit_log;
pub mod totp_seed;

pub use audit_log::{AuditAction, MfaAuditLog};
pub use totp_seed::{OtpDigits, SeedStatus, TotpAlgorithm, TotpSeed};
