pub mod audit_log;
pub mod totp_seed;

pub use audit_log::AuditLogRepository;
pub use totp_seed::TotpSeedRepository;
