pub mod mfa;
pub mod totp;

pub use mfa::MfaService;
pub use totp::TotpService;
