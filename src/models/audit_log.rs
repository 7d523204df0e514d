use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// 監査対象の操作種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "audit_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Enroll,
    Activate,
    Verify,
    Disable,
}

impl AuditAction {
    /// tracing フィールド用
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enroll => "enroll",
            Self::Activate => "activate",
            Self::Verify => "verify",
            Self::Disable => "disable",
        }
    }
}

/// MFA監査ログ（追記専用・作成後は不変）
///
/// ip_address / user_agent はクライアント申告の自由文字列であり信用しない。
#[derive(Debug, FromRow, Serialize)]
pub struct MfaAuditLog {
    pub id: i64,
    pub user_id: i64,
    pub action: AuditAction,
    pub success: bool,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_as_str() {
        assert_eq!(AuditAction::Enroll.as_str(), "enroll");
        assert_eq!(AuditAction::Activate.as_str(), "activate");
        assert_eq!(AuditAction::Verify.as_str(), "verify");
        assert_eq!(AuditAction::Disable.as_str(), "disable");
    }
}
