use sqlx::PgPool;

use crate::models::{AuditAction, MfaAuditLog};

// mfa_audit_logs のカラム幅（マイグレーションのVARCHAR定義と一致させる）
const IP_ADDRESS_MAX_CHARS: usize = 45;
const USER_AGENT_MAX_CHARS: usize = 255;

#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 監査イベントを1件追記
    ///
    /// # Note
    /// - 追記専用。このリポジトリに更新・削除の操作はない。
    /// - ip_address / user_agent はクライアント申告値で長さの保証がないため、
    ///   カラム幅に切り詰めてから挿入する（幅超過でINSERTを失敗させない）。
    pub async fn record(
        &self,
        user_id: i64,
        action: AuditAction,
        success: bool,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<MfaAuditLog, sqlx::Error> {
        sqlx::query_as::<_, MfaAuditLog>(
            r#"
            INSERT INTO mfa_audit_logs (user_id, action, success, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, action, success, ip_address, user_agent, created_at
            "#,
        )
        .bind(user_id)
        .bind(action)
        .bind(success)
        .bind(truncate_chars(ip_address, IP_ADDRESS_MAX_CHARS))
        .bind(truncate_chars(user_agent, USER_AGENT_MAX_CHARS))
        .fetch_one(&self.pool)
        .await
    }
}

/// 文字数単位で切り詰める（VARCHAR(n) は文字数制限のため、バイト境界では切らない）
fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((index, _)) => &value[..index],
        None => value,
    }
}
