use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::repositories::{AuditLogRepository, TotpSeedRepository};
use crate::services::{MfaService, TotpService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL コネクションプール
    pub db_pool: PgPool,
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// MFAライフサイクルサービス
    pub mfa_service: MfaService,
    /// 監査ログリポジトリ
    pub audit_repo: AuditLogRepository,
}

impl AppState {
    /// 新しい AppState を作成
    ///
    /// ストア・サービスはここで一度だけ構築して注入する。
    /// グローバルなDBハンドルは持たない。
    pub fn new(db_pool: PgPool, config: Config) -> Self {
        let config = Arc::new(config);
        let seed_repo = TotpSeedRepository::new(db_pool.clone());
        let audit_repo = AuditLogRepository::new(db_pool.clone());
        let totp_service = TotpService::new(config.totp_issuer.clone());
        let mfa_service = MfaService::new(seed_repo, totp_service);

        Self {
            db_pool,
            config,
            mfa_service,
            audit_repo,
        }
    }
}
