use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::AppError;
use crate::models::{OtpDigits, SeedStatus, TotpAlgorithm};
use crate::repositories::TotpSeedRepository;
use crate::services::TotpService;

/// 登録結果（ハンドラがレスポンスDTOへ写像する）
#[derive(Debug)]
pub struct Enrollment {
    pub secret: String,
    pub provision_uri: String,
    pub qrcode_base64: String,
    pub digits: OtpDigits,
    pub period_seconds: i32,
    pub algorithm: TotpAlgorithm,
}

/// MFAライフサイクルコントローラ
///
/// 状態遷移: pending → active → disabled（disabled は終端）
///
/// シードストアと検証器を束ね、操作ごとの前提条件を強制する。
/// 依存はコンストラクタで注入する。プロセス全体の可変状態には依存しない。
#[derive(Clone)]
pub struct MfaService {
    seed_repo: TotpSeedRepository,
    totp: TotpService,
}

impl MfaService {
    pub fn new(seed_repo: TotpSeedRepository, totp: TotpService) -> Self {
        Self { seed_repo, totp }
    }

    /// シード登録（再登録可）
    ///
    /// 既存ユーザーでも常に新しいシークレットを発行し pending に戻す。
    /// 行の重複は upsert の原子性で防ぐ。
    pub async fn enroll(&self, user_id: i64) -> Result<Enrollment, AppError> {
        let key = self.totp.generate_enrollment(user_id)?;

        let seed = self
            .seed_repo
            .upsert_pending(
                user_id,
                &key.secret_base32,
                self.totp.algorithm(),
                self.totp.digits(),
                self.totp.period_seconds() as i32,
            )
            .await?;

        tracing::info!(user_id, "TOTPシード登録");

        Ok(Enrollment {
            secret: key.secret_base32,
            provision_uri: key.provision_uri,
            qrcode_base64: key.qrcode_base64,
            digits: seed.digits,
            period_seconds: seed.period_seconds,
            algorithm: seed.algo,
        })
    }

    /// 認証コード検証（activate / verify 共通ルーチン）
    ///
    /// 入口は2つだが挙動を分岐させないため、実装はこの1本に集約する。
    ///
    /// # Note
    /// - disabled のシードは検証器を呼ばずに不一致を返す
    /// - 一致かつ pending の場合は active へ昇格（active のままの再検証は無遷移）
    pub async fn check_code(&self, user_id: i64, code: &str) -> Result<bool, AppError> {
        let seed = self
            .seed_repo
            .find_by_user_id(user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if seed.status == SeedStatus::Disabled {
            return Ok(false);
        }

        let ok = TotpService::verify_code(&seed, code, unix_now()?)?;

        if ok && seed.status == SeedStatus::Pending {
            // 読み取り時点の判定をそのまま書き込まず、条件付きUPDATEに任せる。
            // 読み取り後に disable / 再登録が割り込んだ場合は昇格しない。
            let promoted = self
                .seed_repo
                .promote_pending(user_id, &seed.secret_base32)
                .await?;
            if promoted > 0 {
                tracing::info!(user_id, "TOTPシード有効化");
            }
        }

        Ok(ok)
    }

    /// シード無効化（終端状態）
    ///
    /// 既存ユーザーなら事前状態にかかわらず成功する。該当行なしは NotFound。
    pub async fn disable(&self, user_id: i64) -> Result<(), AppError> {
        let affected = self
            .seed_repo
            .set_status(user_id, SeedStatus::Disabled)
            .await?;

        if affected == 0 {
            return Err(AppError::NotFound);
        }

        tracing::info!(user_id, "TOTPシード無効化");
        Ok(())
    }
}

/// 現在のUNIX時刻（秒）
fn unix_now() -> Result<u64, AppError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| {
            tracing::error!(error = ?e, "システム時刻取得エラー");
            AppError::Internal(anyhow::anyhow!("system time error"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TotpSeed;
    use crate::repositories::TotpSeedRepository;
    use data_encoding::BASE32_NOPAD;
    use sqlx::PgPool;
    use totp_rs::TOTP;

    // DBを使うテスト（cargo test -- --ignored で実行）

    fn test_service(pool: PgPool) -> MfaService {
        MfaService::new(
            TotpSeedRepository::new(pool),
            TotpService::new("TestApp".to_string()),
        )
    }

    /// 保存済みシードから現在時刻のコードを導出（認証アプリ相当）
    fn current_code(seed: &TotpSeed) -> String {
        let totp = TOTP::new(
            seed.algo.to_totp_rs(),
            seed.digits.count(),
            1,
            seed.period_seconds as u64,
            BASE32_NOPAD.decode(seed.secret_base32.as_bytes()).unwrap(),
            None,
            String::new(),
        )
        .unwrap();
        totp.generate_current().unwrap()
    }

    async fn stored_seed(pool: &PgPool, user_id: i64) -> TotpSeed {
        TotpSeedRepository::new(pool.clone())
            .find_by_user_id(user_id)
            .await
            .unwrap()
            .unwrap()
    }

    #[sqlx::test]
    #[ignore]
    async fn test_enroll_twice_leaves_one_row_with_latest_secret(pool: PgPool) {
        let service = test_service(pool.clone());

        service.enroll(1001).await.unwrap();
        let second = service.enroll(1001).await.unwrap();

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM mfa_totp_seeds WHERE user_id = $1")
                .bind(1001i64)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);

        let stored = stored_seed(&pool, 1001).await;
        assert_eq!(stored.secret_base32, second.secret);
        assert_eq!(stored.status, SeedStatus::Pending);
    }

    #[sqlx::test]
    #[ignore]
    async fn test_correct_code_promotes_pending_to_active(pool: PgPool) {
        let service = test_service(pool.clone());
        service.enroll(1001).await.unwrap();
        let seed = stored_seed(&pool, 1001).await;

        let ok = service.check_code(1001, &current_code(&seed)).await.unwrap();
        assert!(ok);
        assert_eq!(stored_seed(&pool, 1001).await.status, SeedStatus::Active);

        // active 後の再検証は一致のまま、状態は変わらない
        let ok = service.check_code(1001, &current_code(&seed)).await.unwrap();
        assert!(ok);
        assert_eq!(stored_seed(&pool, 1001).await.status, SeedStatus::Active);
    }

    #[sqlx::test]
    #[ignore]
    async fn test_disabled_seed_rejects_valid_code_and_stays_disabled(pool: PgPool) {
        let service = test_service(pool.clone());
        service.enroll(1001).await.unwrap();
        let seed = stored_seed(&pool, 1001).await;

        service.disable(1001).await.unwrap();

        // 無効化済みシードは正しいコードでも一致しないし、復活もしない
        let ok = service.check_code(1001, &current_code(&seed)).await.unwrap();
        assert!(!ok);
        assert_eq!(stored_seed(&pool, 1001).await.status, SeedStatus::Disabled);
    }

    #[sqlx::test]
    #[ignore]
    async fn test_operations_on_unknown_user_return_not_found(pool: PgPool) {
        let service = test_service(pool);
        assert!(matches!(
            service.check_code(999, "123456").await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(service.disable(999).await, Err(AppError::NotFound)));
    }

    #[sqlx::test]
    #[ignore]
    async fn test_disable_is_terminal_and_repeatable(pool: PgPool) {
        let service = test_service(pool.clone());
        service.enroll(1001).await.unwrap();

        service.disable(1001).await.unwrap();
        // 事前状態にかかわらず成功する
        service.disable(1001).await.unwrap();
        assert_eq!(stored_seed(&pool, 1001).await.status, SeedStatus::Disabled);
    }
}
