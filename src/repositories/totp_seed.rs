use sqlx::PgPool;

use crate::models::{OtpDigits, SeedStatus, TotpAlgorithm, TotpSeed};

#[derive(Clone)]
pub struct TotpSeedRepository {
    pool: PgPool,
}

impl TotpSeedRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// ユーザーIDでシードを検索
    pub async fn find_by_user_id(&self, user_id: i64) -> Result<Option<TotpSeed>, sqlx::Error> {
        sqlx::query_as::<_, TotpSeed>(
            r#"
            SELECT id, user_id, secret_base32, period_seconds, digits, algo, status,
                   created_at, updated_at
            FROM mfa_totp_seeds
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// 登録時のアトミックな upsert
    ///
    /// # Note
    /// 同一ユーザーの同時登録で行が重複しないよう、単一の
    /// INSERT ... ON CONFLICT 文で実行する（最後の書き込みが勝つ）。
    /// 既存行がある場合は secret / status(=pending) / algo / digits / period を
    /// 丸ごと置き換える。部分更新はしない。
    pub async fn upsert_pending(
        &self,
        user_id: i64,
        secret_base32: &str,
        algo: TotpAlgorithm,
        digits: OtpDigits,
        period_seconds: i32,
    ) -> Result<TotpSeed, sqlx::Error> {
        sqlx::query_as::<_, TotpSeed>(
            r#"
            INSERT INTO mfa_totp_seeds (user_id, secret_base32, algo, digits, period_seconds, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            ON CONFLICT (user_id) DO UPDATE
            SET secret_base32 = EXCLUDED.secret_base32,
                algo = EXCLUDED.algo,
                digits = EXCLUDED.digits,
                period_seconds = EXCLUDED.period_seconds,
                status = 'pending',
                updated_at = NOW()
            RETURNING id, user_id, secret_base32, period_seconds, digits, algo, status,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(secret_base32)
        .bind(algo)
        .bind(digits)
        .bind(period_seconds)
        .fetch_one(&self.pool)
        .await
    }

    /// pending のシードのみ active へ昇格し、影響行数を返す
    ///
    /// # Note
    /// 読み取り後に並行の disable / 再登録が割り込んでも安全なよう、
    /// 状態と検証済みシークレットの条件を同一のUPDATE文に含める。
    /// disabled の行や差し替え後のシードがここで active になることはない。
    pub async fn promote_pending(
        &self,
        user_id: i64,
        secret_base32: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE mfa_totp_seeds
            SET status = 'active', updated_at = NOW()
            WHERE user_id = $1 AND status = 'pending' AND secret_base32 = $2
            "#,
        )
        .bind(user_id)
        .bind(secret_base32)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// 状態を更新し、影響行数を返す（0 = 該当ユーザーなし）
    pub async fn set_status(
        &self,
        user_id: i64,
        status: SeedStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE mfa_totp_seeds
            SET status = $2, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::TotpService;
    use sqlx::PgPool;

    // DBを使うテスト（cargo test -- --ignored で実行）

    async fn insert_pending(repo: &TotpSeedRepository, user_id: i64) -> TotpSeed {
        let secret = TotpService::generate_secret(TotpAlgorithm::Sha1);
        repo.upsert_pending(user_id, &secret, TotpAlgorithm::Sha1, OtpDigits::Six, 30)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[ignore]
    async fn test_upsert_keeps_single_row_per_user(pool: PgPool) {
        let repo = TotpSeedRepository::new(pool.clone());

        let first = insert_pending(&repo, 1001).await;
        let second = insert_pending(&repo, 1001).await;

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM mfa_totp_seeds WHERE user_id = $1")
                .bind(1001i64)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);

        // 最新のシークレットだけが残る
        assert_ne!(first.secret_base32, second.secret_base32);
        let stored = repo.find_by_user_id(1001).await.unwrap().unwrap();
        assert_eq!(stored.secret_base32, second.secret_base32);
        assert_eq!(stored.status, SeedStatus::Pending);
    }

    #[sqlx::test]
    #[ignore]
    async fn test_promote_pending_activates_matching_seed(pool: PgPool) {
        let repo = TotpSeedRepository::new(pool.clone());
        let seed = insert_pending(&repo, 1001).await;

        let promoted = repo.promote_pending(1001, &seed.secret_base32).await.unwrap();
        assert_eq!(promoted, 1);
        let stored = repo.find_by_user_id(1001).await.unwrap().unwrap();
        assert_eq!(stored.status, SeedStatus::Active);

        // active 済みの行は再昇格しない（無遷移）
        let again = repo.promote_pending(1001, &seed.secret_base32).await.unwrap();
        assert_eq!(again, 0);
    }

    #[sqlx::test]
    #[ignore]
    async fn test_promote_pending_never_resurrects_disabled_seed(pool: PgPool) {
        let repo = TotpSeedRepository::new(pool.clone());
        let seed = insert_pending(&repo, 1001).await;

        // 読み取りと昇格の間に disable が割り込んだ状況を再現する
        repo.set_status(1001, SeedStatus::Disabled).await.unwrap();

        let promoted = repo.promote_pending(1001, &seed.secret_base32).await.unwrap();
        assert_eq!(promoted, 0);
        let stored = repo.find_by_user_id(1001).await.unwrap().unwrap();
        assert_eq!(stored.status, SeedStatus::Disabled);
    }

    #[sqlx::test]
    #[ignore]
    async fn test_promote_pending_skips_replaced_secret(pool: PgPool) {
        let repo = TotpSeedRepository::new(pool.clone());
        let old = insert_pending(&repo, 1001).await;

        // 読み取りと昇格の間に再登録が割り込んだ状況を再現する
        let new = insert_pending(&repo, 1001).await;

        let promoted = repo.promote_pending(1001, &old.secret_base32).await.unwrap();
        assert_eq!(promoted, 0);
        let stored = repo.find_by_user_id(1001).await.unwrap().unwrap();
        assert_eq!(stored.status, SeedStatus::Pending);
        assert_eq!(stored.secret_base32, new.secret_base32);
    }

    #[sqlx::test]
    #[ignore]
    async fn test_set_status_reports_missing_user(pool: PgPool) {
        let repo = TotpSeedRepository::new(pool);
        let affected = repo.set_status(999, SeedStatus::Disabled).await.unwrap();
        assert_eq!(affected, 0);
    }
}
