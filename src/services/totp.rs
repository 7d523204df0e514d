use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use totp_rs::TOTP;

use crate::error::AppError;
use crate::models::{OtpDigits, TotpAlgorithm, TotpSeed};

/// 前後に許容する時間ステップ数（±1ステップ）
const SKEW_STEPS: u8 = 1;

/// 登録時に生成されるキーマテリアル一式
#[derive(Debug)]
pub struct EnrollmentKey {
    pub secret_base32: String,
    pub provision_uri: String,
    pub qrcode_base64: String,
}

/// TOTP (Time-based One-Time Password) サービス
///
/// シークレット生成・プロビジョニングURI・コード検証を担当する。
/// ストレージには一切触れない。
///
/// # Security
/// - シークレット平文・認証コードはログに出力しない
#[derive(Clone)]
pub struct TotpService {
    issuer: String,
    algorithm: TotpAlgorithm,
    digits: OtpDigits,
    period_seconds: u64,
}

impl TotpService {
    /// 新しい TotpService を作成（SHA1 / 6桁 / 30秒の標準パラメータ）
    pub fn new(issuer: String) -> Self {
        Self {
            issuer,
            algorithm: TotpAlgorithm::default(),
            digits: OtpDigits::default(),
            period_seconds: 30,
        }
    }

    pub fn algorithm(&self) -> TotpAlgorithm {
        self.algorithm
    }

    pub fn digits(&self) -> OtpDigits {
        self.digits
    }

    pub fn period_seconds(&self) -> u64 {
        self.period_seconds
    }

    /// アルゴリズムのハッシュ長に合わせたランダムシークレットを生成し、
    /// Base32（パディングなし）でエンコード
    ///
    /// SHA1 は 20 バイト（160ビット）、SHA256 は 32 バイト、SHA512 は 64 バイト。
    pub fn generate_secret(algorithm: TotpAlgorithm) -> String {
        let mut bytes = vec![0u8; algorithm.secret_len()];
        rand::thread_rng().fill_bytes(&mut bytes);
        BASE32_NOPAD.encode(&bytes)
    }

    /// 登録用キーを生成（シークレット + プロビジョニングURI + QRコード）
    pub fn generate_enrollment(&self, user_id: i64) -> Result<EnrollmentKey, AppError> {
        let secret_base32 = Self::generate_secret(self.algorithm);
        let totp = self.build_totp(user_id, &secret_base32)?;

        let provision_uri = totp.get_url();
        let qrcode_base64 = totp.get_qr_base64().map_err(|e| {
            tracing::error!(error = %e, "QRコード生成エラー");
            AppError::Internal(anyhow::anyhow!("qr code generation error"))
        })?;

        Ok(EnrollmentKey {
            secret_base32,
            provision_uri,
            qrcode_base64,
        })
    }

    /// シードに対して認証コードを検証
    ///
    /// # Note
    /// - 前後1ステップの時間ウィンドウを許容
    /// - 現在時刻は引数で受け取る。同一入力は常に同一結果（テスト容易性のため）
    /// - 桁数不一致・数字以外を含むコードは導出せずに不一致
    pub fn verify_code(seed: &TotpSeed, code: &str, now_unix: u64) -> Result<bool, AppError> {
        if code.len() != seed.digits.count() || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let totp = Self::totp_for_seed(seed)?;

        // check は skew 内の各ステップを導出して比較する
        Ok(totp.check(code, now_unix))
    }

    /// アカウントラベル: user{id}@{issuer小文字}
    fn account_name(&self, user_id: i64) -> String {
        format!("user{}@{}", user_id, self.issuer.to_lowercase())
    }

    /// TOTP オブジェクトを作成（登録用）
    fn build_totp(&self, user_id: i64, secret_base32: &str) -> Result<TOTP, AppError> {
        let secret_bytes = BASE32_NOPAD.decode(secret_base32.as_bytes()).map_err(|e| {
            tracing::error!(error = ?e, "シークレットのBase32デコードエラー");
            AppError::Internal(anyhow::anyhow!("invalid base32 secret"))
        })?;

        TOTP::new(
            self.algorithm.to_totp_rs(),
            self.digits.count(),
            SKEW_STEPS,
            self.period_seconds,
            secret_bytes,
            Some(self.issuer.clone()),
            self.account_name(user_id),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "TOTP作成エラー");
            AppError::Internal(anyhow::anyhow!("totp creation error"))
        })
    }

    /// シードの保存パラメータから TOTP オブジェクトを作成（検証用）
    fn totp_for_seed(seed: &TotpSeed) -> Result<TOTP, AppError> {
        let secret_bytes = BASE32_NOPAD
            .decode(seed.secret_base32.as_bytes())
            .map_err(|e| {
                tracing::error!(error = ?e, "シークレットのBase32デコードエラー");
                AppError::Internal(anyhow::anyhow!("invalid base32 secret"))
            })?;

        TOTP::new(
            seed.algo.to_totp_rs(),
            seed.digits.count(),
            SKEW_STEPS,
            seed.period_seconds as u64,
            secret_bytes,
            None,
            String::new(),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "TOTP作成エラー");
            AppError::Internal(anyhow::anyhow!("totp creation error"))
        })
    }
}
