use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use totp_rs::Algorithm;

/// TOTPアルゴリズム
///
/// 元実装は自由文字列（"SHA1" など）で保持していたが、
/// データモデル境界で検証するため閉じた列挙型に固定する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "totp_algorithm", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TotpAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl TotpAlgorithm {
    /// totp-rs のアルゴリズム型へ変換
    pub fn to_totp_rs(self) -> Algorithm {
        match self {
            Self::Sha1 => Algorithm::SHA1,
            Self::Sha256 => Algorithm::SHA256,
            Self::Sha512 => Algorithm::SHA512,
        }
    }

    /// シークレットのバイト長（ハッシュ出力長に合わせる）
    pub fn secret_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }
}

impl Default for TotpAlgorithm {
    fn default() -> Self {
        Self::Sha1
    }
}

/// コード桁数（6 または 8 のみ許可）
///
/// SMALLINT カラムにそのまま写像される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[repr(i16)]
pub enum OtpDigits {
    Six = 6,
    Eight = 8,
}

impl OtpDigits {
    pub fn count(self) -> usize {
        self as usize
    }
}

impl Default for OtpDigits {
    fn default() -> Self {
        Self::Six
    }
}

/// シードの状態
///
/// pending → active → disabled（disabled は終端、以降の遷移なし）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "seed_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SeedStatus {
    Pending,
    Active,
    Disabled,
}

/// ユーザーごとのTOTPシード（user_id で一意）
///
/// シークレットは Base32（パディングなし）で保存される。
/// 平文シークレットはログに出力禁止
#[derive(Debug, FromRow)]
pub struct TotpSeed {
    pub id: i64,
    pub user_id: i64,
    pub secret_base32: String,
    pub period_seconds: i32,
    pub digits: OtpDigits,
    pub algo: TotpAlgorithm,
    pub status: SeedStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
