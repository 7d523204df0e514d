use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::AuditOutcome;
use crate::models::TotpAlgorithm;
use crate::state::AppState;

// === Enroll ===

#[derive(Debug, Deserialize)]
pub struct EnrollParams {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub secret: String,
    pub provision_uri: String,
    pub qrcode_base64: String,
    pub digits: u32,
    pub period: i32,
    pub algorithm: TotpAlgorithm,
}

/// GET /enroll?user_id=1001
///
/// TOTPシードを発行する。既存ユーザーの再登録は
/// 新しいシークレットで pending に戻す（行は増えない）。
///
/// # Security
/// - シークレット平文はログ出力禁止
pub async fn enroll(
    State(state): State<AppState>,
    Query(params): Query<EnrollParams>,
) -> Result<Json<EnrollResponse>, AppError> {
    validate_user_id(params.user_id)?;

    let enrollment = state.mfa_service.enroll(params.user_id).await?;

    Ok(Json(EnrollResponse {
        secret: enrollment.secret,
        provision_uri: enrollment.provision_uri,
        qrcode_base64: enrollment.qrcode_base64,
        digits: enrollment.digits.count() as u32,
        period: enrollment.period_seconds,
        algorithm: enrollment.algorithm,
    }))
}

// === Activate / Verify ===

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub user_id: i64,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub ok: bool,
}

/// POST /activate { "user_id": 1001, "code": "123456" }
///
/// 登録直後の所持確認。コード一致かつ pending なら active へ昇格。
pub async fn activate(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Response, AppError> {
    check_code(&state, request).await
}

/// POST /verify { "user_id": 1001, "code": "654321" }
///
/// ログイン時の継続検証。activate と同じ共通ルーチンを使う
/// （初回一致時の active 昇格も同じ）。
pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Response, AppError> {
    check_code(&state, request).await
}

/// activate / verify 共通処理
///
/// 監査レイヤが業務結果を記録できるよう、一致結果を
/// レスポンス拡張（AuditOutcome）として添付する。
async fn check_code(state: &AppState, request: VerifyRequest) -> Result<Response, AppError> {
    validate_user_id(request.user_id)?;
    validate_code(&request.code)?;

    let ok = state
        .mfa_service
        .check_code(request.user_id, &request.code)
        .await?;

    let mut response = Json(VerifyResponse { ok }).into_response();
    response.extensions_mut().insert(AuditOutcome(ok));
    Ok(response)
}

// === Disable ===

#[derive(Debug, Deserialize)]
pub struct DisableRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct DisableResponse {
    pub ok: bool,
}

/// POST /disable { "user_id": 1001 }
///
/// シードを無効化（終端状態）。事前状態にかかわらず既存ユーザーなら成功。
pub async fn disable(
    State(state): State<AppState>,
    Json(request): Json<DisableRequest>,
) -> Result<Json<DisableResponse>, AppError> {
    validate_user_id(request.user_id)?;

    state.mfa_service.disable(request.user_id).await?;

    Ok(Json(DisableResponse { ok: true }))
}

// === Helper Functions ===

/// ユーザーIDバリデーション（正の整数のみ）
fn validate_user_id(user_id: i64) -> Result<(), AppError> {
    if user_id <= 0 {
        return Err(AppError::Validation(
            "user_id は正の整数で指定してください".to_string(),
        ));
    }
    Ok(())
}

/// 認証コードバリデーション
///
/// 必須チェックのみ。桁数・数字チェックは検証器側で「不一致」として扱う
/// （400 ではなく ok=false を返す）。
fn validate_code(code: &str) -> Result<(), AppError> {
    if code.is_empty() {
        return Err(AppError::Validation("認証コードは必須です".to_string()));
    }
    Ok(())
}
