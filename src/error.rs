use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 入力不正（ストレージアクセス前に検出する）
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// 対象ユーザーのTOTPシードが存在しない
    #[error("TOTPシードが見つかりません")]
    NotFound,

    /// ストレージ障害（このレイヤではリトライしない）
    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    /// コード生成・導出の予期しない失敗
    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "対象のユーザーが見つかりません".to_string(),
            ),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
