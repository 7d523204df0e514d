use std::net::SocketAddr;

use axum::{
    body::{Body, to_bytes},
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::models::AuditAction;
use crate::state::AppState;

/// activate / verify ハンドラが添付する業務結果
///
/// 監査レイヤはHTTPステータスよりこちらを優先して記録する
/// （コード不一致の200応答を「成功」と記録しないため）。
#[derive(Debug, Clone, Copy)]
pub struct AuditOutcome(pub bool);

/// 監査対象ボディの読み取り上限（1MiB）
const BODY_LIMIT: usize = 1024 * 1024;

/// 監査レイヤ
///
/// enroll / activate / verify / disable の各ルートを包み、
/// ハンドラの結果にかかわらずリクエスト1件につき監査ログを必ず1件追記する。
///
/// # Note
/// - user_id はクエリ → JSONボディの順でベストエフォート抽出する
///   （ハンドラ側のボディパース失敗時も監査対象を特定できるように）
/// - 記録失敗は主処理に影響させない（エラーログのみ）
pub async fn record_audit(
    State((state, action)): State<(AppState, AuditAction)>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    // ボディをバッファしてから元のリクエストを組み立て直す
    let bytes = to_bytes(body, BODY_LIMIT).await.unwrap_or_default();
    let user_id = extract_user_id(parts.uri.query(), &bytes);
    let ip_address = client_ip(&parts.headers, parts.extensions.get::<ConnectInfo<SocketAddr>>());
    let user_agent = parts
        .headers
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let request = Request::from_parts(parts, Body::from(bytes.clone()));
    let response = next.run(request).await;

    let success = match response.extensions().get::<AuditOutcome>() {
        Some(outcome) => outcome.0,
        None => response.status().is_success() || response.status().is_redirection(),
    };

    match state
        .audit_repo
        .record(user_id, action, success, &ip_address, &user_agent)
        .await
    {
        Ok(entry) => {
            tracing::debug!(audit_id = entry.id, user_id, action = action.as_str(), "監査ログ記録");
        }
        Err(e) => {
            // コンプライアンスデータの欠落。主処理は失敗させない。
            tracing::error!(error = ?e, user_id, action = action.as_str(), "監査ログの記録に失敗");
        }
    }

    response
}

#[derive(Deserialize)]
struct UserIdBody {
    #[serde(default)]
    user_id: i64,
}

/// クエリ文字列 → JSONボディの順で user_id をベストエフォート抽出
///
/// どちらからも取れない場合は 0 を返す（帰属不明のリクエストとして記録する）。
fn extract_user_id(query: Option<&str>, body: &[u8]) -> i64 {
    if let Some(query) = query {
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("user_id=")
                && let Ok(id) = value.parse::<i64>()
            {
                return id;
            }
        }
    }

    serde_json::from_slice::<UserIdBody>(body)
        .map(|parsed| parsed.user_id)
        .unwrap_or(0)
}

/// クライアントアドレス抽出
///
/// X-Forwarded-For の先頭 → X-Real-IP → ソケットのピアアドレスの順。
/// ヘッダはクライアント申告値であり信用はしない（監査の参考情報）。
fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok())
        && let Some(first) = xff.split(',').next()
    {
        let first = first.trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }

    if let Some(xrip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok())
        && !xrip.is_empty()
    {
        return xrip.to_string();
    }

    peer.map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}
