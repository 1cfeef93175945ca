use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("OTP が見つからないか無効です")]
    OtpNotFound,

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// インフラ系エラーに操作ごとの説明を付与して Internal に包む
    ///
    /// クライアント起因のエラー（400/401）はそのまま返す
    pub fn context(self, description: &'static str) -> Self {
        match self {
            Self::Validation(_) | Self::OtpNotFound => self,
            other => Self::Internal(anyhow::Error::new(other).context(description)),
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_description: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, description) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg.clone()),
            Self::OtpNotFound => (
                StatusCode::UNAUTHORIZED,
                "otp_not_found",
                "OTP Not Found".to_string(),
            ),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                // 最外側のコンテキストのみ返す（原因チェーンは漏らさない）
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    e.to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                error_description: description,
            }),
        )
            .into_response()
    }
}
