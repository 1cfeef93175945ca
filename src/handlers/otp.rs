use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

const MISSING_USER_ID: &str = "Missing required field: user_id";
const MISSING_USER_ID_OR_OTP: &str = "Missing required fields: user_id, otp";
const VALIDATED_MESSAGE: &str = "OTP validated successfully.";

// === OTP 発行 ===

#[derive(Debug, Deserialize)]
pub struct RequestOtpRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestOtpResponse {
    pub user_id: String,
    pub otp: String,
}

/// POST /otp/request
///
/// 新しい OTP を発行し、コードをそのまま返す（配信は範囲外）
pub async fn request_otp(
    State(state): State<AppState>,
    payload: Result<Json<RequestOtpRequest>, JsonRejection>,
) -> Result<Json<RequestOtpResponse>, AppError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!(error = %e, "リクエストボディの読み取りに失敗");
        AppError::Validation(MISSING_USER_ID.to_string())
    })?;

    // バリデーション
    let user_id = validate_request_otp_request(&request)?;

    let otp = state
        .otp_service
        .request_otp(user_id)
        .await
        .map_err(|e| e.context("Failed to generate OTP"))?;

    Ok(Json(RequestOtpResponse {
        user_id: otp.user_id,
        otp: otp.code,
    }))
}

// === OTP 検証 ===

#[derive(Debug, Deserialize)]
pub struct ValidateOtpRequest {
    pub user_id: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateOtpResponse {
    pub user_id: String,
    pub message: String,
}

/// POST /otp/validate
///
/// # Security
/// - 不一致・期限切れ・未発行はすべて同じ 401 を返す
pub async fn validate_otp(
    State(state): State<AppState>,
    payload: Result<Json<ValidateOtpRequest>, JsonRejection>,
) -> Result<Json<ValidateOtpResponse>, AppError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!(error = %e, "リクエストボディの読み取りに失敗");
        AppError::Validation(MISSING_USER_ID_OR_OTP.to_string())
    })?;

    // バリデーション
    let (user_id, code) = validate_validate_otp_request(&request)?;

    let verdict = state
        .otp_service
        .validate_otp(user_id, code)
        .await
        .map_err(|e| e.context("Failed to validate OTP"))?;

    if !verdict.is_valid() {
        tracing::info!(user_id = %user_id, verdict = ?verdict, "OTP 検証失敗");
        return Err(AppError::OtpNotFound);
    }

    Ok(Json(ValidateOtpResponse {
        user_id: user_id.to_string(),
        message: VALIDATED_MESSAGE.to_string(),
    }))
}

/// 必須フィールドの取り出し（未指定・null・空文字は欠落扱い）
fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

/// OTP 発行リクエストのバリデーション
fn validate_request_otp_request(request: &RequestOtpRequest) -> Result<&str, AppError> {
    required(&request.user_id).ok_or_else(|| AppError::Validation(MISSING_USER_ID.to_string()))
}

/// OTP 検証リクエストのバリデーション
fn validate_validate_otp_request(request: &ValidateOtpRequest) -> Result<(&str, &str), AppError> {
    match (required(&request.user_id), required(&request.otp)) {
        (Some(user_id), Some(otp)) => Ok((user_id, otp)),
        _ => Err(AppError::Validation(MISSING_USER_ID_OR_OTP.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        response::Response,
    };
    use serde::de::DeserializeOwned;
    use time::OffsetDateTime;
    use tower::ServiceExt;

    use crate::error::ErrorResponse;
    use crate::models::{OtpRecord, OtpStatus};
    use crate::services::{OTP_TTL, OtpPolicy, OtpVerdict};

    /// 固定の結果を返すテスト用ポリシー
    struct StubPolicy {
        verdict: OtpVerdict,
        fail: bool,
    }

    #[async_trait]
    impl OtpPolicy for StubPolicy {
        async fn request_otp(&self, user_id: &str) -> Result<OtpRecord, AppError> {
            if self.fail {
                return Err(AppError::Database(sqlx::Error::PoolTimedOut));
            }
            let now = OffsetDateTime::now_utc();
            Ok(OtpRecord {
                id: 1,
                user_id: user_id.to_string(),
                code: "123456".to_string(),
                status: OtpStatus::Created,
                created_at: now,
                expires_at: now + OTP_TTL,
            })
        }

        async fn validate_otp(&self, _user_id: &str, _code: &str) -> Result<OtpVerdict, AppError> {
            if self.fail {
                return Err(AppError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self.verdict)
        }
    }

    fn app(verdict: OtpVerdict, fail: bool) -> Router {
        crate::create_router(AppState::with_policy(Arc::new(StubPolicy { verdict, fail })))
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> Response {
        app.oneshot(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validate_missing_user_id() {
        let request = RequestOtpRequest { user_id: None };
        assert!(validate_request_otp_request(&request).is_err());
    }

    #[test]
    fn test_validate_empty_user_id() {
        let request = RequestOtpRequest {
            user_id: Some("".to_string()),
        };
        assert!(validate_request_otp_request(&request).is_err());
    }

    #[test]
    fn test_validate_whitespace_user_id_is_accepted() {
        let request = RequestOtpRequest {
            user_id: Some("  ".to_string()),
        };
        assert_eq!(validate_request_otp_request(&request).unwrap(), "  ");
    }

    #[test]
    fn test_validate_valid_request_otp_request() {
        let request = RequestOtpRequest {
            user_id: Some("Robert".to_string()),
        };
        assert_eq!(validate_request_otp_request(&request).unwrap(), "Robert");
    }

    #[test]
    fn test_validate_missing_otp() {
        let request = ValidateOtpRequest {
            user_id: Some("Robert".to_string()),
            otp: None,
        };
        assert!(validate_validate_otp_request(&request).is_err());
    }

    #[test]
    fn test_validate_valid_validate_otp_request() {
        let request = ValidateOtpRequest {
            user_id: Some("Robert".to_string()),
            otp: Some("123456".to_string()),
        };
        assert_eq!(
            validate_validate_otp_request(&request).unwrap(),
            ("Robert", "123456")
        );
    }

    #[tokio::test]
    async fn test_request_otp_success() {
        let response = post_json(
            app(OtpVerdict::Valid, false),
            "/otp/request",
            r#"{"user_id":"Robert"}"#,
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: RequestOtpResponse = read_json(response).await;
        assert_eq!(body.user_id, "Robert");
        assert_eq!(body.otp, "123456");
    }

    #[tokio::test]
    async fn test_request_otp_missing_user_id() {
        let response = post_json(app(OtpVerdict::Valid, false), "/otp/request", "{}").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = read_json(response).await;
        assert_eq!(body.error, "invalid_request");
        assert_eq!(body.error_description, MISSING_USER_ID);
    }

    #[tokio::test]
    async fn test_request_otp_null_or_empty_user_id() {
        for body in [r#"{"user_id":null}"#, r#"{"user_id":""}"#] {
            let response = post_json(app(OtpVerdict::Valid, false), "/otp/request", body).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
            let body: ErrorResponse = read_json(response).await;
            assert_eq!(body.error_description, MISSING_USER_ID);
        }
    }

    #[tokio::test]
    async fn test_request_otp_malformed_body() {
        let response = post_json(app(OtpVerdict::Valid, false), "/otp/request", "not json").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_request_otp_internal_error() {
        let response = post_json(
            app(OtpVerdict::Valid, true),
            "/otp/request",
            r#"{"user_id":"Robert"}"#,
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = read_json(response).await;
        assert_eq!(body.error, "internal_error");
        assert_eq!(body.error_description, "Failed to generate OTP");
    }

    #[tokio::test]
    async fn test_validate_otp_success() {
        let response = post_json(
            app(OtpVerdict::Valid, false),
            "/otp/validate",
            r#"{"user_id":"Robert","otp":"123456"}"#,
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: ValidateOtpResponse = read_json(response).await;
        assert_eq!(body.user_id, "Robert");
        assert_eq!(body.message, "OTP validated successfully.");
    }

    #[tokio::test]
    async fn test_validate_otp_invalid() {
        for verdict in [
            OtpVerdict::Mismatch,
            OtpVerdict::Expired,
            OtpVerdict::NotFound,
        ] {
            let response = post_json(
                app(verdict, false),
                "/otp/validate",
                r#"{"user_id":"Robert","otp":"000000"}"#,
            )
            .await;

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body: ErrorResponse = read_json(response).await;
            assert_eq!(body.error, "otp_not_found");
            assert_eq!(body.error_description, "OTP Not Found");
        }
    }

    #[tokio::test]
    async fn test_validate_otp_missing_fields() {
        let response = post_json(
            app(OtpVerdict::Valid, false),
            "/otp/validate",
            r#"{"user_id":"Robert"}"#,
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = read_json(response).await;
        assert_eq!(body.error_description, MISSING_USER_ID_OR_OTP);
    }

    #[tokio::test]
    async fn test_validate_otp_null_or_empty_fields() {
        for body in [
            r#"{"user_id":null,"otp":"123456"}"#,
            r#"{"user_id":"","otp":"123456"}"#,
            r#"{"user_id":"Robert","otp":null}"#,
            r#"{"user_id":"Robert","otp":""}"#,
        ] {
            let response = post_json(app(OtpVerdict::Valid, false), "/otp/validate", body).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
            let body: ErrorResponse = read_json(response).await;
            assert_eq!(body.error, "invalid_request");
            assert_eq!(body.error_description, MISSING_USER_ID_OR_OTP);
        }
    }

    #[tokio::test]
    async fn test_validate_otp_internal_error() {
        let response = post_json(
            app(OtpVerdict::Valid, true),
            "/otp/validate",
            r#"{"user_id":"Robert","otp":"123456"}"#,
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = read_json(response).await;
        assert_eq!(body.error_description, "Failed to validate OTP");
    }
}
