use async_trait::async_trait;
use rand::Rng;
use time::{Duration, OffsetDateTime};

use crate::error::AppError;
use crate::models::{OtpRecord, OtpStatus};
use crate::repositories::OtpRepository;

/// OTP の有効期間
pub const OTP_TTL: Duration = Duration::minutes(2);

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// OTP 検証結果
///
/// `Valid` 以外はエラーではなく、ドメイン上の否定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpVerdict {
    Valid,
    NotFound,
    Expired,
    Mismatch,
}

impl OtpVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// OTP 発行・検証ポリシー
#[async_trait]
pub trait OtpPolicy: Send + Sync {
    /// 新しい OTP を発行して保存する
    async fn request_otp(&self, user_id: &str) -> Result<OtpRecord, AppError>;

    /// ユーザーの最新 OTP と照合する
    async fn validate_otp(&self, user_id: &str, code: &str) -> Result<OtpVerdict, AppError>;
}

/// OTP サービス
///
/// # Security
/// - OTP コードはログに出力しない
#[derive(Clone)]
pub struct OtpService<R> {
    repo: R,
}

/// 6桁の数字コードを生成（100000〜999999 の一様乱数）
pub fn generate_code() -> String {
    rand::thread_rng()
        .gen_range(CODE_MIN..=CODE_MAX)
        .to_string()
}

impl<R: OtpRepository> OtpService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<R: OtpRepository> OtpPolicy for OtpService<R> {
    async fn request_otp(&self, user_id: &str) -> Result<OtpRecord, AppError> {
        let code = generate_code();
        let expires_at = OffsetDateTime::now_utc() + OTP_TTL;

        let otp = self.repo.create(user_id, &code, expires_at).await?;

        tracing::info!(
            user_id = %user_id,
            otp_id = otp.id,
            expires_at = %otp.expires_at,
            "OTP 発行"
        );

        Ok(otp)
    }

    async fn validate_otp(&self, user_id: &str, code: &str) -> Result<OtpVerdict, AppError> {
        let Some(otp) = self.repo.find_latest_by_user(user_id).await? else {
            tracing::info!(user_id = %user_id, "OTP 検証: レコードなし");
            return Ok(OtpVerdict::NotFound);
        };

        if otp.is_expired_at(OffsetDateTime::now_utc()) {
            // 期限切れマークはベストエフォート（失敗しても呼び出し側には返さない）
            let status = OtpStatus::Expired;
            if let Err(e) = self.repo.update_status(otp.id, status).await {
                tracing::warn!(error = ?e, otp_id = otp.id, status = %status, "ステータスの更新に失敗");
            }
            tracing::info!(user_id = %user_id, otp_id = otp.id, "OTP 検証: 期限切れ");
            return Ok(OtpVerdict::Expired);
        }

        // NOTE: ステータスが created かどうかは確認しない（有効期限内の再検証は通る）
        if otp.code != code {
            tracing::info!(user_id = %user_id, otp_id = otp.id, "OTP 検証: コード不一致");
            return Ok(OtpVerdict::Mismatch);
        }

        let status = OtpStatus::Validated;
        self.repo.update_status(otp.id, status).await?;

        tracing::info!(user_id = %user_id, otp_id = otp.id, status = %status, "OTP 検証成功");

        Ok(OtpVerdict::Valid)
    }
}
