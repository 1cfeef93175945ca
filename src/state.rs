use std::sync::Arc;

use crate::repositories::OtpRepository;
use crate::services::{OtpPolicy, OtpService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// OTP 発行・検証ポリシー
    pub otp_service: Arc<dyn OtpPolicy>,
}

impl AppState {
    /// リポジトリから OtpService を組み立てて AppState を作成
    pub fn new<R>(otp_repo: R) -> Self
    where
        R: OtpRepository + 'static,
    {
        Self::with_policy(Arc::new(OtpService::new(otp_repo)))
    }

    /// 任意のポリシー実装で AppState を作成
    pub fn with_policy(otp_service: Arc<dyn OtpPolicy>) -> Self {
        Self { otp_service }
    }
}
