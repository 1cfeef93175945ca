use std::fmt;
use std::str::FromStr;

use sqlx::FromRow;
use time::OffsetDateTime;

/// OTP のステータス
///
/// 遷移は一方向のみ: `Created → Validated` または `Created → Expired`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpStatus {
    Created,
    Validated,
    Expired,
}

impl OtpStatus {
    /// DB に保存する文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Validated => "validated",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for OtpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("不明な OTP ステータス: {0}")]
pub struct UnknownOtpStatus(pub String);

impl FromStr for OtpStatus {
    type Err = UnknownOtpStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "validated" => Ok(Self::Validated),
            "expired" => Ok(Self::Expired),
            other => Err(UnknownOtpStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for OtpStatus {
    type Error = UnknownOtpStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 発行済み OTP レコード
///
/// ユーザーごとに `created_at` が最新のものだけが検証対象になる。
/// レコードは削除されず、ステータスのみ更新される。
#[derive(Debug, Clone, FromRow)]
pub struct OtpRecord {
    pub id: i32,
    pub user_id: String,
    pub code: String,
    #[sqlx(try_from = "String")]
    pub status: OtpStatus,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl OtpRecord {
    /// `now` の時点で有効期限を過ぎているか
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}
