use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::models::{OtpRecord, OtpStatus};

/// OTP レコードの永続化
///
/// ポリシー（有効期限・照合）は持たない。呼び出し側のサービスが判断する。
#[async_trait]
pub trait OtpRepository: Send + Sync {
    /// ステータス `created` の新しいレコードを作成
    ///
    /// `created_at` はストア側で付与される
    async fn create(
        &self,
        user_id: &str,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<OtpRecord, sqlx::Error>;

    /// ユーザーの最新レコード（`created_at` 降順の先頭）を取得
    async fn find_latest_by_user(&self, user_id: &str) -> Result<Option<OtpRecord>, sqlx::Error>;

    /// ステータスを更新
    async fn update_status(&self, id: i32, status: OtpStatus) -> Result<(), sqlx::Error>;
}

/// timestamp 列に要求する型（information_schema.columns.data_type の表記）
const TIMESTAMPTZ: &str = "timestamp with time zone";

/// otp テーブルの準備・検査エラー
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// 既存テーブルの timestamp 列が TIMESTAMPTZ でない（ALTER TABLE で移行が必要）
    #[error("otp.{column} の型が {found} です（timestamp with time zone が必要）")]
    TimestampColumn { column: String, found: String },
}

/// timestamp 列の型を検査
fn check_timestamp_columns(columns: &[(String, String)]) -> Result<(), SchemaError> {
    match columns.iter().find(|(_, data_type)| data_type != TIMESTAMPTZ) {
        Some((column, found)) => Err(SchemaError::TimestampColumn {
            column: column.clone(),
            found: found.clone(),
        }),
        None => Ok(()),
    }
}

#[derive(Clone)]
pub struct PgOtpRepository {
    pool: PgPool,
}

impl PgOtpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// otp テーブルを作成（存在する場合は何もしない）
    ///
    /// 既存テーブルの created_at / expires_at が TIMESTAMPTZ でなければエラー
    pub async fn ensure_schema(&self) -> Result<(), SchemaError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS otp (
                id SERIAL PRIMARY KEY,
                user_id VARCHAR(255) NOT NULL,
                code VARCHAR(10) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'created',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                expires_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let columns: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT column_name::text, data_type::text
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = 'otp'
              AND column_name IN ('created_at', 'expires_at')
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        check_timestamp_columns(&columns)
    }
}

#[async_trait]
impl OtpRepository for PgOtpRepository {
    async fn create(
        &self,
        user_id: &str,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<OtpRecord, sqlx::Error> {
        sqlx::query_as::<_, OtpRecord>(
            r#"
            INSERT INTO otp (user_id, code, status, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, code, status, created_at, expires_at
            "#,
        )
        .bind(user_id)
        .bind(code)
        .bind(OtpStatus::Created.as_str())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_latest_by_user(&self, user_id: &str) -> Result<Option<OtpRecord>, sqlx::Error> {
        sqlx::query_as::<_, OtpRecord>(
            r#"
            SELECT id, user_id, code, status, created_at, expires_at
            FROM otp
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_status(&self, id: i32, status: OtpStatus) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE otp
            SET status = $1
            WHERE id = $2
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
