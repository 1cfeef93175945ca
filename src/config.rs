use secrecy::{ExposeSecret, SecretBox};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

#[derive(Debug, Deserialize)]
pub struct Config {
    // データベース接続設定
    #[serde(default = "default_db_host")]
    pub db_host: String,
    #[serde(default = "default_db_port")]
    pub db_port: u16,
    #[serde(default = "default_db_user")]
    pub db_user: String,
    #[serde(default = "default_db_password")]
    pub db_password: SecretBox<String>,
    #[serde(default = "default_db_name")]
    pub db_name: String,
    /// コネクションプールの最大接続数
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    // HTTP サーバー設定
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_USER: &str = "postgres";
const DEFAULT_DB_PASSWORD: &str = "postgres";
const DEFAULT_DB_NAME: &str = "otp_db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

fn default_db_host() -> String {
    DEFAULT_DB_HOST.to_string()
}

fn default_db_port() -> u16 {
    DEFAULT_DB_PORT
}

fn default_db_user() -> String {
    DEFAULT_DB_USER.to_string()
}

fn default_db_password() -> SecretBox<String> {
    SecretBox::new(Box::new(DEFAULT_DB_PASSWORD.to_string()))
}

fn default_db_name() -> String {
    DEFAULT_DB_NAME.to_string()
}

fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        Self::from_vars(std::env::vars())
    }

    /// 環境変数の組から設定を構築
    ///
    /// 空文字の変数は未設定として扱い、デフォルト値を使う
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars.into_iter().filter(|(_, value)| !value.is_empty()))
    }

    /// PostgreSQL 接続オプションを構築
    ///
    /// SSL は無効（ローカル/同一ネットワーク内の DB を想定）
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .username(&self.db_user)
            .password(self.db_password.expose_secret())
            .database(&self.db_name)
            .ssl_mode(PgSslMode::Disable)
    }
}
