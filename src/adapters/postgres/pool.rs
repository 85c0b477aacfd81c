use crate::config::Config;
use sqlx::postgres::PgPoolOptions;

/// 設定からコネクションプールのオプションを組み立てる
///
/// `acquire_timeout` は sqlx の既定値（30秒）ではなく設定値を使う。
/// DBに到達できない場合でも、リクエストタイムアウトより先に
/// ストア障害として失敗させるため。
pub fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.db_acquire_timeout)
}
