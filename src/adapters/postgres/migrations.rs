use sqlx::PgPool;
use sqlx::migrate::MigrateError;

/// `migrations/` のSQLをバイナリに埋め込み、起動時に一度だけ適用する
///
/// 適用済みのマイグレーションは `_sqlx_migrations` テーブルで管理されるため、
/// 複数回呼び出しても安全。
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations completed successfully");
    Ok(())
}
