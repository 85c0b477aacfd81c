use crate::domain::{Book, BookId, BookInput};
use crate::observability::Metrics;
use crate::ports::book_repository::{BookRepository as BookRepositoryTrait, PoolStats, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgPool, Postgres, Row, postgres::PgRow};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// PostgreSQLの行データをBookに変換する
///
/// isbn と price は NULL 許容カラムのため、NULL は空文字列・0 として扱う。
fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let isbn: Option<String> = row.try_get("isbn")?;
    let price: Option<f64> = row.try_get("price")?;

    Ok(Book {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        isbn: isbn.unwrap_or_default(),
        price: price.unwrap_or_default(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// BookRepositoryのPostgreSQL実装
///
/// 各操作の所要時間を操作名ラベル付きのヒストグラムに記録する。
/// 記録は結果の判定より前に行うため、失敗した操作も計測される。
pub struct BookRepository {
    pool: PgPool,
    metrics: Arc<Metrics>,
    wait_count: AtomicU64,
    wait_micros: AtomicU64,
}

impl BookRepository {
    /// PostgreSQLコネクションプールから新しいBookRepositoryを作成
    pub fn new(pool: PgPool, metrics: Arc<Metrics>) -> Self {
        Self {
            pool,
            metrics,
            wait_count: AtomicU64::new(0),
            wait_micros: AtomicU64::new(0),
        }
    }

    /// コネクションを取得する
    ///
    /// アイドルコネクションがなく、プールが上限に達している状態での取得を
    /// 「待ち」として回数と時間を累積する。
    async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        let saturated = self.pool.num_idle() == 0
            && self.pool.size() >= self.pool.options().get_max_connections();

        let start = Instant::now();
        let conn = self.pool.acquire().await?;

        if saturated {
            let waited = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
            self.wait_count.fetch_add(1, Ordering::Relaxed);
            self.wait_micros.fetch_add(waited, Ordering::Relaxed);
        }

        Ok(conn)
    }

    /// クエリを実行し、所要時間を記録する
    async fn timed<T>(
        &self,
        operation: &'static str,
        query: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = query.await;
        self.metrics.observe_db_query(operation, start.elapsed());

        if let Err(ref e) = result {
            tracing::debug!(operation, error = %e, "query failed");
        }
        result
    }

    async fn select_all(&self) -> Result<Vec<Book>> {
        let mut conn = self.acquire().await?;
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                title,
                author,
                isbn,
                price::float8 AS price,
                created_at,
                updated_at
            FROM books
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(map_row_to_book).collect()
    }

    async fn select_by_id(&self, id: BookId) -> Result<Option<Book>> {
        let mut conn = self.acquire().await?;
        let row = sqlx::query(
            r#"
            SELECT
                id,
                title,
                author,
                isbn,
                price::float8 AS price,
                created_at,
                updated_at
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    /// created_at と updated_at は同一文の NOW() のため必ず一致する
    async fn insert(&self, input: &BookInput) -> Result<Book> {
        let mut conn = self.acquire().await?;
        let row = sqlx::query(
            r#"
            INSERT INTO books (title, author, isbn, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4::numeric, NOW(), NOW())
            RETURNING
                id,
                title,
                author,
                isbn,
                price::float8 AS price,
                created_at,
                updated_at
            "#,
        )
        .bind(&input.title)
        .bind(&input.author)
        .bind(&input.isbn)
        .bind(input.price)
        .fetch_one(&mut *conn)
        .await?;

        map_row_to_book(&row)
    }

    async fn overwrite(&self, id: BookId, input: &BookInput) -> Result<Option<Book>> {
        let mut conn = self.acquire().await?;
        let row = sqlx::query(
            r#"
            UPDATE books
            SET
                title = $1,
                author = $2,
                isbn = $3,
                price = $4::numeric,
                updated_at = NOW()
            WHERE id = $5
            RETURNING
                id,
                title,
                author,
                isbn,
                price::float8 AS price,
                created_at,
                updated_at
            "#,
        )
        .bind(&input.title)
        .bind(&input.author)
        .bind(&input.isbn)
        .bind(input.price)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn remove(&self, id: BookId) -> Result<u64> {
        let mut conn = self.acquire().await?;
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl BookRepositoryTrait for BookRepository {
    async fn list_all(&self) -> Result<Vec<Book>> {
        self.timed("select_all_books", self.select_all()).await
    }

    async fn get_by_id(&self, id: BookId) -> Result<Option<Book>> {
        self.timed("select_book_by_id", self.select_by_id(id)).await
    }

    async fn create(&self, input: BookInput) -> Result<Book> {
        self.timed("insert_book", self.insert(&input)).await
    }

    /// title, author, isbn, price をすべて上書きする（部分更新なし）
    async fn update(&self, id: BookId, input: BookInput) -> Result<Option<Book>> {
        self.timed("update_book", self.overwrite(id, &input)).await
    }

    async fn delete(&self, id: BookId) -> Result<u64> {
        self.timed("delete_book", self.remove(id)).await
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    fn pool_stats(&self) -> PoolStats {
        let open = self.pool.size();
        let idle = u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX);

        PoolStats {
            open,
            in_use: open.saturating_sub(idle),
            idle,
            wait_count: self.wait_count.load(Ordering::Relaxed),
            wait_duration: Duration::from_micros(self.wait_micros.load(Ordering::Relaxed)),
        }
    }
}
