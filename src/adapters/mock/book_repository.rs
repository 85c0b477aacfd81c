use crate::domain::{Book, BookId, BookInput};
use crate::ports::book_repository::{BookRepository as BookRepositoryTrait, PoolStats, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// BookRepositoryのインメモリ実装
///
/// PostgreSQLなしでAPI層をテストするためのモック。
/// IDは1からの連番で採番する。`set_unreachable(true)` で
/// ストア障害（全操作がエラー）を再現できる。
pub struct BookRepository {
    books: Mutex<BTreeMap<BookId, Book>>,
    next_id: Mutex<BookId>,
    unreachable: AtomicBool,
    pool_stats: Mutex<PoolStats>,
}

impl BookRepository {
    pub fn new() -> Self {
        Self {
            books: Mutex::new(BTreeMap::new()),
            next_id: Mutex::new(1),
            unreachable: AtomicBool::new(false),
            pool_stats: Mutex::new(PoolStats::default()),
        }
    }

    /// テスト用にストア障害を切り替える
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// テスト用にプール統計を差し替える
    pub fn set_pool_stats(&self, stats: PoolStats) {
        *self.pool_stats.lock().unwrap() = stats;
    }

    /// 保存されている書籍数
    pub fn len(&self) -> usize {
        self.books.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock store is unreachable",
            )));
        }
        Ok(())
    }
}

impl Default for BookRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookRepositoryTrait for BookRepository {
    async fn list_all(&self) -> Result<Vec<Book>> {
        self.check_reachable()?;
        Ok(self.books.lock().unwrap().values().rev().cloned().collect())
    }

    async fn get_by_id(&self, id: BookId) -> Result<Option<Book>> {
        self.check_reachable()?;
        Ok(self.books.lock().unwrap().get(&id).cloned())
    }

    async fn create(&self, input: BookInput) -> Result<Book> {
        self.check_reachable()?;

        let id = {
            let mut next_id = self.next_id.lock().unwrap();
            let id = *next_id;
            *next_id += 1;
            id
        };
        let now = Utc::now();
        let book = Book {
            id,
            title: input.title,
            author: input.author,
            isbn: input.isbn,
            price: input.price,
            created_at: now,
            updated_at: now,
        };

        self.books.lock().unwrap().insert(id, book.clone());
        Ok(book)
    }

    async fn update(&self, id: BookId, input: BookInput) -> Result<Option<Book>> {
        self.check_reachable()?;

        let mut books = self.books.lock().unwrap();
        let Some(book) = books.get_mut(&id) else {
            return Ok(None);
        };

        // 同一時刻に収まった場合でも updated_at は必ず進める
        let now = Utc::now().max(book.updated_at + Duration::microseconds(1));
        book.title = input.title;
        book.author = input.author;
        book.isbn = input.isbn;
        book.price = input.price;
        book.updated_at = now;

        Ok(Some(book.clone()))
    }

    async fn delete(&self, id: BookId) -> Result<u64> {
        self.check_reachable()?;
        Ok(u64::from(self.books.lock().unwrap().remove(&id).is_some()))
    }

    async fn ping(&self) -> Result<()> {
        self.check_reachable()
    }

    fn pool_stats(&self) -> PoolStats {
        *self.pool_stats.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let repo = BookRepository::new();

        let first = repo.create(BookInput::new("A", "B")).await.unwrap();
        let second = repo.create(BookInput::new("C", "D")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.created_at, first.updated_at);
    }

    #[tokio::test]
    async fn test_list_all_returns_newest_first() {
        let repo = BookRepository::new();
        for i in 0..3 {
            repo.create(BookInput::new(format!("T{i}"), "A")).await.unwrap();
        }

        let ids: Vec<_> = repo.list_all().await.unwrap().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_update_advances_updated_at() {
        let repo = BookRepository::new();
        let created = repo.create(BookInput::new("A", "B")).await.unwrap();

        let updated = repo
            .update(created.id, BookInput::new("A2", "B"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "A2");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_row() {
        let repo = BookRepository::new();

        assert!(repo.update(99, BookInput::new("A", "B")).await.unwrap().is_none());
        assert_eq!(repo.delete(99).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_every_operation() {
        let repo = BookRepository::new();
        repo.set_unreachable(true);

        assert!(repo.ping().await.is_err());
        assert!(repo.list_all().await.is_err());
        assert!(repo.create(BookInput::new("A", "B")).await.is_err());
        assert!(repo.is_empty());
    }
}
