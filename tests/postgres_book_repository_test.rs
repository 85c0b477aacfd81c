mod common;

use book_api::adapters::postgres::PostgresBookRepository;
use book_api::domain::BookInput;
use book_api::observability::Metrics;
use book_api::ports::BookRepository;
use serial_test::serial;
use sqlx::PgPool;
use std::sync::Arc;

async fn setup() -> (PgPool, PostgresBookRepository, Arc<Metrics>) {
    let pool = common::create_test_pool().await;
    common::cleanup_database(&pool).await;

    let metrics = Arc::new(Metrics::new().expect("Failed to build metrics"));
    let repo = PostgresBookRepository::new(pool.clone(), metrics.clone());
    (pool, repo, metrics)
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_create_and_get_by_id() {
    let (_pool, repo, _metrics) = setup().await;

    let input = BookInput::new("Dune", "Frank Herbert")
        .with_isbn("978-0441013593")
        .with_price(9.99);
    let created = repo.create(input).await.expect("Failed to create book");

    assert_eq!(created.id, 1);
    assert_eq!(created.title, "Dune");
    assert_eq!(created.isbn, "978-0441013593");
    assert_eq!(created.price, 9.99);
    // 作成時は両タイムスタンプが同じ NOW() で埋まる
    assert_eq!(created.created_at, created.updated_at);

    let fetched = repo
        .get_by_id(created.id)
        .await
        .expect("Failed to get book")
        .expect("Book should exist");
    assert_eq!(fetched, created);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_get_by_id_missing_returns_none() {
    let (_pool, repo, _metrics) = setup().await;

    let result = repo.get_by_id(42).await.expect("Query should succeed");
    assert!(result.is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_list_all_orders_by_id_descending() {
    let (_pool, repo, _metrics) = setup().await;

    for title in ["first", "second", "third"] {
        repo.create(BookInput::new(title, "someone"))
            .await
            .expect("Failed to create book");
    }

    let books = repo.list_all().await.expect("Failed to list books");
    let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["third", "second", "first"]);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_update_replaces_fields_and_advances_updated_at() {
    let (_pool, repo, _metrics) = setup().await;

    let created = repo
        .create(BookInput::new("A", "B").with_isbn("123").with_price(5.0))
        .await
        .expect("Failed to create book");

    let updated = repo
        .update(created.id, BookInput::new("A2", "B"))
        .await
        .expect("Failed to update book")
        .expect("Book should exist");

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.title, "A2");
    assert_eq!(updated.isbn, "");
    assert_eq!(updated.price, 0.0);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_update_missing_returns_none() {
    let (_pool, repo, _metrics) = setup().await;

    let result = repo
        .update(99, BookInput::new("A", "B"))
        .await
        .expect("Query should succeed");
    assert!(result.is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_delete_reports_affected_rows() {
    let (_pool, repo, _metrics) = setup().await;

    let created = repo
        .create(BookInput::new("A", "B"))
        .await
        .expect("Failed to create book");

    assert_eq!(repo.delete(created.id).await.expect("Failed to delete"), 1);
    assert_eq!(repo.delete(created.id).await.expect("Failed to delete"), 0);
    assert!(repo.get_by_id(created.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_null_isbn_and_price_read_as_defaults() {
    let (pool, repo, _metrics) = setup().await;

    sqlx::query("INSERT INTO books (title, author) VALUES ('Legacy', 'Unknown')")
        .execute(&pool)
        .await
        .expect("Failed to insert raw row");

    let books = repo.list_all().await.expect("Failed to list books");
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].isbn, "");
    assert_eq!(books[0].price, 0.0);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_queries_are_timed_by_operation() {
    let (_pool, repo, metrics) = setup().await;

    let created = repo
        .create(BookInput::new("A", "B"))
        .await
        .expect("Failed to create book");
    repo.get_by_id(created.id).await.unwrap();
    repo.get_by_id(created.id + 1).await.unwrap();
    repo.list_all().await.unwrap();

    let count = |operation: &str| {
        metrics.value_of(
            "db_query_duration_seconds_count",
            &[("operation", operation)],
        )
    };
    assert_eq!(count("insert_book"), Some(1.0));
    assert_eq!(count("select_book_by_id"), Some(2.0));
    assert_eq!(count("select_all_books"), Some(1.0));
    assert_eq!(count("delete_book"), None);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_ping_and_pool_stats() {
    let (_pool, repo, _metrics) = setup().await;

    repo.ping().await.expect("Ping should succeed");

    let stats = repo.pool_stats();
    assert!(stats.open >= 1);
    assert_eq!(stats.open, stats.in_use + stats.idle);
}
