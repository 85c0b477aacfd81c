pub mod book_repository;
pub mod migrations;
pub mod pool;

// パブリックに型を再エクスポート
pub use book_repository::BookRepository as PostgresBookRepository;
pub use migrations::run_migrations;
pub use pool::pool_options;
