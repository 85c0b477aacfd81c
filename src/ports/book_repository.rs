use crate::domain::{Book, BookId, BookInput};
use async_trait::async_trait;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// コネクションプールの統計値（スナップショット）
///
/// wait_count と wait_duration はプロセス起動からの累積値。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// 開いているコネクション数
    pub open: u32,
    /// 使用中のコネクション数
    pub in_use: u32,
    /// アイドル状態のコネクション数
    pub idle: u32,
    /// コネクション待ちが発生した回数
    pub wait_count: u64,
    /// コネクション待ちに費やした合計時間
    pub wait_duration: Duration,
}

/// 書籍リポジトリポート
///
/// 書籍テーブルに対する単発の操作のみを提供する。
/// 複数操作にまたがるトランザクションは持たない。
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// 全書籍をIDの降順で取得する
    ///
    /// テーブルが空の場合は空のVecを返す（エラーではない）。
    async fn list_all(&self) -> Result<Vec<Book>>;

    /// IDで書籍を取得する
    async fn get_by_id(&self, id: BookId) -> Result<Option<Book>>;

    /// 書籍を作成する
    ///
    /// IDと created_at / updated_at はストアが付与する。
    async fn create(&self, input: BookInput) -> Result<Book>;

    /// 書籍を上書き更新する
    ///
    /// title, author, isbn, price をすべて置き換え、updated_at を更新する。
    /// 該当行がない場合は None を返す。
    async fn update(&self, id: BookId, input: BookInput) -> Result<Option<Book>>;

    /// 書籍を削除し、影響を受けた行数を返す（0 は該当なし）
    async fn delete(&self, id: BookId) -> Result<u64>;

    /// ストアへの疎通確認
    async fn ping(&self) -> Result<()>;

    /// 現在のコネクションプール統計を返す
    fn pool_stats(&self) -> PoolStats;
}
