use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::Metrics;
use crate::ports::BookRepository;

/// コネクションプール統計を1回サンプリングしてメトリクスへ反映する
pub fn collect_pool_metrics(repository: &dyn BookRepository, metrics: &Metrics) {
    let stats = repository.pool_stats();
    metrics.publish_pool_stats(&stats);
    metrics.run_upkeep();

    tracing::trace!(
        open = stats.open,
        in_use = stats.in_use,
        idle = stats.idle,
        wait_count = stats.wait_count,
        "pool metrics collected"
    );
}

/// プール統計の定期収集タスクを起動する
///
/// `interval` ごとに [`collect_pool_metrics`] を実行する。
/// `shutdown` に true が送られるか送信側が破棄されると終了する。
pub fn spawn_pool_metrics_collector(
    repository: Arc<dyn BookRepository>,
    metrics: Arc<Metrics>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = interval.as_secs(), "pool metrics collector started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    collect_pool_metrics(repository.as_ref(), &metrics);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("pool metrics collector stopped");
    })
}
