//! Process-wide metrics registry.
//!
//! `Metrics` owns a Prometheus recorder that is *not* installed as the global
//! `metrics` recorder. Handlers, middleware and the pool collector receive it
//! through `Arc<Metrics>`, so every test can build an isolated registry and
//! inspect what was recorded.

use std::time::Duration;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Label, Level, Metadata, Recorder, SharedString,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

pub use metrics_exporter_prometheus::BuildError;

use crate::ports::PoolStats;

// HTTP
pub const HTTP_REQUESTS_TOTAL: &str = "api_http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "api_http_request_duration_seconds";
pub const HTTP_REQUESTS_IN_FLIGHT: &str = "api_http_requests_in_flight";

// Connection pool
pub const DB_CONNECTIONS_OPEN: &str = "db_connections_open";
pub const DB_CONNECTIONS_IN_USE: &str = "db_connections_in_use";
pub const DB_CONNECTIONS_IDLE: &str = "db_connections_idle";
pub const DB_CONNECTIONS_WAIT_COUNT_TOTAL: &str = "db_connections_wait_count_total";
pub const DB_CONNECTIONS_WAIT_DURATION_SECONDS_TOTAL: &str =
    "db_connections_wait_duration_seconds_total";

// Queries
pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";

// Business
pub const BOOKS_CREATED_TOTAL: &str = "api_books_created_total";
pub const BOOKS_UPDATED_TOTAL: &str = "api_books_updated_total";
pub const BOOKS_DELETED_TOTAL: &str = "api_books_deleted_total";
pub const BOOKS_TOTAL: &str = "api_books_total";

// Errors
pub const API_ERRORS_TOTAL: &str = "api_errors_total";
pub const VALIDATION_ERRORS_TOTAL: &str = "api_validation_errors_total";

/// Prometheus client default buckets.
const HTTP_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

const DB_QUERY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Named counters, gauges and histograms for HTTP and database observability.
///
/// Unlabeled instruments are registered once at construction. Labeled ones
/// are resolved per call; the recorder returns the same underlying series for
/// an identical name + label set.
pub struct Metrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,

    http_requests_in_flight: Gauge,

    db_connections_open: Gauge,
    db_connections_in_use: Gauge,
    db_connections_idle: Gauge,
    db_connections_wait_count: Counter,
    db_connections_wait_duration: Gauge,

    books_created_total: Counter,
    books_updated_total: Counter,
    books_deleted_total: Counter,
    books_total: Gauge,

    validation_errors_total: Counter,
}

impl Metrics {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
                HTTP_DURATION_BUCKETS,
            )?
            .set_buckets_for_metric(
                Matcher::Full(DB_QUERY_DURATION_SECONDS.to_string()),
                DB_QUERY_BUCKETS,
            )?
            .build_recorder();
        let handle = recorder.handle();

        describe(&recorder, HTTP_REQUESTS_TOTAL, Kind::Counter, "Total number of HTTP requests");
        describe(
            &recorder,
            HTTP_REQUEST_DURATION_SECONDS,
            Kind::Histogram,
            "HTTP request duration in seconds",
        );
        describe(
            &recorder,
            HTTP_REQUESTS_IN_FLIGHT,
            Kind::Gauge,
            "Current number of HTTP requests being processed",
        );
        describe(
            &recorder,
            DB_CONNECTIONS_OPEN,
            Kind::Gauge,
            "Current number of open database connections",
        );
        describe(
            &recorder,
            DB_CONNECTIONS_IN_USE,
            Kind::Gauge,
            "Current number of in-use database connections",
        );
        describe(
            &recorder,
            DB_CONNECTIONS_IDLE,
            Kind::Gauge,
            "Current number of idle database connections",
        );
        describe(
            &recorder,
            DB_CONNECTIONS_WAIT_COUNT_TOTAL,
            Kind::Counter,
            "Total number of times waited for a connection",
        );
        describe(
            &recorder,
            DB_CONNECTIONS_WAIT_DURATION_SECONDS_TOTAL,
            Kind::Gauge,
            "Total time waited for database connections in seconds",
        );
        describe(
            &recorder,
            DB_QUERY_DURATION_SECONDS,
            Kind::Histogram,
            "Database query duration in seconds",
        );
        describe(&recorder, BOOKS_CREATED_TOTAL, Kind::Counter, "Total number of books created");
        describe(&recorder, BOOKS_UPDATED_TOTAL, Kind::Counter, "Total number of books updated");
        describe(&recorder, BOOKS_DELETED_TOTAL, Kind::Counter, "Total number of books deleted");
        describe(
            &recorder,
            BOOKS_TOTAL,
            Kind::Gauge,
            "Current total number of books in the system",
        );
        describe(&recorder, API_ERRORS_TOTAL, Kind::Counter, "Total number of API errors");
        describe(
            &recorder,
            VALIDATION_ERRORS_TOTAL,
            Kind::Counter,
            "Total number of validation errors",
        );

        let gauge = |name: &'static str| recorder.register_gauge(&Key::from_static_name(name), &METADATA);
        let counter =
            |name: &'static str| recorder.register_counter(&Key::from_static_name(name), &METADATA);

        Ok(Self {
            http_requests_in_flight: gauge(HTTP_REQUESTS_IN_FLIGHT),
            db_connections_open: gauge(DB_CONNECTIONS_OPEN),
            db_connections_in_use: gauge(DB_CONNECTIONS_IN_USE),
            db_connections_idle: gauge(DB_CONNECTIONS_IDLE),
            db_connections_wait_count: counter(DB_CONNECTIONS_WAIT_COUNT_TOTAL),
            db_connections_wait_duration: gauge(DB_CONNECTIONS_WAIT_DURATION_SECONDS_TOTAL),
            books_created_total: counter(BOOKS_CREATED_TOTAL),
            books_updated_total: counter(BOOKS_UPDATED_TOTAL),
            books_deleted_total: counter(BOOKS_DELETED_TOTAL),
            books_total: gauge(BOOKS_TOTAL),
            validation_errors_total: counter(VALIDATION_ERRORS_TOTAL),
            recorder,
            handle,
        })
    }

    // ------------------------------------------------------------------
    // HTTP
    // ------------------------------------------------------------------

    pub fn request_started(&self) {
        self.http_requests_in_flight.increment(1.0);
    }

    pub fn request_finished(&self) {
        self.http_requests_in_flight.decrement(1.0);
    }

    /// Records one completed request: duration by method + endpoint, count by
    /// method + endpoint + status.
    pub fn observe_http_request(&self, method: &str, endpoint: &str, status: u16, elapsed: Duration) {
        self.histogram(
            HTTP_REQUEST_DURATION_SECONDS,
            vec![
                Label::new("method", method.to_owned()),
                Label::new("endpoint", endpoint.to_owned()),
            ],
        )
        .record(elapsed.as_secs_f64());

        self.counter(
            HTTP_REQUESTS_TOTAL,
            vec![
                Label::new("method", method.to_owned()),
                Label::new("endpoint", endpoint.to_owned()),
                Label::new("status", status.to_string()),
            ],
        )
        .increment(1);
    }

    // ------------------------------------------------------------------
    // Database
    // ------------------------------------------------------------------

    pub fn observe_db_query(&self, operation: &'static str, elapsed: Duration) {
        self.histogram(DB_QUERY_DURATION_SECONDS, vec![Label::new("operation", operation)])
            .record(elapsed.as_secs_f64());
    }

    /// Republishes a pool snapshot. Wait totals are cumulative, so they are
    /// set as absolute values rather than added.
    pub fn publish_pool_stats(&self, stats: &PoolStats) {
        self.db_connections_open.set(f64::from(stats.open));
        self.db_connections_in_use.set(f64::from(stats.in_use));
        self.db_connections_idle.set(f64::from(stats.idle));
        self.db_connections_wait_count.absolute(stats.wait_count);
        self.db_connections_wait_duration
            .set(stats.wait_duration.as_secs_f64());
    }

    // ------------------------------------------------------------------
    // Business
    // ------------------------------------------------------------------

    pub fn book_created(&self) {
        self.books_created_total.increment(1);
        self.books_total.increment(1.0);
    }

    pub fn book_updated(&self) {
        self.books_updated_total.increment(1);
    }

    pub fn book_deleted(&self) {
        self.books_deleted_total.increment(1);
        self.books_total.decrement(1.0);
    }

    pub fn set_books_total(&self, count: usize) {
        #[allow(clippy::cast_precision_loss)]
        self.books_total.set(count as f64);
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    pub fn record_validation_error(&self) {
        self.validation_errors_total.increment(1);
    }

    pub fn record_api_error(&self, kind: &'static str, endpoint: &'static str) {
        self.counter(
            API_ERRORS_TOTAL,
            vec![Label::new("type", kind), Label::new("endpoint", endpoint)],
        )
        .increment(1);
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Renders every registered series in the Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drains histogram buffers; called periodically by the collector.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }

    /// Looks up a single sample in the rendered output.
    ///
    /// `labels` must all be present on the series; extra labels are allowed.
    /// Mostly useful in tests.
    pub fn value_of(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let rendered = self.render();
        rendered
            .lines()
            .filter(|line| !line.starts_with('#'))
            .filter_map(|line| line.rsplit_once(' '))
            .find(|(series, _)| {
                let (series_name, series_labels) = match series.split_once('{') {
                    Some((n, rest)) => (n, rest),
                    None => (*series, ""),
                };
                series_name == name
                    && labels
                        .iter()
                        .all(|(k, v)| series_labels.contains(&format!("{k}=\"{v}\"")))
            })
            .and_then(|(_, value)| value.parse().ok())
    }

    fn counter(&self, name: &'static str, labels: Vec<Label>) -> Counter {
        self.recorder
            .register_counter(&Key::from_parts(name, labels), &METADATA)
    }

    fn histogram(&self, name: &'static str, labels: Vec<Label>) -> Histogram {
        self.recorder
            .register_histogram(&Key::from_parts(name, labels), &METADATA)
    }
}

enum Kind {
    Counter,
    Gauge,
    Histogram,
}

fn describe(recorder: &PrometheusRecorder, name: &'static str, kind: Kind, help: &'static str) {
    let key = KeyName::from_const_str(name);
    let help = SharedString::const_str(help);
    match kind {
        Kind::Counter => recorder.describe_counter(key, None, help),
        Kind::Gauge => recorder.describe_gauge(key, None, help),
        Kind::Histogram => recorder.describe_histogram(key, None, help),
    }
}
