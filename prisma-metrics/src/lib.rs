//! The logging/metrics interface: three event records
//! (`QueryStartEvent`/`QueryEndEvent`/`QueryErrorEvent`) dispatched by
//! the executor around every SQL call, plus four implementations
//! (console, metrics ring buffer, composite fan-out, no-op).

use prisma_value::PrismaValue;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct QueryStartEvent {
    pub sql: String,
    pub parameters: Vec<PrismaValue>,
    pub model: Option<String>,
    pub operation: Option<String>,
    pub start_time: Instant,
}

#[derive(Debug, Clone)]
pub struct QueryEndEvent {
    pub sql: String,
    pub parameters: Vec<PrismaValue>,
    pub model: Option<String>,
    pub operation: Option<String>,
    pub duration: Duration,
    pub row_count: usize,
}

#[derive(Debug, Clone)]
pub struct QueryErrorEvent {
    pub sql: String,
    pub parameters: Vec<PrismaValue>,
    pub model: Option<String>,
    pub operation: Option<String>,
    pub duration: Duration,
    pub error: String,
    pub stack_trace: Option<String>,
}

/// Logger hooks dispatched by the executor. Implementations must be
/// synchronous and must not block meaningfully: writing to stdout or
/// pushing into an in-process ring buffer qualifies, blocking network
/// I/O does not.
pub trait QueryLogger: Send + Sync {
    fn on_query_start(&self, event: &QueryStartEvent);
    fn on_query_end(&self, event: &QueryEndEvent);
    fn on_query_error(&self, event: &QueryErrorEvent);
}

/// Does nothing. The default when an embedder doesn't care about
/// observability.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl QueryLogger for NoopLogger {
    fn on_query_start(&self, _event: &QueryStartEvent) {}
    fn on_query_end(&self, _event: &QueryEndEvent) {}
    fn on_query_error(&self, _event: &QueryErrorEvent) {}
}

/// Prints formatted lines to stdout, optionally colorized with ANSI
/// escapes, filtering out queries faster than `slow_query_threshold`.
/// Parameters are sanitized before printing: string values longer than
/// 64 bytes are truncated, since bind parameters routinely carry full
/// row payloads on `create`/`update`.
pub struct ConsoleLogger {
    pub colorize: bool,
    pub slow_query_threshold: Duration,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        ConsoleLogger {
            colorize: true,
            slow_query_threshold: Duration::ZERO,
        }
    }
}

impl ConsoleLogger {
    pub fn new(colorize: bool, slow_query_threshold: Duration) -> Self {
        ConsoleLogger { colorize, slow_query_threshold }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.colorize {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn sanitize(parameters: &[PrismaValue]) -> String {
        parameters
            .iter()
            .map(sanitize_one)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn sanitize_one(value: &PrismaValue) -> String {
    const MAX_LEN: usize = 64;
    match value {
        PrismaValue::String(s) if s.len() > MAX_LEN => format!("\"{}...\"", &s[..MAX_LEN]),
        PrismaValue::Bytes(b) => format!("<{} bytes>", b.len()),
        other => format!("{other:?}"),
    }
}

impl QueryLogger for ConsoleLogger {
    fn on_query_start(&self, event: &QueryStartEvent) {
        println!(
            "{} {} params=[{}]",
            self.paint("36", "query"),
            event.sql,
            Self::sanitize(&event.parameters)
        );
    }

    fn on_query_end(&self, event: &QueryEndEvent) {
        if event.duration < self.slow_query_threshold {
            return;
        }
        let tag = if event.duration >= self.slow_query_threshold && !self.slow_query_threshold.is_zero() {
            self.paint("33", "slow")
        } else {
            self.paint("32", "ok")
        };
        println!(
            "{tag} {} ({:?}, {} rows)",
            event.sql, event.duration, event.row_count
        );
    }

    fn on_query_error(&self, event: &QueryErrorEvent) {
        eprintln!("{} {} ({:?}): {}", self.paint("31", "error"), event.sql, event.duration, event.error);
    }
}

/// A single completed query's metrics, as retained by [`MetricsLogger`].
#[derive(Debug, Clone)]
pub struct QueryMetric {
    pub sql: String,
    pub operation: Option<String>,
    pub duration: Duration,
    pub row_count: usize,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: Instant,
}

/// Default retention window for [`MetricsLogger`]'s ring buffer: enough
/// history for an interactive `slowest`/`by_operation` query without
/// unbounded memory growth on a long-lived process.
pub const DEFAULT_METRICS_CAPACITY: usize = 1000;

/// A bounded ring buffer of [`QueryMetric`]s with summary views
/// (totals/averages/slowest/by-operation). Interior-mutable so it can be
/// shared behind an `Arc` without the caller needing a `Mutex` wrapper
/// at every call site; the logger itself owns the lock.
pub struct MetricsLogger {
    capacity: usize,
    entries: std::sync::Mutex<std::collections::VecDeque<QueryMetric>>,
}

impl MetricsLogger {
    pub fn new(capacity: usize) -> Self {
        MetricsLogger {
            capacity: capacity.max(1),
            entries: std::sync::Mutex::new(std::collections::VecDeque::with_capacity(capacity.max(1))),
        }
    }

    fn push(&self, metric: QueryMetric) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(metric);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn average_duration(&self) -> Duration {
        let entries = self.entries.lock().unwrap();
        if entries.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = entries.iter().map(|e| e.duration).sum();
        total / entries.len() as u32
    }

    pub fn slowest(&self, n: usize) -> Vec<QueryMetric> {
        let entries = self.entries.lock().unwrap();
        let mut sorted: Vec<QueryMetric> = entries.iter().cloned().collect();
        sorted.sort_by(|a, b| b.duration.cmp(&a.duration));
        sorted.truncate(n);
        sorted
    }

    pub fn by_operation(&self) -> HashMap<String, Vec<QueryMetric>> {
        let entries = self.entries.lock().unwrap();
        let mut out: HashMap<String, Vec<QueryMetric>> = HashMap::new();
        for entry in entries.iter() {
            let key = entry.operation.clone().unwrap_or_else(|| "unknown".to_string());
            out.entry(key).or_default().push(entry.clone());
        }
        out
    }

    pub fn success_count(&self) -> usize {
        self.entries.lock().unwrap().iter().filter(|e| e.success).count()
    }

    pub fn error_count(&self) -> usize {
        self.entries.lock().unwrap().iter().filter(|e| !e.success).count()
    }
}

impl Default for MetricsLogger {
    fn default() -> Self {
        MetricsLogger::new(DEFAULT_METRICS_CAPACITY)
    }
}

impl QueryLogger for MetricsLogger {
    fn on_query_start(&self, _event: &QueryStartEvent) {}

    fn on_query_end(&self, event: &QueryEndEvent) {
        self.push(QueryMetric {
            sql: event.sql.clone(),
            operation: event.operation.clone(),
            duration: event.duration,
            row_count: event.row_count,
            success: true,
            error: None,
            timestamp: Instant::now(),
        });
    }

    fn on_query_error(&self, event: &QueryErrorEvent) {
        self.push(QueryMetric {
            sql: event.sql.clone(),
            operation: event.operation.clone(),
            duration: event.duration,
            row_count: 0,
            success: false,
            error: Some(event.error.clone()),
            timestamp: Instant::now(),
        });
    }
}

impl<T: QueryLogger + ?Sized> QueryLogger for std::sync::Arc<T> {
    fn on_query_start(&self, event: &QueryStartEvent) {
        (**self).on_query_start(event)
    }

    fn on_query_end(&self, event: &QueryEndEvent) {
        (**self).on_query_end(event)
    }

    fn on_query_error(&self, event: &QueryErrorEvent) {
        (**self).on_query_error(event)
    }
}

/// Fans every event out to each inner logger, in registration order.
#[derive(Default)]
pub struct CompositeLogger {
    loggers: Vec<Box<dyn QueryLogger>>,
}

impl CompositeLogger {
    pub fn new() -> Self {
        CompositeLogger { loggers: Vec::new() }
    }

    pub fn with(mut self, logger: Box<dyn QueryLogger>) -> Self {
        self.loggers.push(logger);
        self
    }
}

impl QueryLogger for CompositeLogger {
    fn on_query_start(&self, event: &QueryStartEvent) {
        for logger in &self.loggers {
            logger.on_query_start(event);
        }
    }

    fn on_query_end(&self, event: &QueryEndEvent) {
        for logger in &self.loggers {
            logger.on_query_end(event);
        }
    }

    fn on_query_error(&self, event: &QueryErrorEvent) {
        for logger in &self.loggers {
            logger.on_query_error(event);
        }
    }
}
