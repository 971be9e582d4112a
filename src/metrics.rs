use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Error kinds tracked individually; anything else is counted as `other`.
const FAILURE_KINDS: [&str; 8] = [
    "invalid_request",
    "embedding_failure",
    "index_failure",
    "no_context",
    "generation_backend_failure",
    "malformed_output",
    "insufficient_extraction",
    "other",
];

/// Thread-safe counters describing generation and ingestion activity.
#[derive(Default)]
pub struct GenerationMetrics {
    topic_requests: AtomicU64,
    image_requests: AtomicU64,
    succeeded: AtomicU64,
    failures: [AtomicU64; FAILURE_KINDS.len()],
    questions_generated: AtomicU64,
    books_ingested: AtomicU64,
    chunks_indexed: AtomicU64,
}

impl GenerationMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an incoming request by its kind (`topic` or `image`).
    pub fn record_request(&self, kind: &str) {
        let counter = match kind {
            "image" => &self.image_requests,
            _ => &self.topic_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful request and the number of questions it returned.
    pub fn record_success(&self, questions: usize) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.questions_generated
            .fetch_add(questions as u64, Ordering::Relaxed);
    }

    /// Record a failed request under its error kind.
    pub fn record_failure(&self, kind: &str) {
        let slot = FAILURE_KINDS
            .iter()
            .position(|known| *known == kind)
            .unwrap_or(FAILURE_KINDS.len() - 1);
        self.failures[slot].fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ingested book and the chunks written for it.
    pub fn record_book(&self, chunk_count: u64) {
        self.books_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let failures = FAILURE_KINDS
            .iter()
            .zip(&self.failures)
            .map(|(kind, counter)| ((*kind).to_string(), counter.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();
        MetricsSnapshot {
            topic_requests: self.topic_requests.load(Ordering::Relaxed),
            image_requests: self.image_requests.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failures,
            questions_generated: self.questions_generated.load(Ordering::Relaxed),
            books_ingested: self.books_ingested.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Topic requests received since startup.
    pub topic_requests: u64,
    /// Image requests received since startup.
    pub image_requests: u64,
    /// Requests that returned questions.
    pub succeeded: u64,
    /// Failed requests keyed by error kind; kinds with no failures are omitted.
    pub failures: BTreeMap<String, u64>,
    /// Questions returned across all successful requests.
    pub questions_generated: u64,
    /// Books ingested since startup.
    pub books_ingested: u64,
    /// Chunks written across all ingested books.
    pub chunks_indexed: u64,
}
