/// Engram system version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Characters above which ingested text is chunked.
pub const CHUNK_THRESHOLD_CHARS: usize = 1_200;

/// Chunk window and overlap, in characters.
pub const CHUNK_SIZE_CHARS: usize = 1_000;
pub const CHUNK_OVERLAP_CHARS: usize = 200;

/// Rows per page in the decay sweep.
pub const DECAY_PAGE_SIZE: usize = 1_000;

/// The decay sweep yields to the runtime after this many rows.
pub const DECAY_YIELD_EVERY: usize = 5_000;

/// The classifier trainer yields after this many samples.
pub const TRAIN_YIELD_EVERY: usize = 100;

/// Classifier model cache capacity (users).
pub const CLASSIFIER_CACHE_CAP: usize = 100;

/// Prepared-statement cache capacity per connection.
pub const STATEMENT_CACHE_CAP: usize = 100;

/// Scan-based KNN warns when the candidate set exceeds this.
pub const SCAN_WARN_ROWS: usize = 10_000;

/// Provider retry schedule (exponential backoff), milliseconds.
pub const RETRY_BACKOFF_MS: [u64; 3] = [1_000, 2_000, 4_000];

/// Soft timeout for one provider HTTP call, seconds.
pub const PROVIDER_TIMEOUT_SECS: u64 = 30;

/// A pending embed-log row older than this is considered abandoned.
/// Recovery is the operator's concern, not the core's.
pub const EMBED_LOG_STALL_SECS: u64 = 600;

/// Salience writes below this delta are skipped by the decay sweep.
pub const DECAY_WRITE_EPSILON: f64 = 0.001;
