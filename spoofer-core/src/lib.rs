pub mod collect;
pub mod config;
pub mod error;
pub mod models;

pub use collect::{
    classify, estimate_eta, format_record, match_record, page_count_from_reference,
    resolve_reference, Classification, CollectionObserver, CollectionOutcome, CollectionSummary,
    Collector, CollectorSettings, Eta, HttpPageSource, MatchedRecord, NoopObserver, OutputFiles,
    OutputKind, PageFetcher, PageSource, ProgressSnapshot, ProgressState, RunState,
};
pub use config::{
    ApiConfig, CollectionConfig, CollectorConfig, LoggingConfig, OutputConfig, RetrySettings,
    DEFAULT_API_BASE, DEFAULT_PRIVATE_OUTPUT, DEFAULT_ROUTED_OUTPUT,
};
pub use error::{
    retry_with_backoff, CliErrorDisplay, RetryEvent, RetryPolicy, Sleeper, SpooferError,
    SpooferResult, TokioSleeper,
};
pub use models::{FieldValue, PageView, SessionPage, SessionRecord, SPOOF_RECEIVED};
