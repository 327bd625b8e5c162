pub mod classifier;
pub mod driver;
pub mod estimator;
pub mod fetcher;
pub mod observer;
pub mod output;

pub use classifier::{classify, format_record, match_record, Classification, MatchedRecord};
pub use driver::{
    resolve_reference, CollectionOutcome, CollectionSummary, Collector, CollectorSettings,
    RunState,
};
pub use estimator::{estimate_eta, page_count_from_reference, Eta, ProgressState};
pub use fetcher::{HttpPageSource, PageFetcher, PageSource};
pub use observer::{CollectionObserver, NoopObserver, ProgressSnapshot};
pub use output::{HeaderContext, OutputFiles, OutputKind};
