//! Duplicate profile detection
//!
//! ```text
//! persons ──► prefilter ──► scorer ──► cutoff ──► DuplicateQueue
//!   (slice)   (surname ×     (pairwise,            (external store,
//!              birth year)    0..=100)              unique pair key)
//! ```

pub mod names;
pub mod prefilter;
pub mod queue;
pub mod scorer;

pub use prefilter::{all_pairs, Prefilter};
pub use queue::{
    rank_page, relative_index, shared_relatives, CancelFlag, DuplicateQueue, DuplicateScanner,
    InMemoryQueue, InsertOutcome, Page, QueueEntry, ReviewStatus, ScanRequest, ScanResponse,
    ScanType,
};
pub use scorer::{DuplicateCandidate, DuplicateScorer, MatchReason, PairKey, ScoringWeights};
