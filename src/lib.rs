//! Kinship Engine
//!
//! Genealogical relationship engine: builds a family graph from one-sided
//! relationship declarations, walks it into ancestor/descendant/hourglass
//! trees, buckets close relatives by exact distance, derives indirect
//! relation codes with bilingual labels, and proposes likely duplicate
//! person records.
//!
//! ## Features
//!
//! - **Declaration log → graph**: one-way normalisation of claims into
//!   parent→child edges and unions, tolerant of redundant or malformed claims
//! - **Bounded walks**: depth clamped to [1, 10], cycle-safe
//! - **Kinship algebra**: two-hop table plus left-fold over longer chains
//! - **Labels**: English and Russian, never empty
//! - **Duplicate scans**: surname/birth-year pruning, additive scoring,
//!   idempotent queue inserts
//!
//! ## Architecture
//!
//! ```text
//! RecordStore ──► GraphBuilder ──► FamilyGraph ──┬─► TreeView (tree)
//!      │                                          └─► DepthClassification
//!      │
//!      └─► DuplicateScanner ──► DuplicateScorer ──► DuplicateQueue
//!
//! RelationCode × DirectRelation ──► compose ──► generate_label(en | ru)
//! ```

pub mod config;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod graph;
pub mod kinship;
pub mod model;
pub mod store;

pub use config::EngineConfig;
pub use duplicates::{
    CancelFlag, DuplicateCandidate, DuplicateQueue, DuplicateScanner, DuplicateScorer, InMemoryQueue,
    InsertOutcome, PairKey, ScanRequest, ScanResponse, ScanType,
};
pub use engine::KinshipEngine;
pub use error::{KinshipError, Result};
pub use graph::{
    union_id, DepthClassification, Diagnostics, FamilyGraph, GraphBuilder, TreeDepth, TreeMode, TreeView,
};
pub use kinship::{
    compute_relationship, generate_label, KinshipChain, KinshipResult, Locale, RelationCode,
};
pub use model::{
    DirectRelation, Gender, Halfness, Lineage, Person, PersonId, PersonSummary, Qualifiers,
    RelationshipDeclaration,
};
pub use store::{RecordStore, Snapshot};
