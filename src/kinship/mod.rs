//! Kinship
//!
//! Relation-code algebra and localized labels for indirect relationships
//! (aunt/uncle, niece/nephew, cousins, in-laws, step relations).

pub mod algebra;
pub mod labels;

pub use algebra::{compose, compute_relationship, Hop, Kinship, KinshipChain, RelationCode};
pub use labels::{generate_label, generate_label_str, resolve_kinship, KinshipResult, Locale};
