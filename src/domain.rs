//! Domain module - Core business logic and entities
//!
//! Pure types and functions with no I/O: identifier canonicalization,
//! the extracted product record, value normalization, field selection,
//! output schema construction and batch lifecycle events.

pub mod events;
pub mod fields;
pub mod identifier;
pub mod product;
pub mod schema;
pub mod weight;

// Re-export commonly used items for convenience
pub use events::{BatchEvent, BatchStatus, BatchSummary};
pub use fields::FieldSelection;
pub use identifier::{normalize, RetrievalKey};
pub use product::{ProductRecord, Specifications};
pub use schema::{build_schema, title_case, OutputSchema};
pub use weight::normalize_weight;
