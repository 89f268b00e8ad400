//! Application layer
//!
//! Orchestrates the domain and infrastructure pieces: folding extracted
//! records into output rows, reporting progress and driving batch runs.

pub mod assembler;
pub mod batch;
pub mod events;

pub use assembler::{assemble, combined_description};
pub use batch::{BatchError, BatchJob, BatchQueue, BatchRunner, BatchSettings, spawn_batch};
pub use events::EventEmitter;
