//! obsgrid - Per-second alignment engine for dual-track behavioral
//! observation logs
//!
//! obsgrid turns sparse, irregularly time-stamped observation events into a
//! dense second-by-second series through a deterministic pipeline: time
//! normalization → track classification → per-second expansion → cross-track
//! merge → categorical coding → consistency validation.
//!
//! ## Modules
//!
//! - **timeparse / classify**: normalize time strings and behavior labels
//! - **expand**: dense per-second grids with carry-forward
//! - **merge / coding**: cross-track reconciliation and categorical coding
//! - **validate**: structural integrity reporting
//! - **pipeline**: end-to-end orchestration

pub mod classify;
pub mod coding;
pub mod error;
pub mod expand;
pub mod ingest;
pub mod merge;
pub mod pipeline;
pub mod sessions;
pub mod timeparse;
pub mod types;
pub mod validate;

pub use classify::TrackTaxonomy;
pub use coding::CodingScheme;
pub use error::PipelineError;
pub use ingest::EventAdapter;
pub use merge::LabelPrecedence;
pub use pipeline::{align_events, AlignedOutput, GridProcessor};
pub use types::{
    EventKind, MergedRecord, RawEvent, SecondRecord, SessionKey, SessionLogEntry, TimeGrid, Track,
};
pub use validate::ValidationReport;

/// obsgrid version embedded in reports
pub const OBSGRID_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "obsgrid";
