//! ReadStore Core Library
//!
//! Packed read storage, per-chromosome spill caches, paired (HiC) interaction
//! stores, aggregate views and the registry that ties them together.

pub mod types;
pub mod read;
pub mod reads;
pub mod hits;
pub mod dedup;
pub mod error;
pub mod spill;
pub mod config;
pub mod context;
pub mod cursor;
pub mod quant;
pub mod stats;
pub mod events;
pub mod store;
pub mod dataset;
pub mod correction;
pub mod paired;
mod aggregate;
pub mod group;
pub mod replicate;
pub mod registry;

// Re-export commonly used types
pub use types::{Chromosome, Genome, GenomicPos, Probe, ProbeSet, Strand};
pub use read::{PackedRead, MAX_POSITION};
pub use reads::ReadsWithCounts;
pub use hits::{HitCollection, HitList};
pub use dedup::DuplicateMode;
pub use error::{StoreError, StoreResult};
pub use config::StoreConfig;
pub use context::StoreContext;
pub use store::{DataStore, HiCDataStore, SharedStore, StoreId, StoreKind};
pub use dataset::DataSet;
pub use paired::{PairedDataSet, PairedOptions};
pub use group::DataGroup;
pub use replicate::ReplicateSet;
pub use registry::Registry;
pub use events::{DataChange, DataChangeListener};

/// Version information for the ReadStore core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
