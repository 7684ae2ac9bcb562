use crate::store::StoreId;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Data store {0} is finalised; no more data can be added")]
    AlreadyFinalized(String),

    #[error("No quantitation has been set on {0}")]
    NoQuantitation(String),

    #[error("Probe index {index} is outside the quantitated range (0..{len})")]
    ProbeIndexOutOfRange { index: usize, len: usize },

    #[error("Values cannot be set on replicate set {0}")]
    ReplicateSetValue(String),

    #[error("Store {0} is not registered")]
    UnknownStore(StoreId),

    #[error("Replicate sets cannot contain other replicate sets ({0})")]
    NestedReplicateSet(String),

    #[error("{store} cannot be added here: {reason}")]
    InvalidMember { store: String, reason: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes: expected {expected}")]
    InvalidMagic { expected: String },

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),

    #[error("Checksum mismatch: expected {expected:#018x}, found {found:#018x}")]
    ChecksumMismatch { expected: u64, found: u64 },

    #[error("Data corruption: {0}")]
    Corruption(String),

    #[error("Failed to cache chromosome {chromosome}: {source}")]
    Spill {
        chromosome: String,
        #[source]
        source: Box<StoreError>,
    },

    #[error("Could not start finalise workers: {0}")]
    ThreadPool(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn spill(chromosome: &str, source: StoreError) -> Self {
        Self::Spill { chromosome: chromosome.to_string(), source: Box::new(source) }
    }

    /// True for errors caused by calling the API in the wrong state
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyFinalized(_)
                | Self::NoQuantitation(_)
                | Self::ProbeIndexOutOfRange { .. }
                | Self::ReplicateSetValue(_)
                | Self::UnknownStore(_)
                | Self::NestedReplicateSet(_)
                | Self::InvalidMember { .. }
        )
    }
}
