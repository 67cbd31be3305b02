//! Error taxonomy shared by the batch client, the fetcher and the aggregates.
//!
//! Only batch-level and bookkeeping failures are errors. An unclassifiable pool is a
//! [`TokenType::Unclassified`](crate::types::TokenType) value and a guarded division is
//! [`AprValue::NoData`](crate::apr::AprValue); neither ever surfaces here.

use std::fmt;
use std::time::Duration;

/// Failure of one whole batch round trip.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BatchError {
    #[error("rpc transport failure: {0}")]
    Transport(String),
    #[error("batch timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed aggregate3 response: {0}")]
    MalformedResponse(String),
}

/// Batched stage of a population pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scalars,
    Descriptors,
    ShapeReads,
    UnderlyingReads,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scalars => "stage 0 (scalar reads)",
            Stage::Descriptors => "stage 1 (pool descriptors)",
            Stage::ShapeReads => "stage 2 (shape reads)",
            Stage::UnderlyingReads => "stage 3 (underlying reads)",
        };
        f.write_str(name)
    }
}

/// Why a population pass was abandoned. Population is all-or-nothing: any of these
/// leaves the previously published snapshot (if any) untouched.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PopulationError {
    #[error("batch call failed during {stage}: {source}")]
    TransientRemoteFailure {
        stage: Stage,
        #[source]
        source: BatchError,
    },
    #[error("{stage}: expected {expected} results, got {actual}")]
    ConfigurationMismatch {
        stage: Stage,
        expected: usize,
        actual: usize,
    },
    #[error("{stage}: call {index} reverted or returned undecodable data")]
    MalformedResult { stage: Stage, index: usize },
    #[error("invalid staking contract configuration: {0}")]
    InvalidConfig(String),
}

impl PopulationError {
    pub fn transient(stage: Stage, source: BatchError) -> Self {
        PopulationError::TransientRemoteFailure { stage, source }
    }

    /// Whether a caller-side retry can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, PopulationError::TransientRemoteFailure { .. })
    }
}
