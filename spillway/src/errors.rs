use std::fmt::Display;

use thiserror::Error;

use crate::wrapper::OverflowPointer;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The item store refused a record for exceeding its per-record ceiling.
    #[error("record of {size} bytes exceeds the item store limit of {limit} bytes")]
    SizeLimitExceeded { size: usize, limit: usize },
    #[error(transparent)]
    Adapter(#[from] anyhow::Error),
    #[error("failed to encode {what}")]
    Encode {
        what: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("failed to decode {what}")]
    Decode {
        what: &'static str,
        #[source]
        source: BoxError,
    },
    /// An item-store record points at a blob that does not exist.
    #[error("overflow pointer {0} has no blob behind it")]
    DanglingPointer(OverflowPointer),
    #[error("{}", AggregateDisplay(.0))]
    Aggregate(Vec<StoreError>),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

struct AggregateDisplay<'a>(&'a [StoreError]);

// Implementations

impl StoreError {
    pub fn encode(what: &'static str, source: impl Into<BoxError>) -> Self {
        StoreError::Encode {
            what,
            source: source.into(),
        }
    }

    pub fn decode(what: &'static str, source: impl Into<BoxError>) -> Self {
        StoreError::Decode {
            what,
            source: source.into(),
        }
    }

    /// Whether this is the record-too-large signal which triggers overflow on write.
    pub fn is_size_limit(&self) -> bool {
        matches!(self, StoreError::SizeLimitExceeded { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, StoreError::Decode { .. })
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Adapter(e.into())
    }
}

impl Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} storage operations failed", self.0.len())?;
        for (i, e) in self.0.iter().enumerate() {
            write!(f, "{}{e}", if i == 0 { ": " } else { "; " })?;
        }
        Ok(())
    }
}

/// Combine the outcomes of two storage calls which ran side by side.
///
/// A single failure is returned as is. Neither side is undone when the other fails.
pub(crate) fn join_outcomes(a: Result<()>, b: Result<()>) -> Result<()> {
    match (a, b) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(a), Err(b)) => Err(StoreError::Aggregate(vec![a, b])),
    }
}
