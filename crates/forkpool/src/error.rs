//! Session-level error taxonomy.

use crate::{clients::ClientError, install::InstallError, networks::LookupError, pool::PoolError};
use alloy_transport::TransportError;
use std::fmt;
use thiserror::Error;

/// Convenience alias for session results.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// What a failed stop operation was aimed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopTarget {
    /// A single instance.
    Instance,
    /// One pool slot.
    Slot(usize),
    /// The whole pool.
    Pool,
}

impl fmt::Display for StopTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance => f.write_str("the instance"),
            Self::Slot(slot) => write!(f, "pool slot {slot}"),
            Self::Pool => f.write_str("the pool"),
        }
    }
}

/// Why a single chain failed to fork.
#[derive(Debug, Error)]
pub enum ForkFailure {
    /// No explicit fork URL was given and no preset matched.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// The pool could not start the slot.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// The launched instance reported an unusable endpoint.
    #[error("instance endpoint `{url}` is not a valid URL")]
    Endpoint {
        /// The offending endpoint.
        url: String,
        /// The parse failure.
        #[source]
        source: url::ParseError,
    },
    /// Querying the live fork for its chain id failed.
    #[error("could not query the forked network")]
    ChainId(#[source] TransportError),
}

/// Errors surfaced by fork session operations.
///
/// Every variant wraps its original cause; nothing is recovered or retried
/// internally.
#[derive(Debug, Error)]
pub enum Error {
    /// Probing for or installing the anvil binary failed.
    #[error("anvil is not available and could not be installed")]
    Setup(#[from] InstallError),
    /// One chain in the batch failed to fork; the batch was aborted.
    #[error("could not fork `{chain}`")]
    PoolStart {
        /// Request key of the failing chain.
        chain: String,
        /// What went wrong for it.
        #[source]
        source: ForkFailure,
    },
    /// Building the RPC clients for a fork failed.
    #[error("could not build RPC clients for `{chain}`")]
    ClientConstruction {
        /// Request key of the failing chain.
        chain: String,
        /// The construction failure.
        #[source]
        source: ClientError,
    },
    /// A stop operation failed.
    #[error("could not stop {target}")]
    Stop {
        /// What the stop was aimed at.
        target: StopTarget,
        /// The underlying failure.
        #[source]
        source: PoolError,
    },
}
