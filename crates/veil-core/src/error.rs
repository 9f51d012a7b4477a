//! Error types. Every failure in the core is recoverable and reported to the
//! caller; none of them tear down the host.

use thiserror::Error;

use crate::PanelId;

/// Failure reported by an embedding host.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct HostError(pub String);

/// Panel registry errors. An `Err` always means the registry is unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PanelError {
    #[error("panel not found: {0}")]
    NotFound(PanelId),

    #[error("invalid panel config: {0}")]
    InvalidConfig(String),

    #[error("panel {0} is protected and cannot be removed")]
    Protected(PanelId),

    #[error("could not create surface for panel {id}: {reason}")]
    SurfaceFailed { id: PanelId, reason: HostError },
}

/// Concealment errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConcealError {
    /// The capture-exclusion primitive does not exist on this platform/build.
    #[error("capture exclusion is unavailable")]
    Unavailable,

    #[error("no window titled {0:?}")]
    NotFound(String),

    #[error("the OS refused to change capture exclusion for {0:?}")]
    ExclusionFailed(String),

    #[error("capture exclusion call for {0:?} exceeded its time budget")]
    TimedOut(String),

    #[error("no window titles given")]
    EmptyBatch,
}
