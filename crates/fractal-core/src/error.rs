//! Error types shared by the swarm core and its collaborators.

use thiserror::Error;

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, FractalError>;

/// Boxed error raised by an environment or model implementation.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by state containers, the walkers engine and the swarm driver.
#[derive(Debug, Error)]
pub enum FractalError {
    /// A collaborator was asked for a capability it does not provide.
    #[error("{component} does not implement `{operation}`")]
    NotImplemented {
        component: &'static str,
        operation: &'static str,
    },
    /// Access to an attribute that is not part of the container's schema.
    #[error("unknown state attribute `{0}`")]
    InvalidKey(String),
    /// Batch size, trailing shape or dtype disagreement.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// Every walker is terminal and the swarm is configured to fail in that case.
    #[error("no alive walkers are left to act as companions")]
    NoSurvivors,
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The swarm was stepped or balanced before being reset.
    #[error("swarm has not been reset")]
    Uninitialized,
    /// Failure reported by an environment or model, forwarded untouched.
    #[error("{component} failed: {source}")]
    Collaborator {
        component: &'static str,
        #[source]
        source: BoxedSource,
    },
}

impl FractalError {
    /// Wrap a collaborator error without altering it.
    pub fn collaborator(
        component: &'static str,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::Collaborator {
            component,
            source: source.into(),
        }
    }

    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Self::ShapeMismatch(message.into())
    }
}
