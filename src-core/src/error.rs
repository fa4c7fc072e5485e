//! Error kinds shared across the workspace.

use dfoptim_mesh::MeshError;

/// Errors surfaced by evaluators, methods, and the solver driver.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The user objective reported a failure.  Results computed before the
    /// failure are still returned alongside it.
    #[error("objective evaluation failed: {0}")]
    Objective(String),

    /// Dimension mismatch between a point, mesh, bound vector, or constraint
    /// matrix.  Always fatal for the operation that raised it.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    Shape {
        /// Dimension the operation was configured for.
        expected: usize,
        /// Dimension of the offending input.
        got: usize,
    },

    /// A matrix inverse or solve failed inside a projection.
    #[error("singular matrix: {0}")]
    Singular(String),

    /// The poll step was halved down to nothing; a signal to the driver
    /// that the pattern search cannot make further progress.
    #[error("poll step size contracted to zero")]
    ZeroStep,

    /// A better position was discovered mid-batch.  Control flow internal
    /// to opportunistic polling; evaluators translate it into
    /// [`BatchStatus::FoundBetter`](crate::eval::BatchStatus::FoundBetter)
    /// and it never reaches the driver.
    #[error("better position discovered")]
    FoundBetter,
}

impl From<MeshError> for Error {
    fn from(e: MeshError) -> Self {
        match e {
            MeshError::Shape { expected, got } => Error::Shape { expected, got },
            MeshError::Singular(msg) => Error::Singular(msg),
        }
    }
}
