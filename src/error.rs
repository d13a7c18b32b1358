//! This module defines the custom error types for the library.
//!
//! This module centralizes all error conditions that can arise within the
//! eigensolver into a single, comprehensive enum: [`EigsErrorKind`], wrapped
//! by the public [`EigsError`] type.
//!
//! Using the [`thiserror`] crate allows us to create idiomatic error types with
//! minimal boilerplate. Note that [`faer::linalg::evd::EvdError`] does not
//! implement the standard [`std::error::Error`] trait, so we wrap it manually
//! to provide a compatible error type.
use thiserror::Error;

/// Represents all possible errors that can occur while computing eigenpairs.
///
#[derive(Error, Debug)]
#[error(transparent)]
pub struct EigsError(#[from] EigsErrorKind);

/// Private enum containing the distinct kinds of errors.
/// This separation allows for a clean `Display` implementation via [`thiserror`]
/// while handling non-standard error types manually.
#[derive(Error, Debug, PartialEq)]
pub(crate) enum EigsErrorKind {
    /// Indicates that an invalid parameter was provided at construction or
    /// initialization time.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Occurs when the supplied (or generated) initial residual vector has a
    /// norm below the precision floor and cannot be normalized.
    #[error("Initial residual vector cannot be zero.")]
    ZeroInitialResidual,

    /// Occurs when `compute` is called on a solver that has not been
    /// initialized with `init` or `init_with`.
    #[error("The solver has not been initialized. Call init() or init_with() first.")]
    NotInitialized,

    /// Occurs when a result is queried from a QR decomposition object before
    /// `compute` has been called on it.
    #[error("The QR decomposition has not been computed yet.")]
    NotComputed,

    /// Occurs when a Givens rotation degenerates during a QR sweep: both
    /// elements of a leading pair are below machine epsilon.
    #[error("Degenerate Givens rotation at step {step}: both pivot elements are below machine epsilon.")]
    SingularRotation { step: usize },

    /// Occurs when the Lanczos recurrence cannot produce a new direction
    /// orthogonal to the current basis.
    #[error("Numerical stall at step {step}: no new orthogonal direction could be generated.")]
    NumericalStall { step: usize },

    /// Wraps an error originating from [`faer`]'s eigendecomposition module.
    #[error("A numerical error occurred during the eigendecomposition of H: {0:?}")]
    EvdError(faer::linalg::evd::EvdError),
}

// Manually implement PartialEq for the public error type.
// We compare the inner `EigsErrorKind`.
impl PartialEq for EigsError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
