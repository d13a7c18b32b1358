//! # Restarted Lanczos

//! A library for computing a few extremal eigenvalues and eigenvectors of a
//! large real symmetric matrix, given only its action y ← A·x. The solver is
//! an implicitly restarted Lanczos iteration: it maintains a small Krylov
//! factorization of the operator, and compresses it with shifted QR sweeps
//! whenever the working subspace fills up, keeping the directions that carry
//! the wanted part of the spectrum.

// Declare the modules that form the public API of the crate.
pub mod algorithms;
pub mod error;
pub mod matrix;
pub mod selection;
pub mod solvers;

// Re-export key types to the top level of the crate for easier access.
pub use error::EigsError;
pub use matrix::{DenseShiftSolve, ShiftInvert, ShiftSolveOperator, SymOperator};
pub use selection::SelectionRule;
pub use solvers::{DEFAULT_MAX_ITER, DEFAULT_TOL, SymEigsSolver};
