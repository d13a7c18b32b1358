//! Low-level building blocks of the restarted eigensolver.
//!
//! ** NOTE: We recommend using the high-level driver in [`crate::solvers`]
//! instead. These modules are intended for use cases where fine-grained
//! control over the Lanczos process is required.
//!
//! The solver is assembled from two pieces:
//!
//! - **`hessenberg_qr`**: Givens-rotation QR decompositions of upper
//!   Hessenberg and symmetric tridiagonal matrices, the workhorse of the
//!   implicit restart.
//!
//! - **`lanczos`**: The Lanczos factorization A·V = V·H + f·eₘᵀ itself —
//!   extension with reorthogonalization, the implicitly shifted restart, the
//!   convergence test, and Ritz pair extraction.

pub mod hessenberg_qr;
pub mod lanczos;

use num_traits::Float;

/// The precision floor ε^(2/3) used throughout the solver, where ε is the
/// machine epsilon of `T` (about 2.22e-11 for `f64`).
///
/// Residual norms below this value are treated as numerically zero, and it
/// clamps the relative convergence threshold for Ritz values near zero.
pub fn precision_floor<T: Float>() -> T {
    T::epsilon().powf(T::from(2.0 / 3.0).unwrap())
}
