//! This module defines the core abstractions for linear operators.
//!
//! Krylov subspace eigensolvers never need direct access to the individual
//! elements of the matrix whose spectrum they approximate. Their fundamental
//! operation is the matrix-vector product, so the algorithm can be written
//! against any object that can perform this action, known as a "linear
//! operator."
//!
//! This "matrix-free" approach offers significant advantages:
//! 1.  **Generality**: The solver is implemented once and used with dense
//!     matrices, sparse matrices, or functions that compute the product
//!     without explicitly storing a matrix, e.g. when the operator represents
//!     a physical simulation or a composition of other matrices.
//! 2.  **Testability**: The same algorithm can be tested on small dense
//!     matrices with known spectra, and then deployed on large operators
//!     without changing the core logic.
//! 3.  **Encapsulation**: Storage and product details stay behind a small
//!     interface.
//!
//! Two operator contracts are defined here. [`SymOperator`] is the plain
//! product y ← A·x used by the direct eigensolver. [`ShiftSolveOperator`] is
//! the shifted-solve y ← (A − σI)⁻¹·x used by the shift-invert mode; the
//! [`ShiftInvert`] adapter turns the latter into the former so the solver
//! itself never distinguishes the two.

use crate::error::{EigsError, EigsErrorKind};
use faer::{
    Accum, Mat, MatMut, MatRef, Par,
    linalg::matmul::matmul,
    linalg::solvers::{PartialPivLu, Solve},
    prelude::Reborrow,
    traits::RealField,
};
use num_traits::Float;

/// Represents a real symmetric linear operator of order n.
///
/// This trait provides the abstraction for the matrix-vector product, the only
/// operation the Lanczos process requires from the matrix A. The operator is
/// assumed symmetric; the solver does not verify this, and feeding a
/// non-symmetric operator produces meaningless results.
///
/// # Type Parameters
///
/// *   `T`: The real scalar type (`f32` or `f64` through the
///     `faer::traits::RealField` + `num_traits::Float` pair).
pub trait SymOperator<T> {
    /// Returns the order n of the operator.
    fn rows(&self) -> usize;

    /// Applies the operator to the column vector `x`, writing y ← A·x.
    ///
    /// Both `x` and `y` are n × 1. The implementation must overwrite `y`
    /// completely; the solver reuses the output buffer across iterations.
    ///
    /// # Panics
    ///
    /// Implementations are expected to panic if the dimensions of `x` or `y`
    /// do not match the operator's order.
    fn apply(&self, x: MatRef<'_, T>, y: MatMut<'_, T>);
}

/// Represents an operator supporting the shifted solve y ← (A − σI)⁻¹·x.
///
/// This is the operator contract of the shift-invert mode: the linear solve
/// behind it (a factorization, an iterative method, ...) is the caller's
/// concern. `set_shift` is invoked once by the solver constructor before any
/// `shift_solve` call and may perform the expensive part (e.g. refactorize).
pub trait ShiftSolveOperator<T> {
    /// Returns the order n of the operator.
    fn rows(&self) -> usize;

    /// Installs the shift σ used by subsequent `shift_solve` calls.
    fn set_shift(&mut self, sigma: T);

    /// Applies the shifted inverse to the column vector `x`, writing
    /// y ← (A − σI)⁻¹·x.
    fn shift_solve(&self, x: MatRef<'_, T>, y: MatMut<'_, T>);
}

/// Implementation of `SymOperator` for `faer`'s immutable dense matrix view
/// (`MatRef`). This is the primary concrete implementation that the solver is
/// tested against.
impl<'a, T: RealField + Float> SymOperator<T> for MatRef<'a, T> {
    #[inline]
    fn rows(&self) -> usize {
        self.nrows()
    }

    #[inline]
    fn apply(&self, x: MatRef<'_, T>, y: MatMut<'_, T>) {
        assert_eq!(
            self.ncols(),
            x.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            self.ncols(),
            x.nrows(),
        );

        // Defer to faer's matrix multiplication kernel.
        matmul(y, Accum::Replace, *self, x, T::one(), Par::Seq);
    }
}

/// Implementation of `SymOperator` for `faer`'s mutable dense matrix view
/// (`MatMut`). Delegates to the `MatRef` implementation via a reborrow.
impl<'a, T: RealField + Float> SymOperator<T> for MatMut<'a, T> {
    #[inline]
    fn rows(&self) -> usize {
        self.rb().nrows()
    }

    #[inline]
    fn apply(&self, x: MatRef<'_, T>, y: MatMut<'_, T>) {
        self.rb().apply(x, y)
    }
}

/// Implementation of `SymOperator` for `faer`'s owned dense matrix (`Mat`).
/// Delegates to the `MatRef` implementation via a reference.
impl<T: RealField + Float> SymOperator<T> for Mat<T> {
    #[inline]
    fn rows(&self) -> usize {
        self.as_ref().nrows()
    }

    #[inline]
    fn apply(&self, x: MatRef<'_, T>, y: MatMut<'_, T>) {
        self.as_ref().apply(x, y)
    }
}

/// Any reference to an operator is itself an operator. This lets callers lend
/// a matrix to the solver instead of moving it.
impl<T, O: SymOperator<T> + ?Sized> SymOperator<T> for &O {
    #[inline]
    fn rows(&self) -> usize {
        (**self).rows()
    }

    #[inline]
    fn apply(&self, x: MatRef<'_, T>, y: MatMut<'_, T>) {
        (**self).apply(x, y)
    }
}

/// Adapter presenting a [`ShiftSolveOperator`] as a [`SymOperator`].
///
/// The shift-invert eigensolver runs the unmodified Lanczos machinery on
/// B = (A − σI)⁻¹; this wrapper is the operator variant that makes that
/// possible without a second solver implementation.
pub struct ShiftInvert<O> {
    op: O,
}

impl<O> ShiftInvert<O> {
    /// Wraps a shift-solve operator. The shift itself must already be
    /// installed via [`ShiftSolveOperator::set_shift`].
    pub fn new(op: O) -> Self {
        Self { op }
    }

    /// Consumes the adapter and returns the wrapped operator.
    pub fn into_inner(self) -> O {
        self.op
    }
}

impl<T, O: ShiftSolveOperator<T>> SymOperator<T> for ShiftInvert<O> {
    #[inline]
    fn rows(&self) -> usize {
        self.op.rows()
    }

    #[inline]
    fn apply(&self, x: MatRef<'_, T>, y: MatMut<'_, T>) {
        self.op.shift_solve(x, y)
    }
}

/// A dense-matrix [`ShiftSolveOperator`] backed by an LU factorization of
/// A − σI with partial pivoting.
///
/// This is a convenience implementation for problems small enough to afford a
/// dense factorization; large or structured problems should implement
/// [`ShiftSolveOperator`] with a solver suited to their structure.
pub struct DenseShiftSolve<T: RealField> {
    mat: Mat<T>,
    lu: PartialPivLu<T>,
}

impl<T: RealField + Float> DenseShiftSolve<T> {
    /// Factorizes A − σI and returns the operator.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` if `mat` is not square.
    pub fn new(mat: Mat<T>, sigma: T) -> Result<Self, EigsError> {
        if mat.nrows() != mat.ncols() {
            return Err(EigsErrorKind::InvalidArgument(format!(
                "shift-solve operator requires a square matrix, got {} x {}",
                mat.nrows(),
                mat.ncols()
            ))
            .into());
        }
        let lu = shifted_lu(mat.as_ref(), sigma);
        Ok(Self { mat, lu })
    }
}

/// LU of A − σI.
fn shifted_lu<T: RealField + Float>(mat: MatRef<'_, T>, sigma: T) -> PartialPivLu<T> {
    let n = mat.nrows();
    let mut shifted = mat.to_owned();
    {
        let mut s = shifted.as_mut();
        for i in 0..n {
            s[(i, i)] = s[(i, i)] - sigma;
        }
    }
    shifted.as_ref().partial_piv_lu()
}

impl<T: RealField + Float> ShiftSolveOperator<T> for DenseShiftSolve<T> {
    #[inline]
    fn rows(&self) -> usize {
        self.mat.nrows()
    }

    fn set_shift(&mut self, sigma: T) {
        self.lu = shifted_lu(self.mat.as_ref(), sigma);
    }

    fn shift_solve(&self, x: MatRef<'_, T>, mut y: MatMut<'_, T>) {
        assert_eq!(
            self.mat.nrows(),
            x.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            self.mat.nrows(),
            x.nrows(),
        );
        let sol = self.lu.solve(x);
        y.copy_from(sol.as_ref());
    }
}
