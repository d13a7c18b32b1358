//! High-level driver for computing extremal eigenpairs of a symmetric
//! operator.
//!
//! This module provides the user-facing API of the crate. [`SymEigsSolver`]
//! orchestrates the pieces in [`crate::algorithms`]: it builds the initial
//! Lanczos factorization from a starting residual, extends it to the full
//! working subspace, and then alternates convergence tests with implicit
//! restarts until the requested number of Ritz pairs has converged or the
//! iteration budget runs out.
//!
//! Two operator modes share the same driver. The direct mode computes
//! eigenvalues of A selected by a [`SelectionRule`]; the shift-invert mode
//! runs the identical machinery on (A − σI)⁻¹ and maps the results back
//! through λ = 1/θ + σ, which resolves eigenvalues close to σ far faster
//! than the direct iteration would.

use crate::{
    algorithms::lanczos::LanczosFactorization,
    error::{EigsError, EigsErrorKind},
    matrix::{ShiftInvert, ShiftSolveOperator, SymOperator},
    selection::SelectionRule,
};
use faer::{Accum, Mat, MatRef, Par, linalg::matmul::matmul, traits::RealField};
use num_traits::Float;
use rand::Rng;

/// Default cap on the number of restart iterations.
pub const DEFAULT_MAX_ITER: usize = 1000;
/// Default relative tolerance of the convergence test.
pub const DEFAULT_TOL: f64 = 1e-10;

/// Computes a small number of extremal eigenvalues, and the associated
/// eigenvectors, of a large real symmetric operator.
///
/// The operator is only ever touched through [`SymOperator::apply`], so A can
/// be dense, sparse, or a function; it is never copied. The solver asks for
/// `nev` eigenpairs using an `ncv`-dimensional working subspace
/// (`nev < ncv ≤ n`; `ncv` of at least `2 * nev` is a common choice).
///
/// # Example
///
/// ```
/// use faer::Mat;
/// use restarted_lanczos::{SelectionRule, solvers::SymEigsSolver};
///
/// // A = diag(1, 2, ..., 10); the three largest eigenvalues are 10, 9, 8.
/// let a = Mat::from_fn(10, 10, |i, j| if i == j { (i + 1) as f64 } else { 0.0 });
/// let mut solver = SymEigsSolver::new(&a, 3, 6, SelectionRule::LargestMagnitude).unwrap();
/// solver.init().unwrap();
/// let nconv = solver.compute(1000, 1e-10).unwrap();
/// assert_eq!(nconv, 3);
/// let evals = solver.eigenvalues();
/// assert!((evals[0] - 10.0).abs() < 1e-8);
/// ```
pub struct SymEigsSolver<T, O> {
    op: O,
    core: LanczosFactorization<T>,
    rule: SelectionRule,
    n: usize,
    nev: usize,
    ncv: usize,
    // Set in shift-invert mode; Ritz values are untransformed through
    // lambda = 1/theta + sigma before the final sort.
    sigma: Option<T>,
    initialized: bool,
}

impl<T: RealField + Float, O: SymOperator<T>> SymEigsSolver<T, O> {
    /// Creates a solver for `nev` eigenpairs of `op` under `rule`, using an
    /// `ncv`-dimensional working subspace.
    ///
    /// `ncv` is clamped to the operator order n.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` unless 1 ≤ nev < n and nev < ncv.
    pub fn new(op: O, nev: usize, ncv: usize, rule: SelectionRule) -> Result<Self, EigsError> {
        Self::with_mode(op, nev, ncv, rule, None)
    }

    fn with_mode(
        op: O,
        nev: usize,
        ncv: usize,
        rule: SelectionRule,
        sigma: Option<T>,
    ) -> Result<Self, EigsError> {
        let n = op.rows();
        if nev < 1 || nev >= n {
            return Err(EigsErrorKind::InvalidArgument(format!(
                "nev must be greater than zero and less than the size of the matrix (nev = {nev}, n = {n})"
            ))
            .into());
        }
        if ncv <= nev {
            return Err(EigsErrorKind::InvalidArgument(format!(
                "ncv must be greater than nev (nev = {nev}, ncv = {ncv})"
            ))
            .into());
        }
        let ncv = ncv.min(n);
        Ok(Self {
            core: LanczosFactorization::new(n, nev, ncv),
            op,
            rule,
            n,
            nev,
            ncv,
            sigma,
            initialized: false,
        })
    }

    /// Initializes the solver with a random residual vector, uniform on
    /// [−0.5, 0.5].
    pub fn init(&mut self) -> Result<(), EigsError> {
        let mut rng = rand::rng();
        let resid = Mat::from_fn(self.n, 1, |_, _| {
            T::from(rng.random::<f64>() - 0.5).unwrap()
        });
        self.init_with(resid.as_ref())
    }

    /// Initializes the solver with the residual vector `resid` (n × 1).
    ///
    /// All solver state is reset: counters go back to zero and any previous
    /// results are discarded.
    ///
    /// # Errors
    ///
    /// Fails with `ZeroInitialResidual` when ‖resid‖ is below the precision
    /// floor, and with `InvalidArgument` on a dimension mismatch.
    pub fn init_with(&mut self, resid: MatRef<'_, T>) -> Result<(), EigsError> {
        if resid.nrows() != self.n || resid.ncols() != 1 {
            return Err(EigsErrorKind::InvalidArgument(format!(
                "initial residual must be {} x 1, got {} x {}",
                self.n,
                resid.nrows(),
                resid.ncols()
            ))
            .into());
        }
        self.core.initialize(resid, &self.op)?;
        self.initialized = true;
        Ok(())
    }

    /// Runs the restarted iteration and returns the number of converged
    /// eigenpairs, at most `nev`.
    ///
    /// The factorization is first extended to the full `ncv` steps; then each
    /// iteration tests convergence and, if fewer than `nev` pairs pass,
    /// compresses and re-extends the factorization with the unwanted Ritz
    /// values as shifts. Reaching `maxit` without full convergence is not an
    /// error: the converged subset is still available, and callers decide
    /// what to do with a short count.
    ///
    /// On return the first `nconv` Ritz pairs are sorted by descending
    /// magnitude regardless of the selection rule.
    pub fn compute(&mut self, maxit: usize, tol: T) -> Result<usize, EigsError> {
        if !self.initialized {
            return Err(EigsErrorKind::NotInitialized.into());
        }

        // The ncv-step factorization, continuing from the residual of init.
        self.core.extend(1, self.ncv, &self.op)?;
        self.core.retrieve_ritzpair(self.rule)?;

        let mut nconv = 0;
        let mut i = 0;
        while i < maxit {
            nconv = self.core.num_converged(tol);
            if nconv >= self.nev {
                break;
            }
            log::debug!(
                "restart {i}: {nconv}/{} wanted Ritz pairs converged",
                self.nev
            );
            let nev_adj = self.core.nev_adjusted(nconv);
            self.core.restart(nev_adj, &self.op, self.rule)?;
            i += 1;
        }

        self.sort_ritzpair();
        self.core.niter += i + 1;
        Ok(self.nev.min(nconv))
    }

    /// Returns the converged eigenvalues, sorted by descending magnitude.
    pub fn eigenvalues(&self) -> Vec<T> {
        (0..self.nev)
            .filter(|&i| self.core.ritz_conv[i])
            .map(|i| self.core.ritz_val[i])
            .collect()
    }

    /// Returns the converged eigenvectors as the columns of an n × nconv
    /// matrix, in the order of [`Self::eigenvalues`].
    ///
    /// The vectors are formed on demand as V·Z where Z holds the converged
    /// columns of the Ritz vector matrix.
    pub fn eigenvectors(&self) -> Mat<T> {
        let conv: Vec<usize> = (0..self.nev).filter(|&i| self.core.ritz_conv[i]).collect();
        let nconv = conv.len();

        let mut subset = Mat::<T>::zeros(self.ncv, nconv);
        for (j, &i) in conv.iter().enumerate() {
            subset.col_mut(j).copy_from(self.core.ritz_vec.col(i));
        }

        let mut res = Mat::<T>::zeros(self.n, nconv);
        matmul(
            res.as_mut(),
            Accum::Replace,
            self.core.basis(),
            subset.as_ref(),
            T::one(),
            Par::Seq,
        );
        res
    }

    /// Diagnostic counters: (restart iterations, operator applications).
    pub fn info(&self) -> (usize, usize) {
        (self.core.iterations(), self.core.matrix_ops())
    }

    /// Sorts the first nev Ritz pairs by decreasing magnitude. In
    /// shift-invert mode the values are mapped back to eigenvalues of A
    /// first, so the ordering refers to the reported spectrum.
    fn sort_ritzpair(&mut self) {
        let nev = self.nev;
        if let Some(sigma) = self.sigma {
            for i in 0..nev {
                let theta = self.core.ritz_val[i];
                self.core.ritz_val[i] = theta.recip() + sigma;
            }
        }

        let mut pairs: Vec<(T, usize)> = (0..nev).map(|i| (self.core.ritz_val[i], i)).collect();
        pairs.sort_by(|a, b| SelectionRule::LargestMagnitude.cmp(a.0, b.0));

        let mut new_vec = Mat::<T>::zeros(self.ncv, nev);
        let mut new_conv = vec![false; nev];
        for (i, &(val, idx)) in pairs.iter().enumerate() {
            self.core.ritz_val[i] = val;
            new_vec.col_mut(i).copy_from(self.core.ritz_vec.col(idx));
            new_conv[i] = self.core.ritz_conv[idx];
        }
        self.core.ritz_vec = new_vec;
        self.core.ritz_conv = new_conv;
    }
}

impl<T: RealField + Float, O: ShiftSolveOperator<T>> SymEigsSolver<T, ShiftInvert<O>> {
    /// Creates a shift-invert solver targeting eigenvalues of A near `sigma`.
    ///
    /// The operator's `set_shift` is called once here; the Lanczos machinery
    /// then runs unchanged on B = (A − σI)⁻¹. Eigenvalues of A closest to σ
    /// become the largest-magnitude eigenvalues of B, so
    /// [`SelectionRule::LargestMagnitude`] is the usual rule in this mode.
    /// Reported eigenvalues are mapped back to the spectrum of A.
    pub fn new_shift_invert(
        mut op: O,
        nev: usize,
        ncv: usize,
        rule: SelectionRule,
        sigma: T,
    ) -> Result<Self, EigsError> {
        op.set_shift(sigma);
        Self::with_mode(ShiftInvert::new(op), nev, ncv, rule, Some(sigma))
    }
}
