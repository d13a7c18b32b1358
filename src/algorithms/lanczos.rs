//! The symmetric Lanczos factorization and its implicit restart.
//!
//! ** NOTE: We recommend using the high-level driver [`crate::solvers::SymEigsSolver`]
//! instead. This module is intended for use cases where fine-grained control
//! over the Lanczos process is required.
//!
//! [`LanczosFactorization`] maintains the m-step factorization
//!
//! A·V = V·H + f·eₘᵀ
//!
//! where the columns of the n × m matrix V are an orthonormal basis of a
//! Krylov subspace of A, H is symmetric tridiagonal, and f is the residual
//! that becomes the next basis direction once normalized. H is stored as a
//! full m × m matrix: the restart sweeps rotate entries throughout the band
//! and the dense eigendecomposition of H expects a full matrix.
//!
//! Between the public operations the factorization identity holds to working
//! precision, V stays orthonormal, and H stays symmetric tridiagonal. The
//! implicit restart ([`LanczosFactorization::restart`]) compresses an m-step
//! factorization to k steps by running one shifted QR sweep per unwanted Ritz
//! value, rotating V and the sentinel vector consistently, and re-extending.
//!
//! ## When to use this module directly
//!
//! - You need access to the intermediate basis matrix V or the projected
//!   matrix H
//! - You want to drive restarts or convergence checks yourself
//! - You're conducting algorithm benchmarking
//!
//! For normal usage, prefer [`crate::solvers::SymEigsSolver`] which provides
//! a simpler interface.

use crate::{
    algorithms::{hessenberg_qr::TridiagQR, precision_floor},
    error::{EigsError, EigsErrorKind},
    matrix::SymOperator,
    selection::{SelectionRule, both_ends_reorder},
};
use faer::{
    Accum, Mat, MatMut, MatRef, Par, Side, linalg::matmul::matmul, prelude::*, traits::RealField,
};
use num_traits::Float;
use rand::Rng;

/// State of the restarted Lanczos process for an operator of order n, with
/// nev requested eigenpairs and an m = ncv dimensional working subspace.
///
/// All storage is allocated at construction and reused across restarts; the
/// inner loops allocate nothing beyond the transient projection coefficients
/// of a reorthogonalization pass.
pub struct LanczosFactorization<T> {
    n: usize,
    nev: usize,
    ncv: usize,
    // Precision floor epsilon^(2/3).
    prec: T,

    // V matrix in the factorization, n x ncv.
    fac_v: Mat<T>,
    // H matrix in the factorization, ncv x ncv, symmetric tridiagonal.
    fac_h: Mat<T>,
    // Residual vector, n x 1.
    fac_f: Mat<T>,

    // Ritz values of H, length ncv, ordered by the selection rule.
    pub(crate) ritz_val: Vec<T>,
    // Top-nev Ritz vectors of H, ncv x nev.
    pub(crate) ritz_vec: Mat<T>,
    // Per-pair convergence flags, length nev.
    pub(crate) ritz_conv: Vec<bool>,

    // Number of operator applications.
    pub(crate) nmatop: usize,
    // Number of restart iterations.
    pub(crate) niter: usize,
}

impl<T: RealField + Float> LanczosFactorization<T> {
    /// Allocates a factorization for an operator of order `n`.
    ///
    /// The caller is responsible for the sizing constraints
    /// 1 ≤ nev < n and nev < ncv ≤ n; the driver validates them before
    /// construction.
    pub fn new(n: usize, nev: usize, ncv: usize) -> Self {
        debug_assert!(nev >= 1 && nev < n);
        debug_assert!(nev < ncv && ncv <= n);
        Self {
            n,
            nev,
            ncv,
            prec: precision_floor::<T>(),
            fac_v: Mat::zeros(n, ncv),
            fac_h: Mat::zeros(ncv, ncv),
            fac_f: Mat::zeros(n, 1),
            ritz_val: vec![T::zero(); ncv],
            ritz_vec: Mat::zeros(ncv, nev),
            ritz_conv: vec![false; nev],
            nmatop: 0,
            niter: 0,
        }
    }

    /// The orthonormal basis V, n × ncv.
    pub fn basis(&self) -> MatRef<'_, T> {
        self.fac_v.as_ref()
    }

    /// The projected matrix H, ncv × ncv, symmetric tridiagonal.
    pub fn subspace_matrix(&self) -> MatRef<'_, T> {
        self.fac_h.as_ref()
    }

    /// The residual vector f, n × 1.
    pub fn residual(&self) -> MatRef<'_, T> {
        self.fac_f.as_ref()
    }

    /// Number of operator applications performed so far.
    pub fn matrix_ops(&self) -> usize {
        self.nmatop
    }

    /// Number of restart iterations performed so far.
    pub fn iterations(&self) -> usize {
        self.niter
    }

    /// Resets all state to zero, then builds the length-1 factorization from
    /// the residual vector `resid`: v₀ = r/‖r‖, H[0,0] = ⟨v₀, A·v₀⟩,
    /// f = A·v₀ − H[0,0]·v₀.
    ///
    /// # Errors
    ///
    /// Fails with the zero-residual error when ‖r‖ is below the precision
    /// floor.
    pub fn initialize<O: SymOperator<T>>(
        &mut self,
        resid: MatRef<'_, T>,
        op: &O,
    ) -> Result<(), EigsError> {
        assert_eq!(
            (resid.nrows(), resid.ncols()),
            (self.n, 1),
            "initial residual must be {} x 1, got {} x {}.",
            self.n,
            resid.nrows(),
            resid.ncols(),
        );

        self.fac_v = Mat::zeros(self.n, self.ncv);
        self.fac_h = Mat::zeros(self.ncv, self.ncv);
        self.fac_f = Mat::zeros(self.n, 1);
        self.ritz_val.fill(T::zero());
        self.ritz_vec = Mat::zeros(self.ncv, self.nev);
        self.ritz_conv.fill(false);
        self.nmatop = 0;
        self.niter = 0;

        let vnorm = resid.norm_l2();
        if vnorm < self.prec {
            return Err(EigsErrorKind::ZeroInitialResidual.into());
        }

        let n = self.n;
        let mut v = Mat::<T>::zeros(n, 1);
        {
            let scale = vnorm.recip();
            let mut vm = v.as_mut();
            for r in 0..n {
                vm[(r, 0)] = resid[(r, 0)] * scale;
            }
        }

        let mut w = Mat::<T>::zeros(n, 1);
        op.apply(v.as_ref(), w.as_mut());
        self.nmatop += 1;

        let h00 = v.col(0).transpose() * w.col(0);
        self.fac_h.as_mut()[(0, 0)] = h00;
        {
            let mut f = self.fac_f.as_mut();
            let wr = w.as_ref();
            let vr = v.as_ref();
            for r in 0..n {
                f[(r, 0)] = wr[(r, 0)] - h00 * vr[(r, 0)];
            }
        }
        self.fac_v.col_mut(0).copy_from(v.col(0));
        Ok(())
    }

    /// Extends a factorization of length `from_k` (columns 0..from_k of V and
    /// the corresponding leading block of H valid) to length `to_m`, using
    /// `fk` as the residual at position `from_k`.
    ///
    /// `from_k` must be at least 1: the recurrence couples each new column to
    /// its predecessor, and [`Self::initialize`] is the way to build the
    /// length-1 factorization it starts from.
    pub fn factorize_from<O: SymOperator<T>>(
        &mut self,
        from_k: usize,
        to_m: usize,
        fk: MatRef<'_, T>,
        op: &O,
    ) -> Result<(), EigsError> {
        assert!(from_k >= 1, "factorize_from requires an existing factorization (from_k >= 1)");
        if to_m <= from_k {
            return Ok(());
        }
        self.fac_f.as_mut().copy_from(fk);
        self.extend(from_k, to_m, op)
    }

    /// The body of [`Self::factorize_from`], continuing from the residual
    /// already stored in the factorization.
    pub(crate) fn extend<O: SymOperator<T>>(
        &mut self,
        from_k: usize,
        to_m: usize,
        op: &O,
    ) -> Result<(), EigsError> {
        if to_m <= from_k {
            return Ok(());
        }
        let n = self.n;
        let ncv = self.ncv;

        // Keep the upper-left from_k x from_k block of H; zero the trailing
        // columns and the below-block rows of the leading columns, which the
        // recurrence and the restart rotations may have filled.
        {
            let mut h = self.fac_h.as_mut();
            for j in from_k..ncv {
                for i in 0..ncv {
                    h[(i, j)] = T::zero();
                }
            }
            for j in 0..from_k {
                for i in from_k..ncv {
                    h[(i, j)] = T::zero();
                }
            }
        }

        let mut v = Mat::<T>::zeros(n, 1);
        let mut w = Mat::<T>::zeros(n, 1);

        for i in from_k..to_m {
            let mut beta = self.fac_f.norm_l2();
            if beta < self.prec {
                // The current columns span an invariant subspace. Continue
                // the recurrence in the orthogonal complement with a fresh
                // random direction, coupled by an exact zero in H so the
                // factorization identity is preserved.
                log::warn!(
                    "Lanczos residual vanished at step {i}; continuing with a random orthogonal direction"
                );
                self.random_orthogonal_direction(i, v.as_mut())?;
                beta = T::zero();
            } else {
                let scale = beta.recip();
                let f = self.fac_f.as_ref();
                let mut vm = v.as_mut();
                for r in 0..n {
                    vm[(r, 0)] = f[(r, 0)] * scale;
                }
            }
            self.fac_v.col_mut(i).copy_from(v.col(0));
            {
                let mut h = self.fac_h.as_mut();
                h[(i, i - 1)] = beta;
                h[(i - 1, i)] = beta;
            }

            op.apply(v.as_ref(), w.as_mut());
            self.nmatop += 1;

            let hii = v.col(0).transpose() * w.col(0);
            self.fac_h.as_mut()[(i, i)] = hii;

            // Three-term recurrence: f = w - beta * v_{i-1} - hii * v_i.
            {
                let mut f = self.fac_f.as_mut();
                let wr = w.as_ref();
                let vr = v.as_ref();
                let basis = self.fac_v.as_ref();
                for r in 0..n {
                    f[(r, 0)] = wr[(r, 0)] - beta * basis[(r, i - 1)] - hii * vr[(r, 0)];
                }
            }

            // Correct f if it has drifted from orthogonality against the
            // basis. The largest spurious component typically shows up
            // against v_0, so <v_0, f> serves as a cheap sentinel; the full
            // projection is only taken when it trips. Single pass.
            let v0f = self.fac_v.col(0).transpose() * self.fac_f.col(0);
            if v0f.abs() > self.prec {
                let basis = self.fac_v.as_ref().get(.., 0..i + 1);
                let coef = basis.transpose() * self.fac_f.as_ref();
                matmul(
                    self.fac_f.as_mut(),
                    Accum::Add,
                    basis,
                    coef.as_ref(),
                    -T::one(),
                    Par::Seq,
                );
            }
        }
        Ok(())
    }

    /// Fills `v` with a unit vector orthogonal to the first `i` basis
    /// columns. Used when the recurrence residual vanishes.
    fn random_orthogonal_direction(
        &self,
        i: usize,
        mut v: MatMut<'_, T>,
    ) -> Result<(), EigsError> {
        let n = self.n;
        let mut rng = rand::rng();
        // A random draw lying numerically inside span(V) is possible but
        // astronomically unlikely; a few attempts distinguish bad luck from a
        // genuinely exhausted complement.
        for _ in 0..3 {
            for r in 0..n {
                v[(r, 0)] = T::from(rng.random::<f64>() - 0.5).unwrap();
            }
            let basis = self.fac_v.as_ref().get(.., 0..i);
            let coef = basis.transpose() * v.rb();
            matmul(v.rb_mut(), Accum::Add, basis, coef.as_ref(), -T::one(), Par::Seq);

            let norm = v.rb().norm_l2();
            if norm > self.prec {
                let scale = norm.recip();
                for r in 0..n {
                    let x = v[(r, 0)];
                    v[(r, 0)] = x * scale;
                }
                return Ok(());
            }
        }
        Err(EigsErrorKind::NumericalStall { step: i }.into())
    }

    /// Implicitly restarts the factorization, compressing it from length ncv
    /// to length `k` and re-extending to ncv.
    ///
    /// One shifted QR sweep runs per unwanted Ritz value μ: H − μI = QR,
    /// then V ← V·Q, H ← RQ + μI, and the sentinel e ← Qᵀ·e so that the
    /// continuation residual f·e[k−1] + v_k·H[k,k−1] tracks the rotated
    /// basis. Finishes by recomputing the Ritz pairs under `rule`.
    pub fn restart<O: SymOperator<T>>(
        &mut self,
        k: usize,
        op: &O,
        rule: SelectionRule,
    ) -> Result<(), EigsError> {
        if k >= self.ncv {
            return Ok(());
        }
        let ncv = self.ncv;
        let mut decomp = TridiagQR::new();
        let mut em = Mat::<T>::zeros(ncv, 1);
        em.as_mut()[(ncv - 1, 0)] = T::one();

        for i in k..ncv {
            let mu = self.ritz_val[i];
            // QR of the shifted matrix; since QR = H - mu*I, the similarity
            // transform Q'HQ equals RQ + mu*I.
            {
                let mut h = self.fac_h.as_mut();
                for j in 0..ncv {
                    h[(j, j)] = h[(j, j)] - mu;
                }
            }
            decomp.compute(self.fac_h.as_ref())?;
            decomp.apply_yq(self.fac_v.as_mut())?;
            self.fac_h = decomp.matrix_rq()?;
            {
                let mut h = self.fac_h.as_mut();
                for j in 0..ncv {
                    h[(j, j)] = h[(j, j)] + mu;
                }
            }
            decomp.apply_qt_y(em.as_mut())?;
        }

        // Continuation residual of the compressed factorization.
        let mut fk = Mat::<T>::zeros(self.n, 1);
        {
            let ek = em.as_ref()[(k - 1, 0)];
            let hk = self.fac_h.as_ref()[(k, k - 1)];
            let f = self.fac_f.as_ref();
            let basis = self.fac_v.as_ref();
            let mut out = fk.as_mut();
            for r in 0..self.n {
                out[(r, 0)] = f[(r, 0)] * ek + basis[(r, k)] * hk;
            }
        }
        self.factorize_from(k, ncv, fk.as_ref(), op)?;
        self.retrieve_ritzpair(rule)?;
        Ok(())
    }

    /// Counts the converged wanted Ritz pairs and updates the per-pair flags.
    ///
    /// The residual estimate for the pair (θ, z) is |z[m−1]|·‖f‖, tested
    /// against tol·max(ε^(2/3), |θ|) clamped above by the largest wanted
    /// magnitude.
    pub fn num_converged(&mut self, tol: T) -> usize {
        let fnorm = self.fac_f.norm_l2();
        let mut rv_max = T::zero();
        for i in 0..self.nev {
            rv_max = rv_max.max(self.ritz_val[i].abs());
        }
        let upper = rv_max.max(self.prec);

        let mut nconv = 0;
        let ritz_vec = self.ritz_vec.as_ref();
        for i in 0..self.nev {
            let thresh = tol * self.ritz_val[i].abs().max(self.prec).min(upper);
            let resid = ritz_vec[(self.ncv - 1, i)].abs() * fnorm;
            self.ritz_conv[i] = resid < thresh;
            if self.ritz_conv[i] {
                nconv += 1;
            }
        }
        nconv
    }

    /// The inflated restart size used to resist stagnation, following
    /// ARPACK's dsaup2 adjustment: nev + min(nconv, (ncv − nev)/2), with
    /// special cases for nev = 1.
    pub fn nev_adjusted(&self, nconv: usize) -> usize {
        let mut nev_new = self.nev + nconv.min((self.ncv - self.nev) / 2);
        if self.nev == 1 && self.ncv >= 6 {
            nev_new = self.ncv / 2;
        } else if self.nev == 1 && self.ncv > 2 {
            nev_new = 2;
        }
        nev_new
    }

    /// Computes the eigendecomposition of H and stores its eigenvalues and
    /// the first nev eigenvectors reordered under `rule`.
    ///
    /// For [`SelectionRule::BothEnds`] the sorted values are interleaved
    /// (largest, smallest, 2nd largest, ...) so that the first k entries are
    /// a balanced wanted set for every k ≤ ncv, whether k is the adjusted
    /// restart size or nev itself.
    pub fn retrieve_ritzpair(&mut self, rule: SelectionRule) -> Result<(), EigsError> {
        let ncv = self.ncv;
        let evd = self
            .fac_h
            .as_ref()
            .self_adjoint_eigen(Side::Lower)
            .map_err(|e| EigsError::from(EigsErrorKind::EvdError(e)))?;
        let evals = evd.S();
        let evecs = evd.U();

        let mut pairs: Vec<(T, usize)> = (0..ncv).map(|i| (evals[i], i)).collect();
        pairs.sort_by(|a, b| rule.cmp(a.0, b.0));
        if rule == SelectionRule::BothEnds {
            both_ends_reorder(&mut pairs);
        }

        for i in 0..ncv {
            self.ritz_val[i] = pairs[i].0;
        }
        for i in 0..self.nev {
            self.ritz_vec.col_mut(i).copy_from(evecs.col(pairs[i].1));
        }
        Ok(())
    }
}
