//! Givens-rotation QR decompositions of upper Hessenberg matrices.
//!
//! An upper Hessenberg matrix T of order p is reduced to upper triangular
//! form by p − 1 plane rotations, each chosen to zero one subdiagonal entry:
//!
//! Gᵀ_{p−1} · … · Gᵀ_1 · T = R,  so that  T = Q·R  with  Q = G_1 · … · G_{p−1}.
//!
//! Q is never materialized. It is kept as the (cos, sin) parameters of the
//! rotations, and the operations the restarted eigensolver needs are exposed
//! directly on that representation:
//!
//! - [`UpperHessenbergQR::matrix_rq`] returns R·Q, which is again upper
//!   Hessenberg. One step of the shifted QR iteration is
//!   H − μI = QR, H ← RQ + μI.
//! - [`UpperHessenbergQR::apply_yq`] overwrites an external n × p matrix Y
//!   with Y·Q, used to rotate the Lanczos basis.
//! - [`UpperHessenbergQR::apply_qt_y`] overwrites a length-p column y with
//!   Qᵀ·y, used to track the restart sentinel vector.
//!
//! [`TridiagQR`] specializes `compute` and `matrix_rq` for symmetric
//! tridiagonal input, where each rotation touches at most three columns and
//! R·Q is again symmetric tridiagonal.

use crate::error::{EigsError, EigsErrorKind};
use faer::{Mat, MatMut, MatRef, traits::RealField};
use num_traits::Float;

/// Computes the Givens pair (c, s) such that
///
/// ```text
/// [ c  -s ] [ a ]   [ r ]
/// [ s   c ] [ b ] = [ 0 ]
/// ```
///
/// The quotient is formed with the larger of |a|, |b| as the denominator so
/// that neither the ratio nor its square can overflow. Returns `None` when
/// both elements are below machine epsilon and no meaningful rotation exists.
fn givens_pair<T: Float>(a: T, b: T) -> Option<(T, T)> {
    if a.abs() < T::epsilon() && b.abs() < T::epsilon() {
        return None;
    }
    // r carries the sign of the dominant element; c = a/r, s = -b/r.
    if a.abs() >= b.abs() {
        let t = b / a;
        let c = (T::one() + t * t).sqrt().recip();
        Some((c, -t * c))
    } else {
        let t = a / b;
        let s = -(T::one() + t * t).sqrt().recip();
        Some((-t * s, s))
    }
}

/// QR decomposition of an upper Hessenberg matrix by Givens rotations.
///
/// The object is reusable: `compute` may be called repeatedly with matrices
/// of any order, and the working storage is resized as needed. Queries before
/// the first successful `compute` fail with `NotComputed`.
pub struct UpperHessenbergQR<T> {
    n: usize,
    // Overwritten with R during compute.
    mat_t: Mat<T>,
    // Gi = [ cos[i]  sin[i]]
    //      [-sin[i]  cos[i]]
    // Q = G1 * G2 * ... * G_{n-1}
    rot_cos: Vec<T>,
    rot_sin: Vec<T>,
    computed: bool,
}

impl<T: RealField + Float> UpperHessenbergQR<T> {
    /// Creates an empty decomposition object. Computation is performed later
    /// by calling [`Self::compute`].
    pub fn new() -> Self {
        Self {
            n: 0,
            mat_t: Mat::zeros(0, 0),
            rot_cos: Vec::new(),
            rot_sin: Vec::new(),
            computed: false,
        }
    }

    /// Conducts the QR factorization of the upper Hessenberg matrix `mat`.
    ///
    /// Entries below the first subdiagonal of `mat` are ignored: the
    /// factorization only reads the upper Hessenberg part.
    ///
    /// # Errors
    ///
    /// Fails with a degenerate-rotation error when a pivot pair
    /// (T[i,i], T[i+1,i]) is entirely below machine epsilon.
    pub fn compute(&mut self, mat: MatRef<'_, T>) -> Result<(), EigsError> {
        let n = mat.nrows();
        assert_eq!(n, mat.ncols(), "QR input must be square, got {} x {}.", n, mat.ncols());

        self.n = n;
        self.mat_t = mat.to_owned();
        self.rot_cos.clear();
        self.rot_cos.resize(n.saturating_sub(1), T::zero());
        self.rot_sin.clear();
        self.rot_sin.resize(n.saturating_sub(1), T::zero());
        self.computed = false;

        for i in 0..n.saturating_sub(1) {
            let xi = self.mat_t.as_ref()[(i, i)];
            let xj = self.mat_t.as_ref()[(i + 1, i)];
            let (c, s) =
                givens_pair(xi, xj).ok_or(EigsErrorKind::SingularRotation { step: i })?;
            self.rot_cos[i] = c;
            self.rot_sin[i] = s;

            // T <- Gi' * T, acting on rows i and i+1. Columns before i are
            // already zero below the diagonal.
            let mut t = self.mat_t.as_mut();
            for j in i..n {
                let ti = t[(i, j)];
                let tj = t[(i + 1, j)];
                t[(i, j)] = c * ti - s * tj;
                t[(i + 1, j)] = s * ti + c * tj;
            }
            // The rotation is constructed to annihilate this entry.
            t[(i + 1, i)] = T::zero();
        }

        self.computed = true;
        Ok(())
    }

    /// Returns the order of the decomposed matrix.
    pub fn order(&self) -> usize {
        self.n
    }

    /// Returns the product R·Q, which is again upper Hessenberg.
    pub fn matrix_rq(&self) -> Result<Mat<T>, EigsError> {
        if !self.computed {
            return Err(EigsErrorKind::NotComputed.into());
        }
        let n = self.n;
        let mut rq = self.mat_t.to_owned();
        for i in 0..n.saturating_sub(1) {
            let c = self.rot_cos[i];
            let s = self.rot_sin[i];
            // R is upper triangular: rows past i+1 are zero in columns i, i+1.
            let mut m = rq.as_mut();
            for r in 0..=(i + 1) {
                let yi = m[(r, i)];
                let yj = m[(r, i + 1)];
                m[(r, i)] = c * yi - s * yj;
                m[(r, i + 1)] = s * yi + c * yj;
            }
        }
        Ok(rq)
    }

    /// Overwrites `y` with Y·Q, applying the rotations column pair by column
    /// pair. Q is never formed.
    pub fn apply_yq(&self, mut y: MatMut<'_, T>) -> Result<(), EigsError> {
        if !self.computed {
            return Err(EigsErrorKind::NotComputed.into());
        }
        assert_eq!(
            y.ncols(),
            self.n,
            "apply_yq: Y has {} columns but Q has order {}.",
            y.ncols(),
            self.n,
        );
        let nrow = y.nrows();
        for i in 0..self.n.saturating_sub(1) {
            let c = self.rot_cos[i];
            let s = self.rot_sin[i];
            for r in 0..nrow {
                let yi = y[(r, i)];
                let yj = y[(r, i + 1)];
                y[(r, i)] = c * yi - s * yj;
                y[(r, i + 1)] = s * yi + c * yj;
            }
        }
        Ok(())
    }

    /// Overwrites the length-p column `y` with Qᵀ·y.
    pub fn apply_qt_y(&self, mut y: MatMut<'_, T>) -> Result<(), EigsError> {
        if !self.computed {
            return Err(EigsErrorKind::NotComputed.into());
        }
        assert_eq!(
            (y.nrows(), y.ncols()),
            (self.n, 1),
            "apply_qt_y: y must be {} x 1, got {} x {}.",
            self.n,
            y.nrows(),
            y.ncols(),
        );
        // Q' = G_{n-1}' * ... * G_1', applied to y from G_1' outward.
        for i in 0..self.n.saturating_sub(1) {
            let c = self.rot_cos[i];
            let s = self.rot_sin[i];
            let yi = y[(i, 0)];
            let yj = y[(i + 1, 0)];
            y[(i, 0)] = c * yi - s * yj;
            y[(i + 1, 0)] = s * yi + c * yj;
        }
        Ok(())
    }
}

impl<T: RealField + Float> Default for UpperHessenbergQR<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// QR decomposition of a symmetric tridiagonal matrix, a special case of
/// upper Hessenberg matrices.
///
/// `compute` reads only the three diagonals of the input and performs O(p)
/// work; `matrix_rq` updates only the tridiagonal band of the result. The
/// `apply_yq` and `apply_qt_y` operations are inherited unchanged.
pub struct TridiagQR<T> {
    qr: UpperHessenbergQR<T>,
}

impl<T: RealField + Float> TridiagQR<T> {
    /// Creates an empty decomposition object. Computation is performed later
    /// by calling [`Self::compute`].
    pub fn new() -> Self {
        Self {
            qr: UpperHessenbergQR::new(),
        }
    }

    /// Conducts the QR factorization of the tridiagonal matrix `mat`.
    ///
    /// Only the main diagonal, the subdiagonal and the superdiagonal of `mat`
    /// are read; everything else is assumed zero.
    pub fn compute(&mut self, mat: MatRef<'_, T>) -> Result<(), EigsError> {
        let n = mat.nrows();
        assert_eq!(n, mat.ncols(), "QR input must be square, got {} x {}.", n, mat.ncols());

        let qr = &mut self.qr;
        qr.n = n;
        qr.mat_t = Mat::zeros(n, n);
        qr.rot_cos.clear();
        qr.rot_cos.resize(n.saturating_sub(1), T::zero());
        qr.rot_sin.clear();
        qr.rot_sin.resize(n.saturating_sub(1), T::zero());
        qr.computed = false;

        {
            let mut t = qr.mat_t.as_mut();
            for i in 0..n {
                t[(i, i)] = mat[(i, i)];
            }
            for i in 0..n.saturating_sub(1) {
                t[(i, i + 1)] = mat[(i, i + 1)];
                t[(i + 1, i)] = mat[(i + 1, i)];
            }
        }

        for i in 0..n.saturating_sub(1) {
            let mut t = qr.mat_t.as_mut();
            let xi = t[(i, i)];
            let xj = t[(i + 1, i)];
            let (c, s) =
                givens_pair(xi, xj).ok_or(EigsErrorKind::SingularRotation { step: i })?;
            qr.rot_cos[i] = c;
            qr.rot_sin[i] = s;

            // Rows i and i+1 of a tridiagonal matrix reach no further than
            // column i+2, so the rotation touches three columns at most.
            t[(i, i)] = c * xi - s * xj;
            t[(i + 1, i)] = T::zero();

            let ti = t[(i, i + 1)];
            let tj = t[(i + 1, i + 1)];
            t[(i, i + 1)] = c * ti - s * tj;
            t[(i + 1, i + 1)] = s * ti + c * tj;

            if i + 2 < n {
                // Row i is still zero at column i+2 here; the rotation fills
                // in the second superdiagonal of R.
                let tj2 = t[(i + 1, i + 2)];
                t[(i, i + 2)] = -s * tj2;
                t[(i + 1, i + 2)] = c * tj2;
            }
        }

        qr.computed = true;
        Ok(())
    }

    /// Returns the order of the decomposed matrix.
    pub fn order(&self) -> usize {
        self.qr.order()
    }

    /// Returns the product R·Q, which is again symmetric tridiagonal.
    ///
    /// Only the band is computed. Each rotation updates the 2 × 2 block on
    /// the diagonal, and the superdiagonal is recovered from the subdiagonal
    /// by symmetry at the end.
    pub fn matrix_rq(&self) -> Result<Mat<T>, EigsError> {
        if !self.qr.computed {
            return Err(EigsErrorKind::NotComputed.into());
        }
        let n = self.qr.n;
        let mut rq = Mat::<T>::zeros(n, n);
        {
            let t = self.qr.mat_t.as_ref();
            let mut m = rq.as_mut();
            for i in 0..n {
                m[(i, i)] = t[(i, i)];
            }
            for i in 0..n.saturating_sub(1) {
                m[(i, i + 1)] = t[(i, i + 1)];
            }
        }
        {
            let mut m = rq.as_mut();
            for i in 0..n.saturating_sub(1) {
                let c = self.qr.rot_cos[i];
                let s = self.qr.rot_sin[i];
                let m11 = m[(i, i)];
                let m12 = m[(i, i + 1)];
                let m22 = m[(i + 1, i + 1)];
                m[(i, i)] = c * m11 - s * m12;
                m[(i + 1, i)] = -s * m22;
                m[(i + 1, i + 1)] = c * m22;
            }
            // The product is symmetric; mirror the subdiagonal back up.
            for i in 0..n.saturating_sub(1) {
                m[(i, i + 1)] = m[(i + 1, i)];
            }
        }
        Ok(rq)
    }

    /// Overwrites `y` with Y·Q. See [`UpperHessenbergQR::apply_yq`].
    pub fn apply_yq(&self, y: MatMut<'_, T>) -> Result<(), EigsError> {
        self.qr.apply_yq(y)
    }

    /// Overwrites the length-p column `y` with Qᵀ·y.
    /// See [`UpperHessenbergQR::apply_qt_y`].
    pub fn apply_qt_y(&self, y: MatMut<'_, T>) -> Result<(), EigsError> {
        self.qr.apply_qt_y(y)
    }
}

impl<T: RealField + Float> Default for TridiagQR<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn max_abs_diff(a: faer::MatRef<'_, f64>, b: faer::MatRef<'_, f64>) -> f64 {
        let mut m: f64 = 0.0;
        for i in 0..a.nrows() {
            for j in 0..a.ncols() {
                m = m.max((a[(i, j)] - b[(i, j)]).abs());
            }
        }
        m
    }

    fn identity(n: usize) -> Mat<f64> {
        Mat::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 })
    }

    /// A reproducible random upper Hessenberg matrix with entries in
    /// [-0.5, 0.5], nudged away from degenerate pivots.
    fn random_hessenberg(n: usize, seed: u64) -> Mat<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Mat::from_fn(n, n, |i, j| {
            if i > j + 1 {
                0.0
            } else {
                rng.random::<f64>() - 0.5
            }
        })
    }

    fn random_sym_tridiag(n: usize, seed: u64) -> Mat<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let diag: Vec<f64> = (0..n).map(|_| rng.random::<f64>() + 1.0).collect();
        let off: Vec<f64> = (0..n - 1).map(|_| rng.random::<f64>() + 0.5).collect();
        Mat::from_fn(n, n, |i, j| {
            if i == j {
                diag[i]
            } else if i + 1 == j {
                off[i]
            } else if j + 1 == i {
                off[j]
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_hessenberg_qr_reconstruction() {
        let n = 8;
        let t = random_hessenberg(n, 11);
        let mut decomp = UpperHessenbergQR::new();
        decomp.compute(t.as_ref()).unwrap();

        // Materialize Q by rotating the identity: Q = I * Q.
        let mut q = identity(n);
        decomp.apply_yq(q.as_mut()).unwrap();

        // Q must be orthogonal.
        let qtq = q.as_ref().transpose() * q.as_ref();
        assert!(max_abs_diff(qtq.as_ref(), identity(n).as_ref()) < 1e-13);

        // R must be upper triangular.
        let r = decomp.mat_t.as_ref();
        for i in 0..n {
            for j in 0..i {
                assert!(r[(i, j)].abs() < 1e-14, "R({i}, {j}) = {}", r[(i, j)]);
            }
        }

        // Q * R must reproduce T.
        let qr = &q * &decomp.mat_t;
        assert!(max_abs_diff(qr.as_ref(), t.as_ref()) < 1e-13);
    }

    #[test]
    fn test_hessenberg_rq_stays_hessenberg() {
        let n = 8;
        let t = random_hessenberg(n, 23);
        let mut decomp = UpperHessenbergQR::new();
        decomp.compute(t.as_ref()).unwrap();

        let rq = decomp.matrix_rq().unwrap();
        for i in 0..n {
            for j in 0..n {
                if i > j + 1 {
                    assert!(rq.as_ref()[(i, j)].abs() < 1e-13);
                }
            }
        }

        // R * Q computed densely must agree with the rotation-based product.
        let mut q = identity(n);
        decomp.apply_yq(q.as_mut()).unwrap();
        let dense_rq = &decomp.mat_t * &q;
        assert!(max_abs_diff(rq.as_ref(), dense_rq.as_ref()) < 1e-13);
    }

    #[test]
    fn test_rq_is_similarity_transform() {
        // RQ = Q' * T * Q when T = QR.
        let n = 6;
        let t = random_hessenberg(n, 37);
        let mut decomp = UpperHessenbergQR::new();
        decomp.compute(t.as_ref()).unwrap();

        let mut q = identity(n);
        decomp.apply_yq(q.as_mut()).unwrap();

        let rq = decomp.matrix_rq().unwrap();
        let similar = q.as_ref().transpose() * &t * q.as_ref();
        assert!(max_abs_diff(rq.as_ref(), similar.as_ref()) < 1e-13);
    }

    #[test]
    fn test_apply_qt_y_matches_dense_product() {
        let n = 8;
        let t = random_hessenberg(n, 5);
        let mut decomp = UpperHessenbergQR::new();
        decomp.compute(t.as_ref()).unwrap();

        let mut q = identity(n);
        decomp.apply_yq(q.as_mut()).unwrap();

        let mut rng = StdRng::seed_from_u64(99);
        let y = Mat::from_fn(n, 1, |_, _| rng.random::<f64>() - 0.5);
        let expected = q.as_ref().transpose() * y.as_ref();

        let mut rotated = y.clone();
        decomp.apply_qt_y(rotated.as_mut()).unwrap();
        assert!(max_abs_diff(rotated.as_ref(), expected.as_ref()) < 1e-13);
    }

    #[test]
    fn test_tridiag_matches_general_path() {
        let n = 9;
        let t = random_sym_tridiag(n, 41);

        let mut general = UpperHessenbergQR::new();
        general.compute(t.as_ref()).unwrap();
        let mut banded = TridiagQR::new();
        banded.compute(t.as_ref()).unwrap();

        // Identical rotations, identical R.
        assert!(max_abs_diff(banded.qr.mat_t.as_ref(), general.mat_t.as_ref()) < 1e-13);

        // The banded RQ agrees with the general one on the band; off the band
        // the general product only carries roundoff.
        let rq_general = general.matrix_rq().unwrap();
        let rq_banded = banded.matrix_rq().unwrap();
        for i in 0..n {
            for j in 0..n {
                let g = rq_general.as_ref()[(i, j)];
                let b = rq_banded.as_ref()[(i, j)];
                if i.abs_diff(j) <= 1 {
                    assert!((g - b).abs() < 1e-12, "band mismatch at ({i}, {j})");
                } else {
                    assert!(b == 0.0);
                    assert!(g.abs() < 1e-13);
                }
            }
        }
    }

    #[test]
    fn test_tridiag_apply_yq_rotates_basis() {
        let n = 7;
        let t = random_sym_tridiag(n, 53);
        let mut decomp = TridiagQR::new();
        decomp.compute(t.as_ref()).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let y = Mat::from_fn(12, n, |_, _| rng.random::<f64>() - 0.5);

        let mut q = identity(n);
        decomp.apply_yq(q.as_mut()).unwrap();
        let expected = &y * &q;

        let mut rotated = y.clone();
        decomp.apply_yq(rotated.as_mut()).unwrap();
        assert!(max_abs_diff(rotated.as_ref(), expected.as_ref()) < 1e-13);
    }

    #[test]
    fn test_queries_before_compute_fail() {
        let decomp = UpperHessenbergQR::<f64>::new();
        assert!(decomp.matrix_rq().is_err());
        let mut y = Mat::<f64>::zeros(4, 0);
        assert!(decomp.apply_yq(y.as_mut()).is_err());

        let banded = TridiagQR::<f64>::new();
        assert!(banded.matrix_rq().is_err());
    }

    #[test]
    fn test_degenerate_pivot_is_an_error() {
        let t = Mat::<f64>::zeros(4, 4);
        let mut decomp = UpperHessenbergQR::new();
        assert!(decomp.compute(t.as_ref()).is_err());
        let mut banded = TridiagQR::new();
        assert!(banded.compute(t.as_ref()).is_err());
    }
}
