use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewMut1};
use single_svdlib::randomized::{randomized_svd, PowerIterationNormalizer};
use single_svdlib::SMat;

use super::{SvdBackend, TruncatedSvd};
use crate::error::DimRedError;

/// Randomized truncated SVD (Halko, Martinsson & Tropp) from `single-svdlib`.
///
/// Works on anything implementing [`SMat`], so sparse and column-masked
/// sparse matrices are factorised without densifying them.
#[derive(Debug, Clone, Copy)]
pub struct RandomizedSvd {
    n_oversamples: usize,
    n_power_iterations: usize,
    random_seed: u64,
}

impl RandomizedSvd {
    pub fn new(n_oversamples: usize, n_power_iterations: usize, random_seed: u64) -> Self {
        Self {
            n_oversamples,
            n_power_iterations,
            random_seed,
        }
    }

    /// Leading `k` triplets of `m`.
    pub fn compute_operator<M: SMat<f64>>(&self, m: &M, k: usize) -> anyhow::Result<TruncatedSvd> {
        let (n_samples, n_features) = (m.nrows(), m.ncols());
        if k == 0 || k > n_samples.min(n_features) {
            return Err(DimRedError::Decomposition(format!(
                "requested {} components from a {} x {} matrix",
                k, n_samples, n_features
            ))
            .into());
        }

        // the sketch width k + oversamples must not exceed the smaller side
        let n_oversamples = self.n_oversamples.min(n_samples.min(n_features) - k);

        let res = randomized_svd(
            m,
            k,
            n_oversamples,
            self.n_power_iterations,
            PowerIterationNormalizer::QR,
            false,
            Some(self.random_seed),
        )
        .map_err(|e| DimRedError::Decomposition(format!("randomized SVD failed: {}", e)))?;

        TruncatedSvd::from_unordered(res.u, res.s, res.vt, k)
    }
}

impl Default for RandomizedSvd {
    fn default() -> Self {
        Self::new(10, 4, 42)
    }
}

impl SvdBackend for RandomizedSvd {
    fn compute(&self, x: ArrayView2<f64>, k: usize) -> anyhow::Result<TruncatedSvd> {
        self.compute_operator(&DenseOperator(x), k)
    }
}

/// A dense view exposed through matrix-vector products.
struct DenseOperator<'a>(ArrayView2<'a, f64>);

impl SMat<f64> for DenseOperator<'_> {
    fn nrows(&self) -> usize {
        self.0.nrows()
    }

    fn ncols(&self) -> usize {
        self.0.ncols()
    }

    fn nnz(&self) -> usize {
        self.0.iter().filter(|&&v| v != 0.0).count()
    }

    fn svd_opa(&self, x: &[f64], y: &mut [f64], transposed: bool) {
        let x = ArrayView1::from(x);
        let mut y = ArrayViewMut1::from(y);
        if transposed {
            general_mat_vec_mul(1.0, &self.0.t(), &x, 0.0, &mut y);
        } else {
            general_mat_vec_mul(1.0, &self.0, &x, 0.0, &mut y);
        }
    }
}

/// `m` with the column means `means` subtracted from every row, without
/// materialising the centred matrix.
///
/// The products are `(A - 1μᵀ)x = Ax - (μᵀx)1` and `(A - 1μᵀ)ᵀy = Aᵀy - (1ᵀy)μ`.
pub struct CenteredOperator<'a, M> {
    inner: &'a M,
    means: Array1<f64>,
}

impl<'a, M: SMat<f64>> CenteredOperator<'a, M> {
    pub fn new(inner: &'a M, means: Array1<f64>) -> anyhow::Result<Self> {
        if means.len() != inner.ncols() {
            return Err(DimRedError::Decomposition(format!(
                "{} column means for a matrix with {} columns",
                means.len(),
                inner.ncols()
            ))
            .into());
        }
        Ok(Self { inner, means })
    }
}

impl<M: SMat<f64>> SMat<f64> for CenteredOperator<'_, M> {
    fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    fn svd_opa(&self, x: &[f64], y: &mut [f64], transposed: bool) {
        self.inner.svd_opa(x, y, transposed);
        if transposed {
            let total: f64 = x.iter().sum();
            for (out, &mean) in y.iter_mut().zip(self.means.iter()) {
                *out -= mean * total;
            }
        } else {
            let shift: f64 = self.means.iter().zip(x).map(|(&m, &v)| m * v).sum();
            for out in y.iter_mut() {
                *out -= shift;
            }
        }
    }
}
