use nalgebra::linalg::SVD;
use ndarray::{Array1, ArrayView2};
use nshare::{IntoNalgebra, IntoNdarray2};

use super::{SvdBackend, TruncatedSvd};
use crate::error::DimRedError;

/// QR sweeps allowed per row/column before the factorisation is given up.
/// NaN or infinite entries never converge.
pub(crate) const ITERATIONS_PER_DIMENSION: usize = 100;

/// Dense SVD of the whole matrix through `nalgebra`, truncated afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullSvd;

impl SvdBackend for FullSvd {
    fn compute(&self, x: ArrayView2<f64>, k: usize) -> anyhow::Result<TruncatedSvd> {
        let matrix = x.into_nalgebra().clone_owned();
        let max_niter = ITERATIONS_PER_DIMENSION * x.nrows().max(x.ncols()).max(1);

        let svd = SVD::try_new(matrix, true, true, f64::EPSILON, max_niter).ok_or_else(|| {
            DimRedError::Decomposition(format!("SVD did not converge in {} iterations", max_niter))
        })?;

        let u = svd
            .u
            .ok_or_else(|| DimRedError::Decomposition("SVD returned no left vectors".to_string()))?;
        let vt = svd
            .v_t
            .ok_or_else(|| DimRedError::Decomposition("SVD returned no right vectors".to_string()))?;
        let s = Array1::from(svd.singular_values.as_slice().to_vec());

        TruncatedSvd::from_unordered(u.into_ndarray2(), s, vt.into_ndarray2(), k)
    }
}
