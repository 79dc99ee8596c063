use faer_ext::*;
use ndarray::{Array1, ArrayView2};

use super::{SvdBackend, TruncatedSvd};

/// Thin SVD computed by `faer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaerSvd;

impl SvdBackend for FaerSvd {
    fn compute(&self, x: ArrayView2<f64>, k: usize) -> anyhow::Result<TruncatedSvd> {
        let faer_mat = x.into_faer();
        let svd = faer_mat.thin_svd();
        let u = svd.u().into_ndarray().to_owned();
        let s: Array1<f64> = Array1::from_iter(svd.s_diagonal().iter().cloned());
        let vt = svd.v().into_ndarray().t().to_owned();

        TruncatedSvd::from_unordered(u, s, vt, k)
    }
}
