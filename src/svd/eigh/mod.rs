use nalgebra::SymmetricEigen;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use nshare::{IntoNalgebra, IntoNdarray2};

use super::full::ITERATIONS_PER_DIMENSION;
use super::{descending_order, SvdBackend, TruncatedSvd};
use crate::error::DimRedError;

/// Singular values below this are treated as zero when recovering the
/// opposite set of singular vectors.
const RANK_TOLERANCE: f64 = 1e-12;

/// SVD through the eigendecomposition of the smaller Gram matrix
/// (`xᵀx` when the matrix is tall, `xxᵀ` when it is wide).
///
/// Cheap when one side is small, at the cost of squaring the condition number.
#[derive(Debug, Clone, Copy, Default)]
pub struct CovarianceEigh;

impl SvdBackend for CovarianceEigh {
    fn compute(&self, x: ArrayView2<f64>, k: usize) -> anyhow::Result<TruncatedSvd> {
        let (n_samples, n_features) = x.dim();
        if k > n_samples.min(n_features) {
            return Err(DimRedError::Decomposition(format!(
                "requested {} components from a {} x {} matrix",
                k, n_samples, n_features
            ))
            .into());
        }

        let tall = n_features <= n_samples;
        let gram = if tall { x.t().dot(&x) } else { x.dot(&x.t()) };

        let (eigenvalues, eigenvectors) = symmetric_eigen(gram)?;
        let order = descending_order(&eigenvalues, k);

        let s: Array1<f64> = order
            .iter()
            .map(|&i| eigenvalues[i].max(0.0).sqrt())
            .collect();
        let vectors = eigenvectors.select(Axis(1), &order);

        let (u, vt) = if tall {
            // vectors are the right singular vectors
            let mut u = x.dot(&vectors);
            scale_columns_by_inverse(&mut u, &s);
            (u, vectors.reversed_axes())
        } else {
            // vectors are the left singular vectors
            let mut v = x.t().dot(&vectors);
            scale_columns_by_inverse(&mut v, &s);
            (vectors, v.reversed_axes())
        };

        Ok(TruncatedSvd { u, s, vt })
    }
}

fn symmetric_eigen(gram: Array2<f64>) -> anyhow::Result<(Array1<f64>, Array2<f64>)> {
    let max_niter = ITERATIONS_PER_DIMENSION * gram.nrows().max(1);
    let matrix = gram.view().into_nalgebra().clone_owned();
    let eigen = SymmetricEigen::try_new(matrix, f64::EPSILON, max_niter).ok_or_else(|| {
        DimRedError::Decomposition(format!(
            "symmetric eigendecomposition did not converge in {} iterations",
            max_niter
        ))
    })?;

    // NaN input slips through the convergence test instead of iterating
    if eigen.eigenvalues.iter().any(|v| !v.is_finite()) {
        return Err(DimRedError::Decomposition(
            "symmetric eigendecomposition produced non-finite eigenvalues".to_string(),
        )
        .into());
    }

    let values = Array1::from(eigen.eigenvalues.as_slice().to_vec());
    Ok((values, eigen.eigenvectors.into_ndarray2()))
}

fn scale_columns_by_inverse(m: &mut Array2<f64>, s: &Array1<f64>) {
    for (mut column, &sigma) in m.axis_iter_mut(Axis(1)).zip(s.iter()) {
        if sigma > RANK_TOLERANCE {
            column.mapv_inplace(|v| v / sigma);
        } else {
            column.fill(0.0);
        }
    }
}
