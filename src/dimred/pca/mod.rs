//! # Principal Component Analysis
//!
//! PCA with optional centring on dense or CSR matrices. The factorisation
//! itself is delegated to an [`SvdBackend`]; this module only prepares the
//! matrix and turns singular values into variance statistics.
//!
//! Sparse input restricted to a column mask goes through `single-svdlib`'s
//! `MaskedCSRMatrix` when the randomized solver is used, so neither the
//! centred matrix nor the selected columns are ever densified.

use std::sync::Arc;

use nalgebra_sparse::CsrMatrix;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use single_svdlib::lanczos::masked::MaskedCSRMatrix;

use crate::error::DimRedError;
use crate::sparse::{MatrixDensify, MatrixSum};
use crate::svd::{
    svd_flip, CenteredOperator, CovarianceEigh, FullSvd, RandomizedSvd, SvdBackend, SvdSolver,
    TruncatedSvd,
};

pub struct PcaBuilder<S: SvdBackend> {
    n_components: Option<usize>,
    center: bool,
    svd_implementation: Arc<S>,
}

impl<S: SvdBackend> PcaBuilder<S> {
    pub fn new(svd_implementation: S) -> Self {
        PcaBuilder {
            n_components: None,
            center: true,
            svd_implementation: Arc::new(svd_implementation),
        }
    }

    pub fn n_components(mut self, n_components: usize) -> Self {
        self.n_components = Some(n_components);
        self
    }

    pub fn center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    pub fn build(self) -> Pca<S> {
        Pca {
            n_components: self.n_components,
            center: self.center,
            svd_implementation: self.svd_implementation,
            components: None,
            mean: None,
            explained_variance: None,
            explained_variance_ratio: None,
            total_variance: None,
        }
    }
}

/// PCA model for samples × features matrices.
///
/// After fitting, `components` holds the principal axes (k × n_features) and
/// the variance fields describe how much of the total variance each axis
/// captures. Ratios are relative to the variance of the full matrix, so for a
/// truncated decomposition they sum to at most one.
pub struct Pca<S: SvdBackend> {
    n_components: Option<usize>,
    center: bool,
    svd_implementation: Arc<S>,
    components: Option<Array2<f64>>,
    mean: Option<Array1<f64>>,
    explained_variance: Option<Array1<f64>>,
    explained_variance_ratio: Option<Array1<f64>>,
    total_variance: Option<f64>,
}

impl<S: SvdBackend> Pca<S> {
    /// Fits the model and returns the embedding of `x` (n_samples × k).
    pub fn fit_transform(&mut self, x: ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
        let (n_samples, n_features) = x.dim();
        let n_components = self.n_components.unwrap_or(n_samples.min(n_features));
        validate_shape(n_samples, n_features, n_components)?;
        ensure_finite(x.iter())?;

        let mean = if self.center {
            Some(
                x.mean_axis(Axis(0))
                    .ok_or_else(|| anyhow::anyhow!("Failed to compute column means"))?,
            )
        } else {
            None
        };
        let x_preprocessed = preprocess(x, mean.as_ref());

        let n_minus_1 = (n_samples - 1) as f64;
        let total_variance = x_preprocessed.iter().map(|v| v * v).sum::<f64>() / n_minus_1;

        let mut svd: TruncatedSvd = self
            .svd_implementation
            .compute(x_preprocessed.view(), n_components)?;
        svd_flip(&mut svd)?;

        let (explained_variance, explained_variance_ratio) =
            variance_stats(&svd.s, total_variance, n_samples);

        let embedding = &svd.u * &svd.s;

        self.components = Some(svd.vt);
        self.mean = mean;
        self.explained_variance = Some(explained_variance);
        self.explained_variance_ratio = Some(explained_variance_ratio);
        self.total_variance = Some(total_variance);

        Ok(embedding)
    }

    /// Projects new samples onto the fitted components.
    pub fn transform(&self, x: ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
        let components = self.components.as_ref().ok_or_else(|| {
            DimRedError::InvalidState("PCA has not been fitted yet".to_string())
        })?;
        if x.ncols() != components.ncols() {
            return Err(DimRedError::InvalidParameter(format!(
                "expected {} features, got {}",
                components.ncols(),
                x.ncols()
            ))
            .into());
        }

        let x_preprocessed = preprocess(x, self.mean.as_ref());
        Ok(x_preprocessed.dot(&components.t()))
    }

    pub fn components(&self) -> Option<&Array2<f64>> {
        self.components.as_ref()
    }

    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    pub fn explained_variance(&self) -> Option<&Array1<f64>> {
        self.explained_variance.as_ref()
    }

    pub fn explained_variance_ratio(&self) -> Option<&Array1<f64>> {
        self.explained_variance_ratio.as_ref()
    }

    pub fn total_variance(&self) -> Option<f64> {
        self.total_variance
    }
}

fn validate_shape(n_samples: usize, n_features: usize, n_components: usize) -> anyhow::Result<()> {
    if n_samples < 2 {
        return Err(DimRedError::InvalidParameter(format!(
            "PCA needs at least 2 observations, got {}",
            n_samples
        ))
        .into());
    }
    if n_features == 0 {
        return Err(DimRedError::InvalidParameter(
            "PCA needs at least one feature, got 0".to_string(),
        )
        .into());
    }

    let min_dim = n_samples.min(n_features);
    if n_components == 0 || n_components > min_dim {
        return Err(DimRedError::InvalidParameter(format!(
            "n_components must be between 1 and min(n_samples, n_features) = {}, got {}",
            min_dim, n_components
        ))
        .into());
    }
    Ok(())
}

fn ensure_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> anyhow::Result<()> {
    if values.any(|v| !v.is_finite()) {
        return Err(DimRedError::InvalidParameter(
            "input contains NaN or infinite values".to_string(),
        )
        .into());
    }
    Ok(())
}

/// Per-component variance (ddof = 1) and its share of `total_variance`.
fn variance_stats(
    singular_values: &Array1<f64>,
    total_variance: f64,
    n_samples: usize,
) -> (Array1<f64>, Array1<f64>) {
    let n_minus_1 = (n_samples - 1) as f64;
    let explained_variance = singular_values.mapv(|s| s * s / n_minus_1);
    let explained_variance_ratio = if total_variance > 0.0 {
        explained_variance.mapv(|v| v / total_variance)
    } else {
        Array1::zeros(singular_values.len())
    };
    (explained_variance, explained_variance_ratio)
}

fn preprocess(x: ArrayView2<f64>, mean: Option<&Array1<f64>>) -> Array2<f64> {
    let mut x_preprocessed = x.to_owned();

    if let Some(m) = mean {
        x_preprocessed
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|mut row| {
                row -= m;
            });
    }

    x_preprocessed
}

/// Everything a fitted PCA produces, detached from the backend type.
#[derive(Debug, Clone)]
pub struct PcaResult {
    /// n_samples × k
    pub embedding: Array2<f64>,
    /// k × n_features
    pub components: Array2<f64>,
    pub explained_variance: Array1<f64>,
    pub explained_variance_ratio: Array1<f64>,
    /// Backend that ran, with `auto` resolved.
    pub solver: SvdSolver,
}

/// Runs PCA with the backend named by `solver`.
pub fn run_pca(
    x: ArrayView2<f64>,
    n_components: usize,
    center: bool,
    solver: SvdSolver,
    random_seed: u64,
) -> anyhow::Result<PcaResult> {
    let (n_samples, n_features) = x.dim();
    let solver = solver.resolve(n_samples, n_features, n_components);
    log::debug!(
        "PCA on {} x {} matrix using the `{}` solver",
        n_samples,
        n_features,
        solver
    );

    match solver {
        SvdSolver::Auto | SvdSolver::Full => fit_with(FullSvd, x, n_components, center, solver),
        SvdSolver::CovarianceEigh => fit_with(CovarianceEigh, x, n_components, center, solver),
        SvdSolver::Randomized {
            n_oversamples,
            n_power_iterations,
        } => fit_with(
            RandomizedSvd::new(n_oversamples, n_power_iterations, random_seed),
            x,
            n_components,
            center,
            solver,
        ),
        #[cfg(feature = "faer")]
        SvdSolver::Faer => fit_with(crate::svd::FaerSvd, x, n_components, center, solver),
    }
}

fn fit_with<S: SvdBackend>(
    backend: S,
    x: ArrayView2<f64>,
    n_components: usize,
    center: bool,
    solver: SvdSolver,
) -> anyhow::Result<PcaResult> {
    let mut pca = PcaBuilder::new(backend)
        .n_components(n_components)
        .center(center)
        .build();
    let embedding = pca.fit_transform(x)?;

    match (pca.components, pca.explained_variance, pca.explained_variance_ratio) {
        (Some(components), Some(explained_variance), Some(explained_variance_ratio)) => {
            Ok(PcaResult {
                embedding,
                components,
                explained_variance,
                explained_variance_ratio,
                solver,
            })
        }
        _ => Err(DimRedError::InvalidState("PCA fit did not store its results".to_string()).into()),
    }
}

/// Runs PCA on a CSR matrix, optionally restricted to the columns flagged in
/// `mask`. Components are expressed over the kept columns only.
///
/// The randomized solver factorises the sparse matrix in place; every other
/// solver works on a dense copy of the kept columns.
pub fn run_pca_sparse(
    x: &CsrMatrix<f64>,
    mask: Option<&[bool]>,
    n_components: usize,
    center: bool,
    solver: SvdSolver,
    random_seed: u64,
) -> anyhow::Result<PcaResult> {
    let mask: Vec<bool> = match mask {
        Some(mask) if mask.len() != x.ncols() => {
            return Err(DimRedError::InvalidParameter(format!(
                "mask has {} entries but the matrix has {} columns",
                mask.len(),
                x.ncols()
            ))
            .into());
        }
        Some(mask) => mask.to_vec(),
        None => vec![true; x.ncols()],
    };
    let kept: Vec<usize> = (0..mask.len()).filter(|&j| mask[j]).collect();

    let n_samples = x.nrows();
    validate_shape(n_samples, kept.len(), n_components)?;
    ensure_finite(x.values().iter())?;

    let solver = solver.resolve(n_samples, kept.len(), n_components);
    let SvdSolver::Randomized {
        n_oversamples,
        n_power_iterations,
    } = solver
    else {
        let dense = x.to_dense_all().select(Axis(1), &kept);
        return run_pca(dense.view(), n_components, center, solver, random_seed);
    };

    log::debug!(
        "PCA on sparse {} x {} matrix ({} nonzeros) using the `{}` solver",
        n_samples,
        kept.len(),
        x.nnz(),
        solver
    );

    let col_sums = x.sum_col()?;
    let col_sq_sums = x.sum_col_squared()?;
    let n = n_samples as f64;
    let means: Array1<f64> = kept.iter().map(|&j| col_sums[j] / n).collect();
    let sum_of_squares: f64 = kept
        .iter()
        .zip(means.iter())
        .map(|(&j, &mean)| {
            if center {
                col_sq_sums[j] - mean * col_sums[j]
            } else {
                col_sq_sums[j]
            }
        })
        .sum();
    let total_variance = sum_of_squares / (n - 1.0);

    let backend = RandomizedSvd::new(n_oversamples, n_power_iterations, random_seed);
    let masked = MaskedCSRMatrix::new(x, mask);
    let mut svd = if center {
        backend.compute_operator(&CenteredOperator::new(&masked, means)?, n_components)?
    } else {
        backend.compute_operator(&masked, n_components)?
    };
    svd_flip(&mut svd)?;

    let (explained_variance, explained_variance_ratio) =
        variance_stats(&svd.s, total_variance, n_samples);
    let embedding = &svd.u * &svd.s;

    Ok(PcaResult {
        embedding,
        components: svd.vt,
        explained_variance,
        explained_variance_ratio,
        solver,
    })
}
