//! # Truncated SVD backends
//!
//! PCA never factorises a matrix itself; it hands the centred expression matrix
//! to one of the backends below. Every backend returns the leading `k`
//! singular triplets sorted by decreasing singular value.
//!
//! - [`FullSvd`]: dense SVD from `nalgebra`
//! - [`CovarianceEigh`]: symmetric eigendecomposition of the smaller Gram matrix
//! - [`RandomizedSvd`]: seeded randomized SVD from `single-svdlib`, also on sparse
//!   and column-masked sparse operators
//! - `FaerSvd` (feature `faer`): thin SVD from `faer`

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView2, Axis};
use nshare::{IntoNalgebra, IntoNdarray2};
use single_svdlib::randomized as svdlib;

use crate::error::DimRedError;

mod eigh;
#[cfg(feature = "faer")]
mod faer;
mod full;
mod randomized;

pub use eigh::CovarianceEigh;
#[cfg(feature = "faer")]
pub use faer::FaerSvd;
pub use full::FullSvd;
pub use randomized::{CenteredOperator, RandomizedSvd};

/// A backend able to compute the `k` leading singular triplets of a dense matrix.
pub trait SvdBackend: Send + Sync {
    fn compute(&self, x: ArrayView2<f64>, k: usize) -> anyhow::Result<TruncatedSvd>;
}

/// `x ≈ u · diag(s) · vt` restricted to `k` components.
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    /// n_samples × k
    pub u: Array2<f64>,
    /// k singular values, non-increasing
    pub s: Array1<f64>,
    /// k × n_features
    pub vt: Array2<f64>,
}

impl TruncatedSvd {
    /// Orders the triplets by decreasing singular value and keeps the first `k`.
    pub(crate) fn from_unordered(
        u: Array2<f64>,
        s: Array1<f64>,
        vt: Array2<f64>,
        k: usize,
    ) -> anyhow::Result<Self> {
        if k > s.len() {
            return Err(DimRedError::Decomposition(format!(
                "requested {} components but the factorisation only produced {}",
                k,
                s.len()
            ))
            .into());
        }

        let order = descending_order(&s, k);
        Ok(Self {
            u: u.select(Axis(1), &order),
            s: order.iter().map(|&i| s[i]).collect(),
            vt: vt.select(Axis(0), &order),
        })
    }
}

/// Indices of the `k` largest values, largest first.
pub(crate) fn descending_order(values: &Array1<f64>, k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order.truncate(k);
    order
}

/// Makes the output deterministic: in every row of `vt` the entry with the
/// largest absolute value becomes positive, and the matching column of `u` is
/// flipped with it.
pub fn svd_flip(svd: &mut TruncatedSvd) -> anyhow::Result<()> {
    let mut u = svd.u.view().into_nalgebra().clone_owned();
    let mut vt = svd.vt.view().into_nalgebra().clone_owned();
    svdlib::svd_flip(Some(&mut u), Some(&mut vt), false)?;
    svd.u = u.into_ndarray2();
    svd.vt = vt.into_ndarray2();
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SvdSolver {
    /// Picks one of the other solvers from the matrix shape.
    Auto,
    Full,
    CovarianceEigh,
    Randomized {
        n_oversamples: usize,
        n_power_iterations: usize,
    },
    #[cfg(feature = "faer")]
    Faer,
}

impl Default for SvdSolver {
    fn default() -> Self {
        Self::Auto
    }
}

impl SvdSolver {
    pub fn randomized() -> Self {
        Self::Randomized {
            n_oversamples: 10,
            n_power_iterations: 4,
        }
    }

    /// Resolves [`SvdSolver::Auto`] for an `n_samples × n_features` matrix and
    /// `k` requested components. Other variants are returned unchanged.
    pub fn resolve(self, n_samples: usize, n_features: usize, k: usize) -> Self {
        if self != Self::Auto {
            return self;
        }

        let min_dim = n_samples.min(n_features);
        if n_features <= 1_000 && n_samples >= 10 * n_features {
            Self::CovarianceEigh
        } else if n_samples.max(n_features) <= 500 || (k as f64) >= 0.8 * min_dim as f64 {
            Self::Full
        } else {
            Self::randomized()
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Full => "full",
            Self::CovarianceEigh => "covariance_eigh",
            Self::Randomized { .. } => "randomized",
            #[cfg(feature = "faer")]
            Self::Faer => "faer",
        }
    }
}

impl fmt::Display for SvdSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SvdSolver {
    type Err = DimRedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "full" | "lapack" => Ok(Self::Full),
            "covariance_eigh" => Ok(Self::CovarianceEigh),
            "randomized" => Ok(Self::randomized()),
            #[cfg(feature = "faer")]
            "faer" => Ok(Self::Faer),
            other => Err(DimRedError::InvalidParameter(format!(
                "unknown svd solver `{}`",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_unordered_sorts_and_truncates() {
        let u = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let s = array![1.0, 3.0, 2.0];
        let vt = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

        let svd = TruncatedSvd::from_unordered(u, s, vt, 2).unwrap();
        assert_eq!(svd.s, array![3.0, 2.0]);
        assert_eq!(svd.u.column(0), array![0.0, 1.0, 0.0]);
        assert_eq!(svd.vt.row(1), array![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_from_unordered_rejects_too_many_components() {
        let svd = TruncatedSvd::from_unordered(
            Array2::eye(2),
            array![1.0, 0.5],
            Array2::eye(2),
            3,
        );
        assert!(svd.is_err());
    }

    #[test]
    fn test_svd_flip_makes_dominant_loading_positive() {
        let mut svd = TruncatedSvd {
            u: array![[0.1, 0.6], [-0.9, 0.2]],
            s: array![2.0, 1.0],
            vt: array![[0.2, -0.8], [0.5, 0.4]],
        };
        svd_flip(&mut svd).unwrap();

        assert_eq!(svd.vt.row(0), array![-0.2, 0.8]);
        assert_eq!(svd.u.column(0), array![-0.1, 0.9]);
        // second component already positive
        assert_eq!(svd.vt.row(1), array![0.5, 0.4]);
        assert_eq!(svd.u.column(1), array![0.6, 0.2]);
    }

    #[test]
    fn test_solver_parsing() {
        assert_eq!("auto".parse::<SvdSolver>().unwrap(), SvdSolver::Auto);
        assert_eq!("LAPACK".parse::<SvdSolver>().unwrap(), SvdSolver::Full);
        assert_eq!(
            "covariance_eigh".parse::<SvdSolver>().unwrap(),
            SvdSolver::CovarianceEigh
        );
        assert_eq!(
            "randomized".parse::<SvdSolver>().unwrap(),
            SvdSolver::randomized()
        );

        let err = "arpack".parse::<SvdSolver>().unwrap_err();
        assert!(matches!(err, DimRedError::InvalidParameter(_)));
    }

    #[test]
    fn test_auto_resolution() {
        // tall and narrow
        assert_eq!(SvdSolver::Auto.resolve(5_000, 100, 10), SvdSolver::CovarianceEigh);
        // small
        assert_eq!(SvdSolver::Auto.resolve(100, 500, 10), SvdSolver::Full);
        // most of the spectrum requested
        assert_eq!(SvdSolver::Auto.resolve(2_000, 1_500, 1_400), SvdSolver::Full);
        // large, few components
        assert_eq!(SvdSolver::Auto.resolve(2_000, 3_000, 20), SvdSolver::randomized());
        // explicit choices are kept
        assert_eq!(SvdSolver::Full.resolve(5_000, 100, 10), SvdSolver::Full);
    }
}
