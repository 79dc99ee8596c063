//! # UMAP
//!
//! Uniform Manifold Approximation and Projection through the `umap-rs` crate.
//!
//! `umap-rs` takes precomputed neighbours and a starting layout. Neighbours
//! are found exactly with Euclidean distances, every point being its own first
//! neighbour at distance 0. The starting layout is drawn uniformly from
//! `[-10, 10]` with a seeded generator. The SGD stage inside `umap-rs` draws
//! its negative samples from an unseeded generator, so repeated runs with the
//! same `random_state` start identically but do not end identically.

use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use umap_rs::{GraphParams, ManifoldParams, OptimizationParams, Umap};

use crate::error::DimRedError;

#[derive(Debug, Clone, PartialEq)]
pub struct UmapConfig {
    pub n_components: usize,
    /// Size of the local neighbourhood, the point itself included.
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    /// `None` picks 500 epochs up to 10 000 observations, 200 above.
    pub n_epochs: Option<usize>,
    pub learning_rate: f64,
    pub negative_sample_rate: usize,
    /// Seed of the starting layout.
    pub random_state: u64,
}

impl Default for UmapConfig {
    fn default() -> Self {
        Self {
            n_components: 2,
            n_neighbors: 15,
            min_dist: 0.5,
            spread: 1.0,
            n_epochs: None,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            random_state: 0,
        }
    }
}

impl UmapConfig {
    /// Rejects settings `umap-rs` would panic on for `n_obs` observations.
    pub fn validate(&self, n_obs: usize) -> anyhow::Result<()> {
        let invalid =
            |msg: String| -> anyhow::Result<()> { Err(DimRedError::InvalidParameter(msg).into()) };

        if self.n_components == 0 {
            return invalid("UMAP n_components must be positive".to_string());
        }
        if self.n_neighbors < 2 {
            return invalid(format!("UMAP n_neighbors must be >= 2, got {}", self.n_neighbors));
        }
        if n_obs <= self.n_neighbors {
            return invalid(format!(
                "UMAP needs more observations ({}) than n_neighbors ({})",
                n_obs, self.n_neighbors
            ));
        }
        if u32::try_from(n_obs).is_err() {
            return invalid(format!("UMAP supports at most {} observations", u32::MAX));
        }
        if !(self.spread.is_finite() && self.spread > 0.0) {
            return invalid(format!("UMAP spread must be positive, got {}", self.spread));
        }
        if !(self.min_dist >= 0.0 && self.min_dist <= self.spread) {
            return invalid(format!(
                "UMAP min_dist must be in [0, spread = {}], got {}",
                self.spread, self.min_dist
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!(
                "UMAP learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        if self.n_epochs == Some(0) {
            return invalid("UMAP n_epochs must be positive".to_string());
        }
        Ok(())
    }

    fn to_umap_rs(&self) -> umap_rs::UmapConfig {
        umap_rs::UmapConfig {
            n_components: self.n_components,
            manifold: ManifoldParams {
                min_dist: self.min_dist as f32,
                spread: self.spread as f32,
                ..ManifoldParams::default()
            },
            graph: GraphParams {
                n_neighbors: self.n_neighbors,
                ..GraphParams::default()
            },
            optimization: OptimizationParams {
                n_epochs: self.n_epochs,
                learning_rate: self.learning_rate as f32,
                negative_sample_rate: self.negative_sample_rate,
                ..OptimizationParams::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct UmapEmbedding {
    /// n_obs × n_components
    pub embedding: Array2<f64>,
    /// Curve parameters of the low-dimensional similarity `1 / (1 + a·d^(2b))`.
    pub a: f64,
    pub b: f64,
}

/// Embeds the rows of `x` into `config.n_components` dimensions.
pub fn run_f64(x: ArrayView2<f64>, config: &UmapConfig) -> anyhow::Result<UmapEmbedding> {
    let (n_obs, n_dim) = x.dim();
    config.validate(n_obs)?;
    if n_dim == 0 {
        return Err(
            DimRedError::InvalidParameter("UMAP input has no dimensions".to_string()).into(),
        );
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(DimRedError::InvalidParameter(
            "UMAP input contains NaN or infinite values".to_string(),
        )
        .into());
    }

    let k = config.n_neighbors;
    let (knn_indices, knn_dists) = exact_knn(x, k);
    let init = random_init(n_obs, config.n_components, config.random_state);

    // umap-rs works in f32 on its own ndarray release
    let data = umap_ndarray::Array2::from_shape_vec(
        (n_obs, n_dim),
        x.iter().map(|&v| v as f32).collect(),
    )?;
    let knn_indices = umap_ndarray::Array2::from_shape_vec((n_obs, k), knn_indices)?;
    let knn_dists = umap_ndarray::Array2::from_shape_vec((n_obs, k), knn_dists)?;
    let init = umap_ndarray::Array2::from_shape_vec(
        (n_obs, config.n_components),
        init.iter().map(|&v| v as f32).collect(),
    )?;

    log::debug!(
        "UMAP on {} x {} input with {} neighbours",
        n_obs,
        n_dim,
        k
    );
    let fitted = Umap::new(config.to_umap_rs()).fit(
        data.view(),
        knn_indices.view(),
        knn_dists.view(),
        init.view(),
    );

    let (a, b) = fitted.manifold().curve_params();
    let raw = fitted.into_embedding();
    let embedding = Array2::from_shape_vec(
        (n_obs, config.n_components),
        raw.iter().map(|&v| f64::from(v)).collect(),
    )?;

    let disconnected = embedding
        .rows()
        .into_iter()
        .filter(|row| row.iter().any(|v| v.is_nan()))
        .count();
    if disconnected > 0 {
        log::warn!(
            "{} observations have no neighbour edges left; their UMAP coordinates are NaN",
            disconnected
        );
    }

    Ok(UmapEmbedding {
        embedding,
        a: f64::from(a),
        b: f64::from(b),
    })
}

/// The `k` nearest rows of every row (itself first), as flat row-major
/// index and distance buffers.
fn exact_knn(x: ArrayView2<f64>, k: usize) -> (Vec<u32>, Vec<f32>) {
    let neighbours: Vec<Vec<(f64, usize)>> = (0..x.nrows())
        .into_par_iter()
        .map(|i| {
            let point = x.row(i);
            let mut distances: Vec<(f64, usize)> = x
                .rows()
                .into_iter()
                .enumerate()
                .map(|(j, other)| {
                    let d2: f64 = point
                        .iter()
                        .zip(other.iter())
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum();
                    (d2, j)
                })
                .collect();

            // duplicates tie at 0; the point itself still comes first
            let by_distance = |a: &(f64, usize), b: &(f64, usize)| {
                a.0.total_cmp(&b.0)
                    .then((a.1 != i).cmp(&(b.1 != i)))
                    .then(a.1.cmp(&b.1))
            };
            distances.select_nth_unstable_by(k - 1, by_distance);
            distances.truncate(k);
            distances.sort_unstable_by(by_distance);
            distances
        })
        .collect();

    let mut indices = Vec::with_capacity(x.nrows() * k);
    let mut dists = Vec::with_capacity(x.nrows() * k);
    for row in neighbours {
        for (d2, j) in row {
            indices.push(j as u32);
            dists.push(d2.sqrt() as f32);
        }
    }
    (indices, dists)
}

fn random_init(n_obs: usize, n_components: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((n_obs, n_components), |_| rng.random_range(-10.0..10.0))
}
