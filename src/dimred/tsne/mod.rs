//! # t-SNE
//!
//! Barnes-Hut t-SNE through the `bhtsne` crate, with Euclidean distances.

use ndarray::{Array2, ArrayView2};

use crate::error::DimRedError;

#[derive(Debug, Clone, PartialEq)]
pub struct TsneConfig {
    pub output_dim: u8,
    pub perplexity: f64,
    pub epochs: usize,
    pub theta: f64,
}

impl Default for TsneConfig {
    fn default() -> Self {
        Self {
            output_dim: 2,
            perplexity: 30.0,
            epochs: 1000,
            theta: 0.5,
        }
    }
}

impl TsneConfig {
    /// Rejects settings `bhtsne` would panic on for `n_obs` observations.
    pub fn validate(&self, n_obs: usize) -> anyhow::Result<()> {
        if self.output_dim == 0 {
            return Err(
                DimRedError::InvalidParameter("t-SNE output_dim must be positive".to_string())
                    .into(),
            );
        }
        if self.perplexity <= 0.0 {
            return Err(DimRedError::InvalidParameter(format!(
                "t-SNE perplexity must be positive, got {}",
                self.perplexity
            ))
            .into());
        }
        if (n_obs as f64 - 1.0) < 3.0 * self.perplexity {
            return Err(DimRedError::InvalidParameter(format!(
                "perplexity {} is too large for {} observations (needs n - 1 >= 3 * perplexity)",
                self.perplexity, n_obs
            ))
            .into());
        }
        if !(self.theta > 0.0 && self.theta <= 1.0) {
            return Err(DimRedError::InvalidParameter(format!(
                "Barnes-Hut theta must be in (0, 1], got {}",
                self.theta
            ))
            .into());
        }
        Ok(())
    }
}

/// Embeds the rows of `x` into `config.output_dim` dimensions.
pub fn run_f64(x: ArrayView2<f64>, config: &TsneConfig) -> anyhow::Result<Array2<f64>> {
    let (n_obs, n_dim) = x.dim();
    config.validate(n_obs)?;
    if n_dim == 0 {
        return Err(
            DimRedError::InvalidParameter("t-SNE input has no dimensions".to_string()).into(),
        );
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(DimRedError::InvalidParameter(
            "t-SNE input contains NaN or infinite values".to_string(),
        )
        .into());
    }

    let x = x.as_standard_layout();
    let x_slice = x
        .as_slice()
        .ok_or_else(|| anyhow::anyhow!("t-SNE input is not contiguous"))?;

    let x_chunked_slice: Vec<&[f64]> = x_slice.chunks(n_dim).collect();
    let tsne_result = bhtsne::tSNE::new(&x_chunked_slice)
        .embedding_dim(config.output_dim)
        .perplexity(config.perplexity)
        .epochs(config.epochs)
        .barnes_hut(config.theta, |sample_a, sample_b| {
            sample_a
                .iter()
                .zip(sample_b.iter())
                .map(|(&a, &b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .embedding();

    let result = Array2::from_shape_vec((n_obs, config.output_dim as usize), tsne_result)?;
    Ok(result)
}
