use std::collections::HashMap;

use anndata::data::Mapping;
use anndata::Data;
use ndarray::Array1;

use crate::error::DimRedError;
use crate::svd::SvdSolver;

/// Diagnostics of the last PCA run, kept at `uns["pca"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PcaInfo {
    /// Variance captured by each component (ddof = 1).
    pub variance: Array1<f64>,
    /// `variance` divided by the total variance of the matrix the PCA ran on.
    pub variance_ratio: Array1<f64>,
    pub params: PcaInfoParams,
}

impl PcaInfo {
    pub fn n_components(&self) -> usize {
        self.variance_ratio.len()
    }

    pub fn cumulative_variance_ratio(&self) -> Array1<f64> {
        self.variance_ratio
            .iter()
            .scan(0.0, |sum, &ratio| {
                *sum += ratio;
                Some(*sum)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PcaInfoParams {
    pub n_comps: usize,
    pub use_highly_variable: bool,
    pub zero_center: bool,
    /// Solver that actually ran, after `auto` was resolved.
    pub solver: SvdSolver,
    pub random_state: u64,
}

/// Parameters of the last t-SNE run, kept at `uns["tsne"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TsneInfo {
    pub n_components: usize,
    pub perplexity: f64,
    pub theta: f64,
    pub epochs: usize,
    /// Representation the embedding was computed from (`"X"` or an `obsm` key).
    pub use_rep: String,
}

/// Parameters of the last UMAP run, kept at `uns["umap"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct UmapInfo {
    pub n_components: usize,
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    /// Fitted curve parameters of the low-dimensional similarity `1 / (1 + a·d^(2b))`.
    pub a: f64,
    pub b: f64,
    pub random_state: u64,
    pub use_rep: String,
}

fn mapping(data: Data, slot: &str) -> anyhow::Result<Mapping> {
    match data {
        Data::Mapping(m) => Ok(m),
        other => Err(DimRedError::InvalidState(format!(
            "uns[\"{}\"] is not a mapping but {}",
            slot,
            data_kind(&other)
        ))
        .into()),
    }
}

fn data_kind(data: &Data) -> &'static str {
    match data {
        Data::ArrayData(_) => "an array",
        Data::Scalar(_) => "a scalar",
        Data::Mapping(_) => "a mapping",
    }
}

fn field(map: &Mapping, slot: &str, key: &str) -> anyhow::Result<Data> {
    map.get(key).cloned().ok_or_else(|| {
        DimRedError::InvalidState(format!("uns[\"{}\"] has no `{}` entry", slot, key)).into()
    })
}

fn usize_field(map: &Mapping, slot: &str, key: &str) -> anyhow::Result<usize> {
    Ok(u64::try_from(field(map, slot, key)?)? as usize)
}

fn f64_field(map: &Mapping, slot: &str, key: &str) -> anyhow::Result<f64> {
    f64::try_from(field(map, slot, key)?)
}

fn params_of(data: Data, slot: &str) -> anyhow::Result<Mapping> {
    let top = mapping(data, slot)?;
    mapping(field(&top, slot, "params")?, slot)
}

fn with_params(mut top: HashMap<String, Data>, params: HashMap<String, Data>) -> Data {
    top.insert("params".to_string(), Data::from(Mapping::from(params)));
    Data::from(Mapping::from(top))
}

impl From<PcaInfo> for Data {
    fn from(info: PcaInfo) -> Self {
        let p = &info.params;
        let mut params = HashMap::from([
            ("n_comps".to_string(), Data::from(p.n_comps as u64)),
            ("use_highly_variable".to_string(), Data::from(p.use_highly_variable)),
            ("zero_center".to_string(), Data::from(p.zero_center)),
            ("svd_solver".to_string(), Data::from(p.solver.name().to_string())),
            ("random_state".to_string(), Data::from(p.random_state)),
        ]);
        if let SvdSolver::Randomized {
            n_oversamples,
            n_power_iterations,
        } = p.solver
        {
            params.insert("n_oversamples".to_string(), Data::from(n_oversamples as u64));
            params.insert(
                "n_power_iterations".to_string(),
                Data::from(n_power_iterations as u64),
            );
        }

        let top = HashMap::from([
            ("variance".to_string(), Data::from(info.variance)),
            ("variance_ratio".to_string(), Data::from(info.variance_ratio)),
        ]);
        with_params(top, params)
    }
}

impl TryFrom<Data> for PcaInfo {
    type Error = anyhow::Error;

    fn try_from(data: Data) -> anyhow::Result<Self> {
        let top = mapping(data, "pca")?;
        let variance = Array1::<f64>::try_from(field(&top, "pca", "variance")?)?;
        let variance_ratio = Array1::<f64>::try_from(field(&top, "pca", "variance_ratio")?)?;
        let params = mapping(field(&top, "pca", "params")?, "pca")?;

        let mut solver: SvdSolver = String::try_from(field(&params, "pca", "svd_solver")?)?.parse()?;
        if let SvdSolver::Randomized { .. } = solver {
            solver = SvdSolver::Randomized {
                n_oversamples: usize_field(&params, "pca", "n_oversamples")?,
                n_power_iterations: usize_field(&params, "pca", "n_power_iterations")?,
            };
        }

        Ok(PcaInfo {
            variance,
            variance_ratio,
            params: PcaInfoParams {
                n_comps: usize_field(&params, "pca", "n_comps")?,
                use_highly_variable: bool::try_from(field(&params, "pca", "use_highly_variable")?)?,
                zero_center: bool::try_from(field(&params, "pca", "zero_center")?)?,
                solver,
                random_state: u64::try_from(field(&params, "pca", "random_state")?)?,
            },
        })
    }
}

impl From<TsneInfo> for Data {
    fn from(info: TsneInfo) -> Self {
        let params = HashMap::from([
            ("n_components".to_string(), Data::from(info.n_components as u64)),
            ("perplexity".to_string(), Data::from(info.perplexity)),
            ("theta".to_string(), Data::from(info.theta)),
            ("epochs".to_string(), Data::from(info.epochs as u64)),
            ("use_rep".to_string(), Data::from(info.use_rep)),
        ]);
        with_params(HashMap::new(), params)
    }
}

impl TryFrom<Data> for TsneInfo {
    type Error = anyhow::Error;

    fn try_from(data: Data) -> anyhow::Result<Self> {
        let p = params_of(data, "tsne")?;
        Ok(TsneInfo {
            n_components: usize_field(&p, "tsne", "n_components")?,
            perplexity: f64_field(&p, "tsne", "perplexity")?,
            theta: f64_field(&p, "tsne", "theta")?,
            epochs: usize_field(&p, "tsne", "epochs")?,
            use_rep: String::try_from(field(&p, "tsne", "use_rep")?)?,
        })
    }
}

impl From<UmapInfo> for Data {
    fn from(info: UmapInfo) -> Self {
        let params = HashMap::from([
            ("n_components".to_string(), Data::from(info.n_components as u64)),
            ("n_neighbors".to_string(), Data::from(info.n_neighbors as u64)),
            ("min_dist".to_string(), Data::from(info.min_dist)),
            ("spread".to_string(), Data::from(info.spread)),
            ("a".to_string(), Data::from(info.a)),
            ("b".to_string(), Data::from(info.b)),
            ("random_state".to_string(), Data::from(info.random_state)),
            ("use_rep".to_string(), Data::from(info.use_rep)),
        ]);
        with_params(HashMap::new(), params)
    }
}

impl TryFrom<Data> for UmapInfo {
    type Error = anyhow::Error;

    fn try_from(data: Data) -> anyhow::Result<Self> {
        let p = params_of(data, "umap")?;
        Ok(UmapInfo {
            n_components: usize_field(&p, "umap", "n_components")?,
            n_neighbors: usize_field(&p, "umap", "n_neighbors")?,
            min_dist: f64_field(&p, "umap", "min_dist")?,
            spread: f64_field(&p, "umap", "spread")?,
            a: f64_field(&p, "umap", "a")?,
            b: f64_field(&p, "umap", "b")?,
            random_state: u64::try_from(field(&p, "umap", "random_state")?)?,
            use_rep: String::try_from(field(&p, "umap", "use_rep")?)?,
        })
    }
}
