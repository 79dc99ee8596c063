use anndata_memory::IMAnnData;

use crate::data::PcaInfo;
use crate::dimred::umap::UmapConfig;
use crate::svd::SvdSolver;

/// Options for [`DimensionalityReduction::run_pca`](super::DimensionalityReduction::run_pca).
#[derive(Debug, Clone, PartialEq)]
pub struct PcaParams {
    pub n_comps: usize,
    /// Restrict the decomposition to genes flagged in `var["highly_variable"]`.
    pub use_highly_variable: bool,
    pub solver: SvdSolver,
    /// Seed for the randomized solver.
    pub random_state: u64,
    pub zero_center: bool,
    /// Also hand the stored diagnostics back to the caller.
    pub return_info: bool,
    /// Write into the held dataset instead of a copy.
    pub inplace: bool,
}

impl Default for PcaParams {
    fn default() -> Self {
        Self {
            n_comps: 50,
            use_highly_variable: true,
            solver: SvdSolver::Auto,
            random_state: 42,
            zero_center: true,
            return_info: false,
            inplace: true,
        }
    }
}

impl PcaParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_comps(mut self, n_comps: usize) -> Self {
        self.n_comps = n_comps;
        self
    }

    pub fn use_highly_variable(mut self, use_highly_variable: bool) -> Self {
        self.use_highly_variable = use_highly_variable;
        self
    }

    pub fn solver(mut self, solver: SvdSolver) -> Self {
        self.solver = solver;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    pub fn zero_center(mut self, zero_center: bool) -> Self {
        self.zero_center = zero_center;
        self
    }

    pub fn return_info(mut self, return_info: bool) -> Self {
        self.return_info = return_info;
        self
    }

    pub fn inplace(mut self, inplace: bool) -> Self {
        self.inplace = inplace;
        self
    }
}

/// What `run_pca` hands back besides the stored slots.
#[derive(Default)]
pub struct PcaOutput {
    /// The modified copy, in copy mode only.
    pub adata: Option<IMAnnData>,
    /// Set when `return_info` was requested.
    pub info: Option<PcaInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TsneParams {
    pub n_components: u8,
    pub perplexity: f64,
    /// Barnes-Hut accuracy/speed trade-off.
    pub theta: f64,
    pub epochs: usize,
    /// `"X"` or an `obsm` key; defaults to `X_pca` when present, else `X`.
    pub use_rep: Option<String>,
    /// Use only the leading columns of the representation.
    pub n_pcs: Option<usize>,
    pub inplace: bool,
}

impl Default for TsneParams {
    fn default() -> Self {
        Self {
            n_components: 2,
            perplexity: 30.0,
            theta: 0.5,
            epochs: 1000,
            use_rep: None,
            n_pcs: None,
            inplace: true,
        }
    }
}

impl TsneParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_components(mut self, n_components: u8) -> Self {
        self.n_components = n_components;
        self
    }

    pub fn perplexity(mut self, perplexity: f64) -> Self {
        self.perplexity = perplexity;
        self
    }

    pub fn theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn use_rep(mut self, use_rep: impl Into<String>) -> Self {
        self.use_rep = Some(use_rep.into());
        self
    }

    pub fn n_pcs(mut self, n_pcs: usize) -> Self {
        self.n_pcs = Some(n_pcs);
        self
    }

    pub fn inplace(mut self, inplace: bool) -> Self {
        self.inplace = inplace;
        self
    }
}

/// Options for [`DimensionalityReduction::run_umap`](super::DimensionalityReduction::run_umap).
#[derive(Debug, Clone, PartialEq)]
pub struct UmapParams {
    pub n_components: usize,
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    /// `None` lets the optimiser pick from the dataset size.
    pub n_epochs: Option<usize>,
    pub learning_rate: f64,
    pub negative_sample_rate: usize,
    pub random_state: u64,
    /// `"X"` or an `obsm` key; defaults to `X_pca` when present, else `X`.
    pub use_rep: Option<String>,
    pub n_pcs: Option<usize>,
    pub inplace: bool,
}

impl Default for UmapParams {
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
            use_rep: None,
            n_pcs: None,
            inplace: true,
        }
    }
}

impl UmapParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_components(mut self, n_components: usize) -> Self {
        self.n_components = n_components;
        self
    }

    pub fn n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.n_neighbors = n_neighbors;
        self
    }

    pub fn min_dist(mut self, min_dist: f64) -> Self {
        self.min_dist = min_dist;
        self
    }

    pub fn spread(mut self, spread: f64) -> Self {
        self.spread = spread;
        self
    }

    pub fn n_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = Some(n_epochs);
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn negative_sample_rate(mut self, negative_sample_rate: usize) -> Self {
        self.negative_sample_rate = negative_sample_rate;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    pub fn use_rep(mut self, use_rep: impl Into<String>) -> Self {
        self.use_rep = Some(use_rep.into());
        self
    }

    pub fn n_pcs(mut self, n_pcs: usize) -> Self {
        self.n_pcs = Some(n_pcs);
        self
    }

    pub fn inplace(mut self, inplace: bool) -> Self {
        self.inplace = inplace;
        self
    }

    pub(crate) fn config(&self) -> UmapConfig {
        UmapConfig {
            n_components: self.n_components,
            n_neighbors: self.n_neighbors,
            min_dist: self.min_dist,
            spread: self.spread,
            n_epochs: self.n_epochs,
            learning_rate: self.learning_rate,
            negative_sample_rate: self.negative_sample_rate,
            random_state: self.random_state,
        }
    }
}
