//! # Dimensionality reduction on annotated data
//!
//! [`DimensionalityReduction`] wraps a [`SharedAnnData`] handle and runs the
//! reductions from [`crate::dimred`] on it, storing results in the usual
//! slots:
//!
//! | step   | `obsm`    | `varm` | `uns`  |
//! |--------|-----------|--------|--------|
//! | PCA    | `X_pca`   | `PCs`  | `pca`  |
//! | t-SNE  | `X_tsne`  |        | `tsne` |
//! | UMAP   | `X_umap`  |        | `umap` |
//!
//! Computations run under a read lock; results are committed afterwards under
//! the write lock (or into a deep copy in copy mode), so a failed run leaves
//! the dataset unchanged.

use anndata_memory::{DeepClone, IMAnnData};
use log::{debug, info, warn};
use ndarray::{s, Array2, Axis};

use crate::data::{
    self, obsm_matrix, put_obsm, put_uns, put_varm, with_expression, Expression, PcaInfo,
    PcaInfoParams, SharedAnnData, TsneInfo, UmapInfo, VarFlag,
};
use crate::dimred::{pca, tsne, umap};
use crate::error::DimRedError;
use crate::plot::{self, VarianceFigure, VariancePlotParams};

mod params;

pub use params::{PcaOutput, PcaParams, TsneParams, UmapParams};

pub struct DimensionalityReduction {
    adata: SharedAnnData,
}

impl DimensionalityReduction {
    pub fn new(adata: SharedAnnData) -> Self {
        Self { adata }
    }

    pub fn adata(&self) -> &SharedAnnData {
        &self.adata
    }

    /// Principal component analysis of `X`.
    ///
    /// Stores the embedding at `obsm["X_pca"]`, the loadings at `varm["PCs"]`
    /// and the variance diagnostics at `uns["pca"]`. When the decomposition is
    /// restricted to highly variable genes, loadings of the other genes are
    /// zero.
    pub fn run_pca(&self, params: &PcaParams) -> anyhow::Result<PcaOutput> {
        info!("Running PCA with {} components", params.n_comps);

        let computed = {
            let adata = self.adata.read();
            compute_pca(&adata, params)?
        };
        let info = params.return_info.then(|| computed.info.clone());

        if params.inplace {
            let adata = self.adata.write();
            computed.commit(&adata)?;
            Ok(PcaOutput { adata: None, info })
        } else {
            let copy = self.adata.read().deep_clone();
            computed.commit(&copy)?;
            Ok(PcaOutput {
                adata: Some(copy),
                info,
            })
        }
    }

    /// Barnes-Hut t-SNE of a representation of the cells.
    ///
    /// Stores the embedding at `obsm["X_tsne"]` and the run parameters at
    /// `uns["tsne"]`. Returns the modified copy when `params.inplace` is false.
    pub fn run_tsne(&self, params: &TsneParams) -> anyhow::Result<Option<IMAnnData>> {
        let (embedding, tsne_info) = {
            let adata = self.adata.read();
            let (use_rep, rep) =
                representation(&adata, params.use_rep.as_deref(), params.n_pcs, "t-SNE")?;
            info!(
                "Running t-SNE on `{}` ({} x {}) with perplexity {}",
                use_rep,
                rep.nrows(),
                rep.ncols(),
                params.perplexity
            );

            let config = tsne::TsneConfig {
                output_dim: params.n_components,
                perplexity: params.perplexity,
                epochs: params.epochs,
                theta: params.theta,
            };
            let embedding = tsne::run_f64(rep.view(), &config)?;
            let tsne_info = TsneInfo {
                n_components: params.n_components as usize,
                perplexity: params.perplexity,
                theta: params.theta,
                epochs: params.epochs,
                use_rep,
            };
            (embedding, tsne_info)
        };

        self.commit_embedding(params.inplace, |adata| {
            put_obsm(adata, "X_tsne", embedding)?;
            put_uns(adata, "tsne", tsne_info)
        })
    }

    /// UMAP of a representation of the cells.
    ///
    /// Stores the embedding at `obsm["X_umap"]` and the run parameters, fitted
    /// curve parameters included, at `uns["umap"]`. Returns the modified copy
    /// when `params.inplace` is false.
    pub fn run_umap(&self, params: &UmapParams) -> anyhow::Result<Option<IMAnnData>> {
        let (embedding, umap_info) = {
            let adata = self.adata.read();
            let (use_rep, rep) =
                representation(&adata, params.use_rep.as_deref(), params.n_pcs, "UMAP")?;
            info!(
                "Running UMAP on `{}` ({} x {}) with {} neighbours",
                use_rep,
                rep.nrows(),
                rep.ncols(),
                params.n_neighbors
            );

            let fitted = umap::run_f64(rep.view(), &params.config())?;
            let umap_info = UmapInfo {
                n_components: params.n_components,
                n_neighbors: params.n_neighbors,
                min_dist: params.min_dist,
                spread: params.spread,
                a: fitted.a,
                b: fitted.b,
                random_state: params.random_state,
                use_rep,
            };
            (fitted.embedding, umap_info)
        };

        self.commit_embedding(params.inplace, |adata| {
            put_obsm(adata, "X_umap", embedding)?;
            put_uns(adata, "umap", umap_info)
        })
    }

    /// Plots the explained variance stored by the last [`run_pca`](Self::run_pca).
    pub fn plot_pca_variance(
        &self,
        params: &VariancePlotParams,
    ) -> anyhow::Result<Option<VarianceFigure>> {
        let stored = data::pca_info(&self.adata.read()).map_err(|e| {
            DimRedError::InvalidState(format!("uns[\"pca\"] cannot be read: {}", e))
        })?;
        let info = stored.ok_or_else(|| {
            DimRedError::InvalidState(
                "PCA hasn't been performed yet or variance_ratio information is missing."
                    .to_string(),
            )
        })?;
        plot::plot_variance(&info, params)
    }

    fn commit_embedding(
        &self,
        inplace: bool,
        commit: impl FnOnce(&IMAnnData) -> anyhow::Result<()>,
    ) -> anyhow::Result<Option<IMAnnData>> {
        if inplace {
            commit(&self.adata.write())?;
            Ok(None)
        } else {
            let copy = self.adata.read().deep_clone();
            commit(&copy)?;
            Ok(Some(copy))
        }
    }
}

/// Finished PCA results, not yet written anywhere.
struct ComputedPca {
    embedding: Array2<f64>,
    loadings: Array2<f64>,
    info: PcaInfo,
}

impl ComputedPca {
    fn commit(self, adata: &IMAnnData) -> anyhow::Result<()> {
        // check both before touching either slot
        data::check_rows("obsm[\"X_pca\"]", adata.n_obs(), self.embedding.nrows())?;
        data::check_rows("varm[\"PCs\"]", adata.n_vars(), self.loadings.nrows())?;

        put_obsm(adata, "X_pca", self.embedding)?;
        put_varm(adata, "PCs", self.loadings)?;
        put_uns(adata, "pca", self.info)
    }
}

fn compute_pca(adata: &IMAnnData, params: &PcaParams) -> anyhow::Result<ComputedPca> {
    let mask = if params.use_highly_variable {
        highly_variable_mask(adata)
    } else {
        None
    };

    let result = with_expression(adata, |x| match x {
        Expression::Dense(m) => {
            let selected = match &mask {
                Some(mask) => m.select(Axis(1), &kept_indices(mask)),
                None => m.to_owned(),
            };
            pca::run_pca(
                selected.view(),
                params.n_comps,
                params.zero_center,
                params.solver,
                params.random_state,
            )
        }
        Expression::Sparse(m) => pca::run_pca_sparse(
            m,
            mask.as_deref(),
            params.n_comps,
            params.zero_center,
            params.solver,
            params.random_state,
        ),
    })?;

    let loadings = match &mask {
        Some(mask) => scatter_loadings(&result.components, mask),
        None => result.components.t().to_owned(),
    };

    let info = PcaInfo {
        variance: result.explained_variance,
        variance_ratio: result.explained_variance_ratio,
        params: PcaInfoParams {
            n_comps: params.n_comps,
            use_highly_variable: mask.is_some(),
            zero_center: params.zero_center,
            solver: result.solver,
            random_state: params.random_state,
        },
    };

    Ok(ComputedPca {
        embedding: result.embedding,
        loadings,
        info,
    })
}

fn highly_variable_mask(adata: &IMAnnData) -> Option<Vec<bool>> {
    match data::var_flag(adata, "highly_variable") {
        VarFlag::Bool(flags) => {
            let n_flagged = flags.iter().filter(|&&f| f).count();
            info!("Using {} highly variable genes", n_flagged);
            Some(flags)
        }
        VarFlag::Other(dtype) => {
            warn!(
                "var[\"highly_variable\"] is a {} column, not bool; using all genes",
                dtype
            );
            None
        }
        VarFlag::Missing => {
            debug!("No highly_variable annotation; using all genes");
            None
        }
    }
}

fn kept_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(j, &keep)| keep.then_some(j))
        .collect()
}

/// Expands k × n_selected components into n_genes × k loadings, leaving rows
/// of unselected genes at zero.
fn scatter_loadings(components: &Array2<f64>, mask: &[bool]) -> Array2<f64> {
    let mut loadings = Array2::zeros((mask.len(), components.nrows()));
    for (col, gene) in kept_indices(mask).into_iter().enumerate() {
        loadings.row_mut(gene).assign(&components.column(col));
    }
    loadings
}

/// The matrix an embedding runs on: `X`, or an `obsm` entry, optionally cut
/// to its leading `n_pcs` columns.
fn representation(
    adata: &IMAnnData,
    use_rep: Option<&str>,
    n_pcs: Option<usize>,
    method: &str,
) -> anyhow::Result<(String, Array2<f64>)> {
    let (use_rep, rep) = match use_rep {
        Some("X") => ("X".to_string(), with_expression(adata, |x| Ok(x.to_dense()))?),
        Some(key) => {
            let rep = obsm_matrix(adata, key)?.ok_or_else(|| {
                DimRedError::InvalidParameter(format!(
                    "representation `{}` not found in obsm",
                    key
                ))
            })?;
            (key.to_string(), rep)
        }
        None => match obsm_matrix(adata, "X_pca")? {
            Some(rep) => ("X_pca".to_string(), rep),
            None => {
                debug!("No X_pca found; {} runs on X", method);
                ("X".to_string(), with_expression(adata, |x| Ok(x.to_dense()))?)
            }
        },
    };

    match n_pcs {
        Some(n_pcs) if n_pcs == 0 || n_pcs > rep.ncols() => {
            Err(DimRedError::InvalidParameter(format!(
                "n_pcs = {} must be in 1..={} for the columns of `{}`",
                n_pcs,
                rep.ncols(),
                use_rep
            ))
            .into())
        }
        Some(n_pcs) => Ok((use_rep, rep.slice(s![.., ..n_pcs]).to_owned())),
        None => Ok((use_rep, rep)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{from_matrix, into_shared, pca_info, tsne_info, umap_info, varm_matrix};
    use crate::svd::SvdSolver;
    use approx::assert_abs_diff_eq;
    use nalgebra_sparse::{CooMatrix, CsrMatrix};
    use polars::prelude::{NamedFrom, Series};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn counts(n_cells: usize, n_genes: usize, seed: u64) -> Array2<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Array2::from_shape_fn((n_cells, n_genes), |(_, j)| {
            rng.random_range(0.0..1.0) * (1.0 + (j % 7) as f64)
        })
    }

    fn flagged(n_genes: usize, every: usize) -> Vec<bool> {
        (0..n_genes).map(|j| j % every == 0).collect()
    }

    fn with_flags(adata: IMAnnData, flags: Vec<bool>) -> IMAnnData {
        adata
            .var()
            .attach_column_to_df(Series::new("highly_variable".into(), flags))
            .unwrap();
        adata
    }

    fn reduction_of(x: Array2<f64>) -> DimensionalityReduction {
        DimensionalityReduction::new(into_shared(from_matrix(x).unwrap()))
    }

    fn kind(err: &anyhow::Error) -> Option<&DimRedError> {
        err.downcast_ref::<DimRedError>()
    }

    #[test]
    fn test_pca_on_highly_variable_genes() {
        init();
        let x = counts(100, 500, 1);
        let flags = flagged(500, 10);
        let adata = with_flags(from_matrix(x.clone()).unwrap(), flags.clone());
        let reduction = DimensionalityReduction::new(into_shared(adata));

        let output = reduction
            .run_pca(&PcaParams::new().n_comps(10).return_info(true))
            .unwrap();
        assert!(output.adata.is_none());

        let adata = reduction.adata().read();
        assert_eq!(
            obsm_matrix(&adata, "X_pca").unwrap().map(|m| m.dim()),
            Some((100, 10))
        );

        let loadings = varm_matrix(&adata, "PCs").unwrap().unwrap();
        assert_eq!(loadings.dim(), (500, 10));
        for (j, &flag) in flags.iter().enumerate() {
            let is_zero = loadings.row(j).iter().all(|&v| v == 0.0);
            assert_eq!(is_zero, !flag, "gene {}", j);
        }

        let kept = kept_indices(&flags);
        let expected = pca::run_pca(
            x.select(Axis(1), &kept).view(),
            10,
            true,
            SvdSolver::Auto,
            42,
        )
        .unwrap();
        for (col, &gene) in kept.iter().enumerate() {
            for k in 0..10 {
                assert_abs_diff_eq!(
                    loadings[[gene, k]],
                    expected.components[[k, col]],
                    epsilon = 1e-10
                );
            }
        }

        let info = pca_info(&adata).unwrap().unwrap();
        assert_eq!(info.n_components(), 10);
        assert!(info.params.use_highly_variable);
        assert_eq!(output.info, Some(info));
    }

    #[test]
    fn test_pca_without_flag_uses_all_genes() {
        init();
        let x = counts(30, 12, 2);
        let reduction = reduction_of(x.clone());
        reduction.run_pca(&PcaParams::new().n_comps(4)).unwrap();

        let expected = pca::run_pca(x.view(), 4, true, SvdSolver::Auto, 42).unwrap();
        let adata = reduction.adata().read();
        let embedding = obsm_matrix(&adata, "X_pca").unwrap().unwrap();
        for (a, b) in embedding.iter().zip(expected.embedding.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
        assert_eq!(
            varm_matrix(&adata, "PCs").unwrap().map(|m| m.dim()),
            Some((12, 4))
        );
        assert!(!pca_info(&adata).unwrap().unwrap().params.use_highly_variable);
    }

    #[test]
    fn test_use_highly_variable_false_ignores_flag() {
        init();
        let adata = with_flags(from_matrix(counts(30, 12, 3)).unwrap(), flagged(12, 3));
        let reduction = DimensionalityReduction::new(into_shared(adata));
        reduction
            .run_pca(&PcaParams::new().n_comps(3).use_highly_variable(false))
            .unwrap();

        let adata = reduction.adata().read();
        let loadings = varm_matrix(&adata, "PCs").unwrap().unwrap();
        assert!(loadings
            .rows()
            .into_iter()
            .all(|row| row.iter().any(|&v| v != 0.0)));
    }

    #[test]
    fn test_non_bool_flag_is_skipped() {
        init();
        let adata = from_matrix(counts(20, 8, 4)).unwrap();
        adata
            .var()
            .attach_column_to_df(Series::new(
                "highly_variable".into(),
                vec![1i64, 0, 1, 0, 1, 0, 1, 0],
            ))
            .unwrap();
        let reduction = DimensionalityReduction::new(into_shared(adata));
        reduction.run_pca(&PcaParams::new().n_comps(3)).unwrap();

        let adata = reduction.adata().read();
        assert!(!pca_info(&adata).unwrap().unwrap().params.use_highly_variable);
        assert_eq!(
            varm_matrix(&adata, "PCs").unwrap().map(|m| m.dim()),
            Some((8, 3))
        );
    }

    #[test]
    fn test_copy_mode_leaves_original_untouched() {
        init();
        let reduction = reduction_of(counts(25, 10, 5));
        let output = reduction
            .run_pca(&PcaParams::new().n_comps(5).inplace(false))
            .unwrap();

        let copy = output.adata.unwrap();
        assert_eq!(
            obsm_matrix(&copy, "X_pca").unwrap().map(|m| m.dim()),
            Some((25, 5))
        );
        assert!(pca_info(&copy).unwrap().is_some());
        assert!(output.info.is_none());

        let original = reduction.adata().read();
        assert!(obsm_matrix(&original, "X_pca").unwrap().is_none());
        assert!(varm_matrix(&original, "PCs").unwrap().is_none());
        assert!(pca_info(&original).unwrap().is_none());
    }

    #[test]
    fn test_failed_pca_changes_nothing() {
        init();
        let reduction = reduction_of(counts(10, 6, 6));

        let err = reduction.run_pca(&PcaParams::new().n_comps(0)).err().unwrap();
        assert!(matches!(kind(&err), Some(DimRedError::InvalidParameter(_))));

        // more components than min(n_obs, n_vars)
        let err = reduction.run_pca(&PcaParams::new().n_comps(50)).err().unwrap();
        assert!(matches!(kind(&err), Some(DimRedError::InvalidParameter(_))));

        let adata = reduction.adata().read();
        assert!(obsm_matrix(&adata, "X_pca").unwrap().is_none());
        assert!(pca_info(&adata).unwrap().is_none());
    }

    #[test]
    fn test_nan_expression_fails_without_writing() {
        init();
        let mut x = counts(20, 8, 15);
        x[[3, 2]] = f64::NAN;
        let reduction = reduction_of(x);

        let err = reduction
            .run_pca(&PcaParams::new().n_comps(3).solver(SvdSolver::Full))
            .err().unwrap();
        assert!(matches!(kind(&err), Some(DimRedError::InvalidParameter(_))));
        assert!(pca_info(&reduction.adata().read()).unwrap().is_none());
    }

    #[test]
    fn test_repeated_pca_overwrites() {
        init();
        let reduction = reduction_of(counts(30, 10, 7));
        reduction.run_pca(&PcaParams::new().n_comps(6)).unwrap();
        reduction.run_pca(&PcaParams::new().n_comps(3)).unwrap();

        let adata = reduction.adata().read();
        assert_eq!(
            obsm_matrix(&adata, "X_pca").unwrap().map(|m| m.ncols()),
            Some(3)
        );
        assert_eq!(
            varm_matrix(&adata, "PCs").unwrap().map(|m| m.ncols()),
            Some(3)
        );
        assert_eq!(
            pca_info(&adata).unwrap().map(|info| info.n_components()),
            Some(3)
        );
    }

    #[test]
    fn test_sparse_and_dense_agree() {
        init();
        let x = counts(40, 15, 8).mapv(|v| if v < 1.5 { 0.0 } else { v });
        let mut coo = CooMatrix::new(40, 15);
        for ((i, j), &v) in x.indexed_iter() {
            if v != 0.0 {
                coo.push(i, j, v);
            }
        }
        let sparse = with_flags(from_matrix(CsrMatrix::from(&coo)).unwrap(), flagged(15, 2));
        let dense = with_flags(from_matrix(x).unwrap(), flagged(15, 2));

        for solver in [SvdSolver::Full, SvdSolver::randomized()] {
            let params = PcaParams::new().n_comps(4).solver(solver);
            let sparse = DimensionalityReduction::new(into_shared(sparse.deep_clone()));
            let dense = DimensionalityReduction::new(into_shared(dense.deep_clone()));
            sparse.run_pca(&params).unwrap();
            dense.run_pca(&params).unwrap();

            let a = varm_matrix(&sparse.adata().read(), "PCs").unwrap().unwrap();
            let b = varm_matrix(&dense.adata().read(), "PCs").unwrap().unwrap();
            for (x, y) in a.iter().zip(b.iter()) {
                assert_abs_diff_eq!(x, y, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_randomized_solver_is_recorded() {
        init();
        let reduction = reduction_of(counts(60, 20, 9));
        let output = reduction
            .run_pca(
                &PcaParams::new()
                    .n_comps(5)
                    .solver(SvdSolver::randomized())
                    .random_state(7)
                    .return_info(true),
            )
            .unwrap();

        let info = output.info.unwrap();
        assert_eq!(info.params.solver, SvdSolver::randomized());
        assert_eq!(info.params.random_state, 7);
        assert_eq!(pca_info(&reduction.adata().read()).unwrap(), Some(info));
    }

    #[test]
    fn test_plot_before_pca() {
        init();
        let reduction = reduction_of(counts(10, 5, 10));
        let err = reduction
            .plot_pca_variance(&VariancePlotParams::new())
            .unwrap_err();
        assert!(matches!(kind(&err), Some(DimRedError::InvalidState(_))));
    }

    #[test]
    fn test_plot_with_unreadable_record() {
        init();
        let reduction = reduction_of(counts(10, 5, 16));
        put_uns(&reduction.adata().read(), "pca", String::from("not a record")).unwrap();

        let err = reduction
            .plot_pca_variance(&VariancePlotParams::new())
            .unwrap_err();
        assert!(matches!(kind(&err), Some(DimRedError::InvalidState(_))));
    }

    #[test]
    fn test_plot_after_pca() {
        init();
        let reduction = reduction_of(counts(40, 20, 11));
        reduction.run_pca(&PcaParams::new().n_comps(8)).unwrap();

        let figure = reduction
            .plot_pca_variance(&VariancePlotParams::new().threshold(0.5).return_fig(true))
            .unwrap()
            .unwrap();
        assert_eq!(figure.n_pcs(), 8);
        assert!(figure.svg().contains("PCA Cumulative Explained Variance"));

        let none = reduction
            .plot_pca_variance(&VariancePlotParams::new())
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_tsne_defaults_to_pca_representation() {
        init();
        let reduction = reduction_of(counts(40, 12, 12));
        reduction.run_pca(&PcaParams::new().n_comps(6)).unwrap();

        let result = reduction
            .run_tsne(&TsneParams::new().perplexity(5.0).epochs(50).n_pcs(4))
            .unwrap();
        assert!(result.is_none());

        let adata = reduction.adata().read();
        assert_eq!(
            obsm_matrix(&adata, "X_tsne").unwrap().map(|m| m.dim()),
            Some((40, 2))
        );
        let info = tsne_info(&adata).unwrap().unwrap();
        assert_eq!(info.use_rep, "X_pca");
        assert_eq!(info.n_components, 2);
    }

    #[test]
    fn test_tsne_on_x_in_copy_mode() {
        init();
        let reduction = reduction_of(counts(40, 6, 13));
        let copy = reduction
            .run_tsne(&TsneParams::new().perplexity(5.0).epochs(50).inplace(false))
            .unwrap()
            .unwrap();

        assert_eq!(
            obsm_matrix(&copy, "X_tsne").unwrap().map(|m| m.dim()),
            Some((40, 2))
        );
        assert_eq!(tsne_info(&copy).unwrap().unwrap().use_rep, "X");
        assert!(obsm_matrix(&reduction.adata().read(), "X_tsne")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_tsne_representation_errors() {
        init();
        let reduction = reduction_of(counts(40, 6, 14));

        let err = reduction
            .run_tsne(&TsneParams::new().use_rep("X_umap"))
            .err().unwrap();
        assert!(matches!(kind(&err), Some(DimRedError::InvalidParameter(_))));

        let err = reduction
            .run_tsne(&TsneParams::new().perplexity(5.0).n_pcs(7))
            .err().unwrap();
        assert!(matches!(kind(&err), Some(DimRedError::InvalidParameter(_))));

        // 40 cells cannot support perplexity 30
        let err = reduction.run_tsne(&TsneParams::new()).err().unwrap();
        assert!(matches!(kind(&err), Some(DimRedError::InvalidParameter(_))));
        assert!(tsne_info(&reduction.adata().read()).unwrap().is_none());
    }

    #[test]
    fn test_umap_in_place_on_pca() {
        init();
        let reduction = reduction_of(counts(40, 12, 17));
        reduction.run_pca(&PcaParams::new().n_comps(6)).unwrap();

        let result = reduction
            .run_umap(&UmapParams::new().n_neighbors(5).n_epochs(50).n_pcs(5))
            .unwrap();
        assert!(result.is_none());

        let adata = reduction.adata().read();
        let embedding = obsm_matrix(&adata, "X_umap").unwrap().unwrap();
        assert_eq!(embedding.dim(), (40, 2));

        let info = umap_info(&adata).unwrap().unwrap();
        assert_eq!(info.use_rep, "X_pca");
        assert_eq!(info.n_neighbors, 5);
        assert_eq!(info.n_components, 2);
        assert!(info.a > 0.0 && info.b > 0.0);
    }

    #[test]
    fn test_umap_copy_mode_on_x() {
        init();
        let reduction = reduction_of(counts(30, 6, 18));
        let copy = reduction
            .run_umap(
                &UmapParams::new()
                    .n_neighbors(4)
                    .n_components(3)
                    .n_epochs(30)
                    .inplace(false),
            )
            .unwrap()
            .unwrap();

        assert_eq!(
            obsm_matrix(&copy, "X_umap").unwrap().map(|m| m.dim()),
            Some((30, 3))
        );
        assert_eq!(umap_info(&copy).unwrap().unwrap().use_rep, "X");

        let original = reduction.adata().read();
        assert!(obsm_matrix(&original, "X_umap").unwrap().is_none());
        assert!(umap_info(&original).unwrap().is_none());
    }

    #[test]
    fn test_umap_errors_leave_dataset_unchanged() {
        init();
        let reduction = reduction_of(counts(10, 4, 19));

        // default n_neighbors = 15 needs more than 10 cells
        let err = reduction.run_umap(&UmapParams::new()).err().unwrap();
        assert!(matches!(kind(&err), Some(DimRedError::InvalidParameter(_))));

        let err = reduction
            .run_umap(&UmapParams::new().n_neighbors(3).use_rep("X_missing"))
            .err().unwrap();
        assert!(matches!(kind(&err), Some(DimRedError::InvalidParameter(_))));

        let adata = reduction.adata().read();
        assert!(obsm_matrix(&adata, "X_umap").unwrap().is_none());
        assert!(umap_info(&adata).unwrap().is_none());
    }
}
