//! # Annotated data
//!
//! Typed access to the parts of an in-memory [`IMAnnData`] that the
//! reductions read and write: `X` as a dense or CSR matrix, boolean flags in
//! `var`, dense matrices in `obsm`/`varm`, and the run records kept in `uns`.
//!
//! `IMAnnData` locks every slot on its own. [`SharedAnnData`] puts one more
//! lock around the whole object so that a run can write all of its slots
//! while no other run is reading them.

use std::ops::Deref;
use std::sync::Arc;

use anndata::data::{DynArray, DynCsrMatrix, Element};
use anndata::{ArrayData, Data, HasShape};
use anndata_memory::{IMAnnData, IMArrayElement, IMAxisArrays, IMElement};
use nalgebra_sparse::CsrMatrix;
use ndarray::{Array2, ArrayView2, Ix2};
use parking_lot::RwLock;

use crate::error::DimRedError;
use crate::sparse::MatrixDensify;

mod uns;

pub use uns::{PcaInfo, PcaInfoParams, TsneInfo, UmapInfo};

pub type SharedAnnData = Arc<RwLock<IMAnnData>>;

pub fn into_shared(adata: IMAnnData) -> SharedAnnData {
    Arc::new(RwLock::new(adata))
}

/// Wraps a cells × genes matrix, naming cells and genes by position.
pub fn from_matrix(x: impl Into<ArrayData>) -> anyhow::Result<IMAnnData> {
    let x = x.into();
    let shape = x.shape();
    let names = |n: usize| (0..n).map(|i| i.to_string()).collect::<Vec<String>>();
    IMAnnData::new_basic(x, names(shape[0]), names(shape[1]))
}

/// `X` borrowed in one of the two layouts the reductions understand.
#[derive(Debug, Clone, Copy)]
pub enum Expression<'a> {
    Dense(ArrayView2<'a, f64>),
    Sparse(&'a CsrMatrix<f64>),
}

impl Expression<'_> {
    /// (n_obs, n_vars)
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Expression::Dense(m) => m.dim(),
            Expression::Sparse(m) => (m.nrows(), m.ncols()),
        }
    }

    pub fn to_dense(&self) -> Array2<f64> {
        match self {
            Expression::Dense(m) => m.to_owned(),
            Expression::Sparse(m) => m.to_dense_all(),
        }
    }
}

/// Runs `f` on `X` while holding its read lock. `f32` data is widened to
/// `f64` first.
pub fn with_expression<R>(
    adata: &IMAnnData,
    f: impl FnOnce(Expression<'_>) -> anyhow::Result<R>,
) -> anyhow::Result<R> {
    let x = adata.x();
    let guard = x.0.read_inner();

    match guard.deref() {
        ArrayData::Array(DynArray::F64(m)) => {
            f(Expression::Dense(m.view().into_dimensionality::<Ix2>()?))
        }
        ArrayData::CsrMatrix(DynCsrMatrix::F64(m)) => f(Expression::Sparse(m)),
        ArrayData::Array(DynArray::F32(m)) => {
            let widened = m.mapv(f64::from).into_dimensionality::<Ix2>()?;
            f(Expression::Dense(widened.view()))
        }
        ArrayData::CsrMatrix(DynCsrMatrix::F32(m)) => {
            let widened = widen_csr(m)?;
            f(Expression::Sparse(&widened))
        }
        other => Err(DimRedError::InvalidParameter(format!(
            "X must hold f32 or f64 values, got {}",
            other.data_type()
        ))
        .into()),
    }
}

fn widen_csr(m: &CsrMatrix<f32>) -> anyhow::Result<CsrMatrix<f64>> {
    let (offsets, indices, values) = m.csr_data();
    CsrMatrix::try_from_csr_data(
        m.nrows(),
        m.ncols(),
        offsets.to_vec(),
        indices.to_vec(),
        values.iter().map(|&v| f64::from(v)).collect(),
    )
    .map_err(|e| anyhow::anyhow!("X is not a valid CSR matrix: {}", e))
}

/// A column of `var` looked up as a boolean flag.
#[derive(Debug, Clone, PartialEq)]
pub enum VarFlag {
    Bool(Vec<bool>),
    /// The column exists with another dtype, named here.
    Other(String),
    Missing,
}

/// Missing values in a boolean column count as `false`.
pub fn var_flag(adata: &IMAnnData, name: &str) -> VarFlag {
    let var = adata.var().get_data();
    match var.column(name) {
        Err(_) => VarFlag::Missing,
        Ok(column) => match column.bool() {
            Ok(flags) => VarFlag::Bool(flags.into_iter().map(|f| f.unwrap_or(false)).collect()),
            Err(_) => VarFlag::Other(column.dtype().to_string()),
        },
    }
}

pub fn obsm_matrix(adata: &IMAnnData, key: &str) -> anyhow::Result<Option<Array2<f64>>> {
    axis_matrix(&adata.obsm(), "obsm", key)
}

pub fn varm_matrix(adata: &IMAnnData, key: &str) -> anyhow::Result<Option<Array2<f64>>> {
    axis_matrix(&adata.varm(), "varm", key)
}

fn axis_matrix(
    arrays: &IMAxisArrays,
    slot: &str,
    key: &str,
) -> anyhow::Result<Option<Array2<f64>>> {
    if !arrays.keys().iter().any(|k| k == key) {
        return Ok(None);
    }

    let element = arrays.get_array_shallow(key)?;
    let guard = element.0.read_inner();
    match guard.deref() {
        ArrayData::Array(DynArray::F64(m)) => Ok(Some(m.view().into_dimensionality::<Ix2>()?.to_owned())),
        ArrayData::Array(DynArray::F32(m)) => {
            Ok(Some(m.mapv(f64::from).into_dimensionality::<Ix2>()?))
        }
        other => Err(DimRedError::InvalidParameter(format!(
            "{}[\"{}\"] must be a dense float matrix, got {}",
            slot,
            key,
            other.data_type()
        ))
        .into()),
    }
}

/// Stores a cells × k matrix at `obsm[key]`, replacing any previous value.
pub fn put_obsm(adata: &IMAnnData, key: &str, value: Array2<f64>) -> anyhow::Result<()> {
    put_axis_matrix(&adata.obsm(), "obsm", adata.n_obs(), key, value)
}

/// Stores a genes × k matrix at `varm[key]`, replacing any previous value.
pub fn put_varm(adata: &IMAnnData, key: &str, value: Array2<f64>) -> anyhow::Result<()> {
    put_axis_matrix(&adata.varm(), "varm", adata.n_vars(), key, value)
}

fn put_axis_matrix(
    arrays: &IMAxisArrays,
    slot: &str,
    expected_rows: usize,
    key: &str,
    value: Array2<f64>,
) -> anyhow::Result<()> {
    check_rows(&format!("{}[\"{}\"]", slot, key), expected_rows, value.nrows())?;

    let element = IMArrayElement::new(ArrayData::from(value));
    if arrays.keys().iter().any(|k| k == key) {
        arrays.update_array(key, element)
    } else {
        arrays.add_array(key.to_string(), element)
    }
}

pub(crate) fn check_rows(slot: &str, expected: usize, actual: usize) -> anyhow::Result<()> {
    if expected != actual {
        return Err(DimRedError::ShapeMismatch {
            slot: slot.to_string(),
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

pub fn uns_entry(adata: &IMAnnData, key: &str) -> anyhow::Result<Option<Data>> {
    let uns = adata.uns();
    if !uns.keys()?.iter().any(|k| k == key) {
        return Ok(None);
    }
    Ok(Some(uns.get_data(key)?.get_data()?))
}

/// Stores `value` at `uns[key]`, replacing any previous entry.
pub fn put_uns(adata: &IMAnnData, key: &str, value: impl Into<Data>) -> anyhow::Result<()> {
    let uns = adata.uns();
    if uns.keys()?.iter().any(|k| k == key) {
        uns.remove_data(key)?;
    }
    uns.add_data(key.to_string(), IMElement::new(value.into()))
}

/// The record of the last PCA, if one is stored and readable.
pub fn pca_info(adata: &IMAnnData) -> anyhow::Result<Option<PcaInfo>> {
    uns_entry(adata, "pca")?.map(PcaInfo::try_from).transpose()
}

pub fn tsne_info(adata: &IMAnnData) -> anyhow::Result<Option<TsneInfo>> {
    uns_entry(adata, "tsne")?.map(TsneInfo::try_from).transpose()
}

pub fn umap_info(adata: &IMAnnData) -> anyhow::Result<Option<UmapInfo>> {
    uns_entry(adata, "umap")?.map(UmapInfo::try_from).transpose()
}
