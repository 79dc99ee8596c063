use ndarray::Array2;

pub mod csr;

/// Conversion of a sparse expression matrix into a dense one.
pub trait MatrixDensify {
    fn to_dense_all(&self) -> Array2<f64>;
}

pub trait MatrixSum {
    fn sum_col(&self) -> anyhow::Result<Vec<f64>>;

    /// Column sums of the squared entries.
    fn sum_col_squared(&self) -> anyhow::Result<Vec<f64>>;
}
