use nalgebra_sparse::CsrMatrix;
use ndarray::{Array2, Axis};
use rayon::prelude::*;

use super::{MatrixDensify, MatrixSum};

impl MatrixDensify for CsrMatrix<f64> {
    fn to_dense_all(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.nrows(), self.ncols()));
        dense
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row_idx, mut out)| {
                let row = self.row(row_idx);
                for (&col_idx, &value) in row.col_indices().iter().zip(row.values().iter()) {
                    out[col_idx] = value;
                }
            });
        dense
    }
}

impl MatrixSum for CsrMatrix<f64> {
    fn sum_col(&self) -> anyhow::Result<Vec<f64>> {
        let mut result = vec![0.0; self.ncols()];
        for (&col_index, &value) in self.col_indices().iter().zip(self.values().iter()) {
            result[col_index] += value;
        }
        Ok(result)
    }

    fn sum_col_squared(&self) -> anyhow::Result<Vec<f64>> {
        let mut result = vec![0.0; self.ncols()];
        for (&col_index, &value) in self.col_indices().iter().zip(self.values().iter()) {
            result[col_index] += value * value;
        }
        Ok(result)
    }
}
