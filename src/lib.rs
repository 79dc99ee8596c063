pub mod data;
pub mod dimred;
pub mod error;
pub mod plot;
pub mod reduction;
pub mod sparse;
pub mod svd;

pub use data::{from_matrix, into_shared, SharedAnnData};
pub use error::DimRedError;
pub use plot::{VarianceFigure, VariancePlotParams};
pub use reduction::{DimensionalityReduction, PcaOutput, PcaParams, TsneParams, UmapParams};
pub use svd::SvdSolver;
