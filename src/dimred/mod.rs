//! # Dimensionality Reduction
//!
//! Thin wrappers around the decompositions and embeddings used by the
//! single-cell workflow. The heavy lifting is done elsewhere:
//!
//! - **PCA** ([`pca`]): centring and variance bookkeeping around an [`SvdBackend`](crate::svd::SvdBackend)
//! - **t-SNE** ([`tsne`]): Barnes-Hut t-SNE from `bhtsne`
//! - **UMAP** ([`umap`]): exact neighbours plus the `umap-rs` layout optimiser
//!
//! ## Algorithm Selection Guide
//! - Use **PCA** for linear structure, for feature loadings, and as input to neighbour graphs
//! - Use **t-SNE** for non-linear visualisation of clusters and local structure
//! - Use **UMAP** for the same purpose when global arrangement matters more

pub mod pca;
pub mod tsne;
pub mod umap;
