pub mod anndata_hdf5; // AnnData (.h5ad) and graph dictionaries
pub mod misc; // hdf5 string helpers
pub mod sparse_util; // sparse matrix triplets utils
