pub use log::info;

pub type Mat = nalgebra::DMatrix<f32>;

pub use clap::{Args, Parser, Subcommand, ValueEnum};

pub use data_beans::anndata_hdf5::*;
pub use matrix_util::common_io::*;
pub use matrix_util::traits::{ConvertMatOps, IoOps};

pub use candle_util::candle_sparse_tensor::SparseTensor;
pub use candle_util::{candle_core, candle_nn};
