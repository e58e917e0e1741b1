pub mod candle_graph_inference;
pub mod candle_graph_layers;
pub mod candle_loss_functions;
pub mod candle_model_traits;
pub mod candle_rmsprop;
pub mod candle_smmgcl_model;
pub mod candle_sparse_tensor;
pub mod candle_view_fusion;

pub use candle_core;
pub use candle_nn;
