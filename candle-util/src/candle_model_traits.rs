use crate::candle_loss_functions::GraphReconTarget;
use crate::candle_sparse_tensor::SparseTensor;
use candle_core::{Result, Tensor};

/// Everything a multi-view graph model produces in one forward pass
pub struct MultiViewLatent {
    /// view-specific embedding, each (n x k)
    pub view_latent: Vec<Tensor>,
    /// fused embedding (n x k)
    pub fused: Tensor,
    /// fusion weights (n x V)
    pub fusion_weights: Tensor,
    /// reconstructed features, each (n x d_v)
    pub recon: Vec<Tensor>,
    /// soft cluster assignment of each view, each (n x c)
    pub view_assign: Vec<Tensor>,
    /// soft cluster assignment of the fused embedding (n x c)
    pub fused_assign: Tensor,
}

/// Weights of the auxiliary losses
#[derive(Clone, Copy, Debug)]
pub struct LossWeights {
    /// graph reconstruction
    pub rg_weight: f64,
    /// cross-view contrastive
    pub cl_weight: f64,
    /// cluster consistency
    pub con_weight: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            rg_weight: 0.1,
            cl_weight: 0.01,
            con_weight: 0.01,
        }
    }
}

/// The total loss with its unweighted components
pub struct LossTerms {
    pub total: Tensor,
    pub reconstruction: Tensor,
    pub graph: Tensor,
    pub contrastive: Tensor,
    pub consistency: Tensor,
}

impl LossTerms {
    /// `[total, reconstruction, graph, contrastive, consistency]`
    pub fn to_scalars(&self) -> Result<[f32; 5]> {
        Ok([
            self.total.to_scalar::<f32>()?,
            self.reconstruction.to_scalar::<f32>()?,
            self.graph.to_scalar::<f32>()?,
            self.contrastive.to_scalar::<f32>()?,
            self.consistency.to_scalar::<f32>()?,
        ])
    }

    pub fn names() -> [&'static str; 5] {
        ["total", "reconstruction", "graph", "contrastive", "consistency"]
    }
}

pub trait MultiViewGraphModelT {
    /// Encode each view over its graph, fuse, and decode
    ///
    /// # Arguments
    /// * `x_vec` - features of each view, each (n x d_v)
    /// * `adj_vec` - normalized adjacency of each view, each (n x n)
    fn forward(&self, x_vec: &[Tensor], adj_vec: &[SparseTensor]) -> Result<MultiViewLatent>;

    /// Evaluate the training objective of a forward pass
    ///
    /// # Arguments
    /// * `latent` - output of `forward`
    /// * `x_vec` - features of each view
    /// * `graph_vec` - graph reconstruction target of each view
    /// * `weights` - weights of the auxiliary losses
    fn loss(
        &self,
        latent: &MultiViewLatent,
        x_vec: &[Tensor],
        graph_vec: &[GraphReconTarget],
        weights: &LossWeights,
    ) -> Result<LossTerms>;

    fn num_views(&self) -> usize;

    fn dim_obs(&self) -> &[usize];

    fn dim_latent(&self) -> usize;
}
