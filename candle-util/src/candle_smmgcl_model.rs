use crate::candle_graph_layers::*;
use crate::candle_loss_functions::*;
use crate::candle_model_traits::*;
use crate::candle_sparse_tensor::SparseTensor;
use crate::candle_view_fusion::*;
use candle_core::{Result, Tensor};
use candle_nn::{ops, Activation, Linear, Module, VarBuilder};

/// temperature of the cross-view contrastive loss
pub const CONTRASTIVE_TAU: f64 = 0.5;

pub struct SmmgclModelArgs<'a> {
    pub view_dims: &'a [usize],
    pub hidden_dims: &'a [usize],
    pub num_clusters: usize,
    pub fusion_type: FusionType,
}

/// Multi-view graph convolutional model with view fusion
///
/// ```text
/// x[v] --GCN(adj[v])--> z[v] --fusion--> z --GCN(adj[v])--> xhat[v]
///                        |               |
///                        +-- cluster head +--> q[v], q
/// ```
pub struct SmmgclModel {
    view_dims: Vec<usize>,
    dim_latent: usize,
    num_clusters: usize,
    encoders: Vec<GraphStackLayers>,
    decoders: Vec<GraphStackLayers>,
    fusion: ViewFusion,
    cluster_head: Linear,
}

impl SmmgclModel {
    /// Will create a new model with these variables:
    ///
    /// * `enc.{v}.{j}.weight`, `enc.{v}.{j}.bias` for view `v`, layer `j`
    /// * `dec.{v}.{j}.weight`, `dec.{v}.{j}.bias`
    /// * `fusion.*`
    /// * `cluster.weight`, `cluster.bias`
    ///
    /// # Arguments
    /// * `view_dims` - feature dimension of each view
    /// * `hidden_dims` - encoder layers; the last one is the latent dimension
    /// * `num_clusters` - dimension of the soft cluster assignment
    /// * `fusion_type` - how to combine the views
    /// * `vb` - variable builder
    pub fn new(args: SmmgclModelArgs, vb: VarBuilder) -> Result<Self> {
        if args.view_dims.is_empty() {
            candle_core::bail!("need at least one view");
        }
        if args.hidden_dims.is_empty() {
            candle_core::bail!("need at least one hidden dimension");
        }
        if args.num_clusters == 0 {
            candle_core::bail!("need at least one cluster");
        }

        let dim_latent = *args.hidden_dims.last().unwrap_or(&1);
        let num_views = args.view_dims.len();

        let mut encoders = Vec::with_capacity(num_views);
        let mut decoders = Vec::with_capacity(num_views);

        for (v, &d_v) in args.view_dims.iter().enumerate() {
            let enc_dims: Vec<usize> = std::iter::once(d_v)
                .chain(args.hidden_dims.iter().copied())
                .collect();
            let dec_dims: Vec<usize> = enc_dims.iter().rev().copied().collect();

            encoders.push(GraphStackLayers::from_dims(
                &enc_dims,
                Activation::Relu,
                vb.pp(format!("enc.{}", v)),
            )?);
            decoders.push(GraphStackLayers::from_dims(
                &dec_dims,
                Activation::Relu,
                vb.pp(format!("dec.{}", v)),
            )?);
        }

        let fusion = ViewFusion::new(
            args.fusion_type,
            num_views,
            dim_latent,
            dim_latent,
            vb.pp("fusion"),
        )?;

        let cluster_head = candle_nn::linear(dim_latent, args.num_clusters, vb.pp("cluster"))?;

        Ok(Self {
            view_dims: args.view_dims.to_vec(),
            dim_latent,
            num_clusters: args.num_clusters,
            encoders,
            decoders,
            fusion,
            cluster_head,
        })
    }

    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    fn soft_assign(&self, z_nk: &Tensor) -> Result<Tensor> {
        ops::softmax(&self.cluster_head.forward(z_nk)?, 1)
    }

    fn check_views(&self, x_vec: &[Tensor], num_graphs: usize) -> Result<()> {
        if x_vec.len() != self.num_views() || num_graphs != self.num_views() {
            candle_core::bail!(
                "expected {} views, got {} feature matrices and {} graphs",
                self.num_views(),
                x_vec.len(),
                num_graphs
            );
        }
        Ok(())
    }
}

impl MultiViewGraphModelT for SmmgclModel {
    fn forward(&self, x_vec: &[Tensor], adj_vec: &[SparseTensor]) -> Result<MultiViewLatent> {
        self.check_views(x_vec, adj_vec.len())?;

        let view_latent = self
            .encoders
            .iter()
            .zip(x_vec.iter().zip(adj_vec))
            .map(|(enc, (x_nd, adj))| enc.forward_graph(x_nd, adj))
            .collect::<Result<Vec<_>>>()?;

        let (fused, fusion_weights) = self.fusion.forward(&view_latent)?;

        let recon = self
            .decoders
            .iter()
            .zip(adj_vec)
            .map(|(dec, adj)| dec.forward_graph(&fused, adj))
            .collect::<Result<Vec<_>>>()?;

        let view_assign = view_latent
            .iter()
            .map(|z_nk| self.soft_assign(z_nk))
            .collect::<Result<Vec<_>>>()?;

        let fused_assign = self.soft_assign(&fused)?;

        Ok(MultiViewLatent {
            view_latent,
            fused,
            fusion_weights,
            recon,
            view_assign,
            fused_assign,
        })
    }

    fn loss(
        &self,
        latent: &MultiViewLatent,
        x_vec: &[Tensor],
        graph_vec: &[GraphReconTarget],
        weights: &LossWeights,
    ) -> Result<LossTerms> {
        self.check_views(x_vec, graph_vec.len())?;

        let dev = latent.fused.device();
        let zero = || Tensor::zeros((), latent.fused.dtype(), dev);

        let mut reconstruction = zero()?;
        let mut graph = zero()?;
        let mut contrastive = zero()?;
        let mut consistency = zero()?;

        for (v, x_nd) in x_vec.iter().enumerate() {
            reconstruction =
                reconstruction.add(&feature_reconstruction_loss(x_nd, &latent.recon[v])?)?;
            graph = graph.add(&graph_reconstruction_loss(
                &latent.view_latent[v],
                &graph_vec[v],
            )?)?;
            consistency = consistency.add(&consistency_loss(
                &latent.view_assign[v],
                &latent.fused_assign,
            )?)?;
        }

        let nv = self.num_views();
        for a in 0..nv {
            for b in (a + 1)..nv {
                contrastive = contrastive.add(&contrastive_loss(
                    &latent.view_latent[a],
                    &latent.view_latent[b],
                    CONTRASTIVE_TAU,
                )?)?;
            }
        }

        let total = reconstruction
            .add(&(&graph * weights.rg_weight)?)?
            .add(&(&contrastive * weights.cl_weight)?)?
            .add(&(&consistency * weights.con_weight)?)?;

        Ok(LossTerms {
            total,
            reconstruction,
            graph,
            contrastive,
            consistency,
        })
    }

    fn num_views(&self) -> usize {
        self.view_dims.len()
    }

    fn dim_obs(&self) -> &[usize] {
        &self.view_dims
    }

    fn dim_latent(&self) -> usize {
        self.dim_latent
    }
}
