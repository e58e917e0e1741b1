use candle_core::{Result, Tensor};
use candle_nn::{ops, Linear, Module, VarBuilder};

/// How to combine view-specific embeddings into one
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[clap(rename_all = "lowercase")]
pub enum FusionType {
    /// node-wise attention over views
    Att,
    /// plain average
    Mean,
    /// learnable global view weights
    Weight,
}

/// Combine `V` view embeddings `z[v]` (n x k) into `z` (n x k)
///
/// * `att`: `s[i,v] = q' tanh(W z[i,v] + b)`, `a[i,.] = softmax(s[i,.])`
/// * `mean`: `a[i,v] = 1/V`
/// * `weight`: `a[i,.] = softmax(w)` shared by all nodes
///
/// `z[i] = sum_v a[i,v] z[i,v]`
pub struct ViewFusion {
    fusion_type: FusionType,
    num_views: usize,
    att_proj: Option<Linear>,
    att_query: Option<Linear>,
    logit_view_weights: Option<Tensor>,
}

impl ViewFusion {
    /// Will create these variables depending on `fusion_type`:
    ///
    /// * `att.proj.{weight,bias}` and `att.query.weight` for `att`
    /// * `view.logits` for `weight`
    ///
    /// * `num_views` - number of views to combine
    /// * `dim_latent` - embedding dimension of each view
    /// * `dim_att` - hidden dimension of the attention projection
    pub fn new(
        fusion_type: FusionType,
        num_views: usize,
        dim_latent: usize,
        dim_att: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let (att_proj, att_query) = match fusion_type {
            FusionType::Att => (
                Some(candle_nn::linear(dim_latent, dim_att, vb.pp("att.proj"))?),
                Some(candle_nn::linear_no_bias(dim_att, 1, vb.pp("att.query"))?),
            ),
            _ => (None, None),
        };

        let logit_view_weights = match fusion_type {
            FusionType::Weight => Some(vb.get_with_hints(
                num_views,
                "view.logits",
                candle_nn::init::ZERO,
            )?),
            _ => None,
        };

        Ok(Self {
            fusion_type,
            num_views,
            att_proj,
            att_query,
            logit_view_weights,
        })
    }

    pub fn fusion_type(&self) -> FusionType {
        self.fusion_type
    }

    /// Fuse view embeddings
    ///
    /// # Returns `(z_nk, weights_nv)`
    pub fn forward(&self, z_vec: &[Tensor]) -> Result<(Tensor, Tensor)> {
        if z_vec.len() != self.num_views {
            candle_core::bail!("expected {} views, got {}", self.num_views, z_vec.len());
        }

        let (nn, _) = z_vec[0].dims2()?;
        let dev = z_vec[0].device();
        let dtype = z_vec[0].dtype();

        let weights_nv = match self.fusion_type {
            FusionType::Mean => {
                (Tensor::ones((nn, self.num_views), dtype, dev)? / self.num_views as f64)?
            }
            FusionType::Weight => {
                let logits = self
                    .logit_view_weights
                    .as_ref()
                    .ok_or_else(|| candle_core::Error::Msg("missing view logits".into()))?;
                ops::softmax(logits, 0)?
                    .unsqueeze(0)?
                    .broadcast_as((nn, self.num_views))?
                    .contiguous()?
            }
            FusionType::Att => {
                let (proj, query) = match (&self.att_proj, &self.att_query) {
                    (Some(proj), Some(query)) => (proj, query),
                    _ => candle_core::bail!("missing attention layers"),
                };
                let scores = z_vec
                    .iter()
                    .map(|z_nk| query.forward(&proj.forward(z_nk)?.tanh()?))
                    .collect::<Result<Vec<_>>>()?;
                ops::softmax(&Tensor::cat(&scores, 1)?, 1)?
            }
        };

        let z_nvk = Tensor::stack(z_vec, 1)?;
        let z_nk = z_nvk.broadcast_mul(&weights_nv.unsqueeze(2)?)?.sum(1)?;
        Ok((z_nk, weights_nv))
    }
}
