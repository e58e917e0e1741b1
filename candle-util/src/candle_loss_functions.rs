use crate::candle_sparse_tensor::SparseTensor;
use candle_core::{DType, Result, Tensor};
use candle_nn::ops;

/// Feature reconstruction loss (mean squared error)
///
/// loss = mean_{i,j} [ x(i,j) - xhat(i,j) ]^2
///
/// * `x_nd` - observed data
/// * `hat_nd` - reconstruction
///
pub fn feature_reconstruction_loss(x_nd: &Tensor, hat_nd: &Tensor) -> Result<Tensor> {
    x_nd.sub(hat_nd)?.sqr()?.mean_all()
}

/// Numerically stable `log(1 + exp(x))`
///
/// softplus(x) = max(x, 0) + log(1 + exp(-|x|))
fn softplus(x: &Tensor) -> Result<Tensor> {
    let tail = (x.abs()?.neg()?.exp()? + 1.0)?.log()?;
    x.relu()?.add(&tail)
}

/// Reconstruction target of a graph, precomputed once per view
///
/// * `label_nn` - `{0,1}` indicator of the edges
/// * `pos_weight` - `(n^2 - nnz) / nnz` to balance sparse edges
/// * `norm` - `n^2 / (2 (n^2 - nnz))`
pub struct GraphReconTarget {
    pub label_nn: Tensor,
    pub pos_weight: f64,
    pub norm: f64,
}

impl GraphReconTarget {
    pub fn new(adj_nn: &SparseTensor) -> Result<Self> {
        let label_nn = adj_nn.to_dense_indicator()?;
        let (nrow, ncol) = adj_nn.shape();
        let ntot = (nrow * ncol) as f64;
        let npos = label_nn.sum_all()?.to_dtype(DType::F64)?.to_scalar::<f64>()?;
        let nneg = ntot - npos;

        let pos_weight = if npos > 0. { nneg / npos } else { 1. };
        let norm = if nneg > 0. { ntot / (2. * nneg) } else { 1. };

        Ok(Self {
            label_nn,
            pos_weight,
            norm,
        })
    }
}

/// Graph reconstruction loss: weighted binary cross entropy between
/// `sigmoid(z z')` and the observed edges
///
/// loss = norm * mean_{i,j} [ w y(i,j) softplus(-l(i,j)) + (1 - y(i,j)) softplus(l(i,j)) ]
///
/// where `l = z z'` and `w` is the positive weight
///
/// * `z_nk` - node embedding
/// * `target` - graph to reconstruct
///
pub fn graph_reconstruction_loss(z_nk: &Tensor, target: &GraphReconTarget) -> Result<Tensor> {
    let logits_nn = z_nk.matmul(&z_nk.t()?)?;
    let y_nn = &target.label_nn;

    let sp_pos = softplus(&logits_nn)?;
    let sp_neg = sp_pos.sub(&logits_nn)?;

    let pos_term = (y_nn.mul(&sp_neg)? * target.pos_weight)?;
    let neg_term = y_nn.affine(-1., 1.)?.mul(&sp_pos)?;

    pos_term.add(&neg_term)?.mean_all()? * target.norm
}

/// Scale each row to the unit length
pub fn l2_normalize_rows(z_nk: &Tensor) -> Result<Tensor> {
    let eps = 1e-8;
    let norm_n1 = (z_nk.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    z_nk.broadcast_div(&norm_n1)
}

/// Cross-view contrastive loss (symmetric InfoNCE)
///
/// s(i,j) = cos(a_i, b_j) / tau
/// loss = - 0.5 mean_i [ log softmax_j s(i,j) |_{j=i} + log softmax_j s(j,i) |_{j=i} ]
///
/// Spot `i` in one view is the only positive of spot `i` in the other
/// view.
///
/// * `za_nk` - embedding of view a
/// * `zb_nk` - embedding of view b
/// * `tau` - temperature
///
pub fn contrastive_loss(za_nk: &Tensor, zb_nk: &Tensor, tau: f64) -> Result<Tensor> {
    let (nn, _) = za_nk.dims2()?;
    let za = l2_normalize_rows(za_nk)?;
    let zb = l2_normalize_rows(zb_nk)?;

    let sim_nn = (za.matmul(&zb.t()?)? / tau)?;
    let eye_nn = Tensor::eye(nn, sim_nn.dtype(), sim_nn.device())?;

    let a_to_b = ops::log_softmax(&sim_nn, 1)?.mul(&eye_nn)?.sum(1)?;
    let b_to_a = ops::log_softmax(&sim_nn, 0)?.mul(&eye_nn)?.sum(0)?;

    a_to_b.add(&b_to_a)?.mean_all()? * (-0.5)
}

/// Consistency between view-specific and fused soft cluster assignments
///
/// loss = mean_i sum_c [ q_v(i,c) - q(i,c) ]^2
///
pub fn consistency_loss(q_view_nc: &Tensor, q_fused_nc: &Tensor) -> Result<Tensor> {
    q_view_nc.sub(q_fused_nc)?.sqr()?.sum(1)?.mean_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn softplus_is_stable() -> Result<()> {
        let dev = Device::Cpu;
        let x = Tensor::new(&[-100_f32, 0., 100.], &dev)?;
        let y = softplus(&x)?.to_vec1::<f32>()?;
        approx::assert_abs_diff_eq!(y[0], 0., epsilon = 1e-6);
        approx::assert_abs_diff_eq!(y[1], 2_f32.ln(), epsilon = 1e-6);
        approx::assert_abs_diff_eq!(y[2], 100., epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn mse_of_identical_is_zero() -> Result<()> {
        let dev = Device::Cpu;
        let x = Tensor::arange(0_f32, 12., &dev)?.reshape((3, 4))?;
        let loss = feature_reconstruction_loss(&x, &x)?.to_scalar::<f32>()?;
        assert_eq!(loss, 0.);
        Ok(())
    }

    #[test]
    fn graph_target_weights() -> Result<()> {
        let dev = Device::Cpu;
        let adj = SparseTensor::from_triplets((2, 2), &[(0, 0, 1.), (1, 1, 1.)], &dev)?;
        let target = GraphReconTarget::new(&adj)?;
        approx::assert_abs_diff_eq!(target.pos_weight, 1.0);
        approx::assert_abs_diff_eq!(target.norm, 1.0);
        Ok(())
    }
}
