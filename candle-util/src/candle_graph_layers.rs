use crate::candle_sparse_tensor::SparseTensor;
use candle_core::{Result, Tensor};
use candle_nn::{Activation, Module};

/// A module that passes messages over a fixed graph
pub trait GraphModuleT {
    /// * `x_nd` - node features (n x d)
    /// * `adj_nn` - propagation operator (n x n)
    fn forward_graph(&self, x_nd: &Tensor, adj_nn: &SparseTensor) -> Result<Tensor>;
}

///////////////////////////////
// Graph convolutional layer //
///////////////////////////////

/// `H' = A (H W) + b`
#[derive(Clone, Debug)]
pub struct GraphConvolution {
    in_dim: usize,
    out_dim: usize,
    weight_dk: Tensor,
    bias_k: Option<Tensor>,
}

impl GraphConvolution {
    pub fn new(in_dim: usize, out_dim: usize, weight_dk: Tensor, bias_k: Option<Tensor>) -> Self {
        Self {
            in_dim,
            out_dim,
            weight_dk,
            bias_k,
        }
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight_dk
    }

    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub fn out_dim(&self) -> usize {
        self.out_dim
    }
}

impl GraphModuleT for GraphConvolution {
    fn forward_graph(&self, x_nd: &Tensor, adj_nn: &SparseTensor) -> Result<Tensor> {
        let support_nk = x_nd.matmul(&self.weight_dk)?;
        let h_nk = adj_nn.matmul(&support_nk)?;
        match &self.bias_k {
            Some(bias) => h_nk.broadcast_add(bias),
            None => Ok(h_nk),
        }
    }
}

/// Glorot-initialized graph convolution with variables
/// * `weight` - (in_dim x out_dim)
/// * `bias` - (out_dim)
pub fn graph_convolution(
    in_dim: usize,
    out_dim: usize,
    vb: candle_nn::VarBuilder,
) -> Result<GraphConvolution> {
    let bound = (6. / (in_dim + out_dim) as f64).sqrt();
    let init_ws = candle_nn::init::Init::Uniform {
        lo: -bound,
        up: bound,
    };
    let ws = vb.get_with_hints((in_dim, out_dim), "weight", init_ws)?;
    let bs = vb.get_with_hints(out_dim, "bias", candle_nn::init::ZERO)?;
    Ok(GraphConvolution::new(in_dim, out_dim, ws, Some(bs)))
}

/////////////////////////////////
// stack of graph convolutions //
/////////////////////////////////

/// A stack of alternating graph convolution and activation layers
pub struct GraphStackLayers {
    module_layers: Vec<GraphConvolution>,
    activation_layers: Vec<Option<Activation>>,
}

impl GraphModuleT for GraphStackLayers {
    fn forward_graph(&self, x_nd: &Tensor, adj_nn: &SparseTensor) -> Result<Tensor> {
        let mut h = x_nd.clone();
        for (module, activation) in self.module_layers.iter().zip(self.activation_layers.iter()) {
            h = module.forward_graph(&h, adj_nn)?;
            if let Some(activation) = activation {
                h = activation.forward(&h)?;
            }
        }
        Ok(h)
    }
}

impl GraphStackLayers {
    pub fn new() -> Self {
        Self {
            module_layers: Vec::new(),
            activation_layers: Vec::new(),
        }
    }

    /// Build `dims[0] -> dims[1] -> ... -> dims[L]` with `activation`
    /// between the layers and nothing after the last one.
    ///
    /// Layer `j` keeps its variables under `{j}.*` in `vb`.
    pub fn from_dims(dims: &[usize], activation: Activation, vb: candle_nn::VarBuilder) -> Result<Self> {
        if dims.len() < 2 {
            candle_core::bail!("need at least two dimensions, got {:?}", dims);
        }

        let mut ret = Self::new();
        let num_layers = dims.len() - 1;
        for (j, w) in dims.windows(2).enumerate() {
            let layer = graph_convolution(w[0], w[1], vb.pp(j.to_string()))?;
            if j + 1 < num_layers {
                ret.push_with_act(layer, activation);
            } else {
                ret.push(layer);
            }
        }
        Ok(ret)
    }

    pub fn push_with_act(&mut self, layer: GraphConvolution, activation: Activation) {
        self.module_layers.push(layer);
        self.activation_layers.push(Some(activation));
    }

    pub fn push(&mut self, layer: GraphConvolution) {
        self.module_layers.push(layer);
        self.activation_layers.push(None);
    }

    pub fn num_layers(&self) -> usize {
        self.module_layers.len()
    }

    pub fn in_dim(&self) -> Option<usize> {
        self.module_layers.first().map(|x| x.in_dim())
    }

    pub fn out_dim(&self) -> Option<usize> {
        self.module_layers.last().map(|x| x.out_dim())
    }
}

impl Default for GraphStackLayers {
    fn default() -> Self {
        Self::new()
    }
}
