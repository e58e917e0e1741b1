use candle_core::backprop::GradStore;
use candle_core::{Result, Var};
use candle_nn::Optimizer;

#[derive(Clone, Debug)]
pub struct ParamsRmsProp {
    pub lr: f64,
    /// decay of the running average of squared gradients
    pub alpha: f64,
    pub eps: f64,
    /// L2 penalty added to the gradient
    pub weight_decay: f64,
}

impl Default for ParamsRmsProp {
    fn default() -> Self {
        Self {
            lr: 0.01,
            alpha: 0.99,
            eps: 1e-8,
            weight_decay: 0.,
        }
    }
}

struct VarRmsProp {
    var: Var,
    square_avg: Var,
}

/// RMSprop
///
/// g <- grad + weight_decay * theta
/// v <- alpha * v + (1 - alpha) * g^2
/// theta <- theta - lr * g / (sqrt(v) + eps)
pub struct RmsProp {
    vars: Vec<VarRmsProp>,
    params: ParamsRmsProp,
}

impl Optimizer for RmsProp {
    type Config = ParamsRmsProp;

    fn new(vars: Vec<Var>, params: ParamsRmsProp) -> Result<Self> {
        let vars = vars
            .into_iter()
            .filter(|var| var.dtype().is_float())
            .map(|var| {
                let square_avg = Var::zeros(var.shape(), var.dtype(), var.device())?;
                Ok(VarRmsProp { var, square_avg })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { vars, params })
    }

    fn learning_rate(&self) -> f64 {
        self.params.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.params.lr = lr
    }

    fn step(&mut self, grads: &GradStore) -> Result<()> {
        let ParamsRmsProp {
            lr,
            alpha,
            eps,
            weight_decay,
        } = self.params;

        for var in self.vars.iter() {
            let theta = &var.var;
            if let Some(g) = grads.get(theta) {
                let g = if weight_decay > 0. {
                    g.add(&theta.affine(weight_decay, 0.)?)?
                } else {
                    g.clone()
                };
                let v = var
                    .square_avg
                    .affine(alpha, 0.)?
                    .add(&g.sqr()?.affine(1. - alpha, 0.)?)?;
                let step = g.div(&v.sqrt()?.affine(1., eps)?)?.affine(lr, 0.)?;
                theta.set(&theta.sub(&step)?)?;
                var.square_avg.set(&v)?;
            }
        }
        Ok(())
    }
}
