use crate::candle_loss_functions::GraphReconTarget;
use crate::candle_model_traits::*;
use crate::candle_rmsprop::*;
use crate::candle_sparse_tensor::SparseTensor;

use candle_core::{Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[clap(rename_all = "lowercase")]
pub enum OptimizerType {
    #[clap(alias = "RMSprop")]
    Rmsprop,
    #[clap(alias = "Adam")]
    Adam,
}

pub struct TrainConfig {
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub optimizer: OptimizerType,
    pub num_epochs: usize,
    pub device: Device,
    pub verbose: bool,
    pub show_progress: bool,
}

/// Full-batch training data: features and graphs of every view, all on
/// the same device
pub struct GraphViewData {
    pub features: Vec<Tensor>,
    pub adj_wave: Vec<SparseTensor>,
    pub graph_targets: Vec<GraphReconTarget>,
}

impl GraphViewData {
    /// * `features` - (n x d_v) for each view
    /// * `adj_wave` - normalized adjacency for message passing
    /// * `adj_hat` - adjacency to reconstruct
    pub fn new(
        features: Vec<Tensor>,
        adj_wave: Vec<SparseTensor>,
        adj_hat: &[SparseTensor],
    ) -> anyhow::Result<Self> {
        let nv = features.len();
        if adj_wave.len() != nv || adj_hat.len() != nv {
            anyhow::bail!(
                "{} feature matrices, {} adj_wave, {} adj_hat",
                nv,
                adj_wave.len(),
                adj_hat.len()
            );
        }

        let nn = features
            .first()
            .ok_or(anyhow::anyhow!("no view"))?
            .dims2()?
            .0;

        for v in 0..nv {
            let (n_v, _) = features[v].dims2()?;
            if n_v != nn {
                anyhow::bail!("view {} has {} spots, expected {}", v, n_v, nn);
            }
            if adj_wave[v].shape() != (nn, nn) || adj_hat[v].shape() != (nn, nn) {
                anyhow::bail!(
                    "view {}: adjacency {:?} / {:?}, expected {} x {}",
                    v,
                    adj_wave[v].shape(),
                    adj_hat[v].shape(),
                    nn,
                    nn
                );
            }
        }

        let graph_targets = adj_hat
            .iter()
            .map(GraphReconTarget::new)
            .collect::<candle_core::Result<Vec<_>>>()?;

        Ok(Self {
            features,
            adj_wave,
            graph_targets,
        })
    }

    pub fn num_views(&self) -> usize {
        self.features.len()
    }

    pub fn num_spots(&self) -> usize {
        self.features[0].dims()[0]
    }
}

pub struct TrainOut {
    /// fused embedding (n x k) after the last epoch
    pub embedding: Tensor,
    /// `[total, reconstruction, graph, contrastive, consistency]` per epoch
    pub loss_trace: Vec<[f32; 5]>,
}

/// Train a multi-view graph model on the full batch and return the
/// fused embedding
///
/// * `model` - multi-view graph model
/// * `variable_map` - parameters of the `model`
/// * `data` - features and graphs
/// * `weights` - weights of the auxiliary losses
/// * `train_config` - training configuration
pub fn train_graph_model<M>(
    model: &M,
    variable_map: &VarMap,
    data: &GraphViewData,
    weights: &LossWeights,
    train_config: &TrainConfig,
) -> anyhow::Result<TrainOut>
where
    M: MultiViewGraphModelT,
{
    if data.num_views() != model.num_views() {
        anyhow::bail!(
            "model takes {} views, data has {}",
            model.num_views(),
            data.num_views()
        );
    }

    let loss_trace = match train_config.optimizer {
        OptimizerType::Rmsprop => {
            let opt = RmsProp::new(
                variable_map.all_vars(),
                ParamsRmsProp {
                    lr: train_config.learning_rate,
                    weight_decay: train_config.weight_decay,
                    ..Default::default()
                },
            )?;
            run_epochs(model, opt, data, weights, train_config)?
        }
        OptimizerType::Adam => {
            let opt = AdamW::new(
                variable_map.all_vars(),
                ParamsAdamW {
                    lr: train_config.learning_rate,
                    weight_decay: train_config.weight_decay,
                    ..Default::default()
                },
            )?;
            run_epochs(model, opt, data, weights, train_config)?
        }
    };

    let latent = model.forward(&data.features, &data.adj_wave)?;
    let embedding = latent.fused.detach();

    Ok(TrainOut {
        embedding,
        loss_trace,
    })
}

fn run_epochs<M, O>(
    model: &M,
    mut opt: O,
    data: &GraphViewData,
    weights: &LossWeights,
    train_config: &TrainConfig,
) -> anyhow::Result<Vec<[f32; 5]>>
where
    M: MultiViewGraphModelT,
    O: Optimizer,
{
    let pb = ProgressBar::new(train_config.num_epochs as u64);

    if !train_config.show_progress || train_config.verbose {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let mut loss_trace = Vec::with_capacity(train_config.num_epochs);

    for epoch in 0..train_config.num_epochs {
        let latent = model.forward(&data.features, &data.adj_wave)?;
        let loss = model.loss(&latent, &data.features, &data.graph_targets, weights)?;
        opt.backward_step(&loss.total)?;

        let scores = loss.to_scalars()?;
        if !scores[0].is_finite() {
            anyhow::bail!("loss diverged at epoch {}: {:?}", epoch + 1, scores);
        }
        loss_trace.push(scores);
        pb.inc(1);

        if train_config.verbose {
            info!(
                "[{}] loss: {:.4} (rec {:.4}, graph {:.4}, cl {:.4}, con {:.4})",
                epoch + 1,
                scores[0],
                scores[1],
                scores[2],
                scores[3],
                scores[4]
            );
        }
    }

    pb.finish_and_clear();
    Ok(loss_trace)
}

/// Re-initialize every parameter from a seeded generator
///
/// Matrices get Glorot uniform values and everything else (biases,
/// view logits) starts at zero. Parameters are visited in the order of
/// their names, so the same seed gives the same model on any device.
pub fn reseed_parameters(variable_map: &VarMap, seed: u64) -> anyhow::Result<()> {
    let vars = variable_map
        .data()
        .lock()
        .map_err(|_| anyhow::anyhow!("failed to lock the variable map"))?;

    let mut names: Vec<&String> = vars.keys().collect();
    names.sort();

    let mut rng = SmallRng::seed_from_u64(seed);

    for name in names {
        let var = &vars[name];
        let shape = var.shape().clone();
        let values: Vec<f32> = match shape.dims() {
            &[fan_a, fan_b] => {
                let bound = (6. / (fan_a + fan_b) as f32).sqrt();
                (0..shape.elem_count())
                    .map(|_| rng.random_range(-bound..bound))
                    .collect()
            }
            _ => vec![0_f32; shape.elem_count()],
        };
        let init = Tensor::from_vec(values, shape, var.device())?.to_dtype(var.dtype())?;
        var.set(&init)?;
    }
    Ok(())
}

/// Seed the device generator (where supported) and the parameters
pub fn setup_seed(variable_map: &VarMap, seed: u64, dev: &Device) -> anyhow::Result<()> {
    if !dev.is_cpu() {
        dev.set_seed(seed)?;
    }
    reseed_parameters(variable_map, seed)?;
    info!("seed: {}", seed);
    Ok(())
}
