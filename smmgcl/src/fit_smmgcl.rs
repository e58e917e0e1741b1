use crate::embed_common::*;
use crate::smmgcl_input::*;

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use candle_util::candle_graph_inference::*;
use candle_util::candle_model_traits::*;
use candle_util::candle_smmgcl_model::*;
use candle_util::candle_view_fusion::FusionType;
use matrix_util::clustering::{kmeans_clustering, KmeansArgs};
use std::path::Path;

#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
enum ComputeDevice {
    Cpu,
    Cuda,
    Metal,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// random seed
    #[arg(long, default_value_t = 100)]
    seed: u64,

    /// weight decay
    #[arg(long, default_value_t = 1e-5)]
    weight_decay: f64,

    /// optimizer
    #[arg(long, value_enum, default_value = "rmsprop")]
    optimizer: OptimizerType,

    /// learning rate
    #[arg(long, default_value_t = 1e-5)]
    lr: f64,

    /// candle device
    #[arg(long, value_enum, default_value = "cpu")]
    device: ComputeDevice,

    /// device ordinal for cuda or metal
    #[arg(long, default_value_t = 0)]
    cuda_device: usize,

    /// how to fuse the view embeddings
    #[arg(long, value_enum, default_value = "att")]
    fusion_type: FusionType,

    /// weight of the graph reconstruction loss
    #[arg(long, default_value_t = 0.1)]
    rg_weight: f64,

    /// weight of the cross-view contrastive loss
    #[arg(long, default_value_t = 0.01)]
    cl_weight: f64,

    /// weight of the cluster consistency loss
    #[arg(long, default_value_t = 0.01)]
    con_weight: f64,

    /// # training epochs
    #[arg(long, default_value_t = 300)]
    num_epochs: usize,

    /// number of clusters
    #[arg(long, default_value_t = 5)]
    num_clusters: usize,

    /// encoder layers; the last one is the embedding dimension
    #[arg(long, value_delimiter(','), default_values_t = vec![32])]
    hidden_dims: Vec<usize>,

    /// dataset names (comma-separated)
    #[arg(long, value_delimiter(','), default_values_t = vec!["Dataset1_Mouse_Spleen1".to_string()])]
    dataset: Vec<String>,

    /// input directory with one sub-directory per dataset
    #[arg(long, default_value = "../generate_data")]
    data_dir: String,

    /// output directory; results go to `<out_dir>/<dataset>/`
    #[arg(long, default_value = "./result")]
    out_dir: String,

    /// k-means restarts
    #[arg(long, default_value_t = 5)]
    kmeans_init: usize,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn fit_smmgcl(args: &TrainArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = env_logger::try_init();

    let dev = match args.device {
        ComputeDevice::Metal => Device::new_metal(args.cuda_device)?,
        ComputeDevice::Cuda => Device::new_cuda(args.cuda_device)?,
        _ => Device::Cpu,
    };

    for dataset in args.dataset.iter() {
        info!("dataset: {}", dataset);
        fit_one_dataset(args, dataset, &dev)?;
    }

    Ok(())
}

fn out_file(save_path: &Path, name: &str) -> anyhow::Result<String> {
    save_path
        .join(name)
        .to_str()
        .map(|s| s.to_string())
        .ok_or(anyhow::anyhow!("invalid output path under {:?}", save_path))
}

fn fit_one_dataset(args: &TrainArgs, dataset: &str, dev: &Device) -> anyhow::Result<()> {
    let save_path = Path::new(&args.out_dir).join(dataset);
    std::fs::create_dir_all(&save_path)?;

    // 1. Read the data
    let data = load_dataset(&args.data_dir, dataset, dev)?;
    let nn = data.num_spots();
    let view_dims = data.view_dims();

    if args.num_clusters == 0 || args.num_clusters > nn {
        anyhow::bail!("{} clusters for {} spots", args.num_clusters, nn);
    }

    let train_data = GraphViewData::new(
        data.feature_tensors(dev)?,
        data.adj_wave.clone(),
        &data.adj_hat,
    )?;

    // 2. Build the model
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, dev);

    let model = SmmgclModel::new(
        SmmgclModelArgs {
            view_dims: &view_dims,
            hidden_dims: &args.hidden_dims,
            num_clusters: args.num_clusters,
            fusion_type: args.fusion_type,
        },
        vb,
    )?;

    setup_seed(&varmap, args.seed, dev)?;

    info!(
        "model: {} views {:?} -> {:?}, {} clusters, {:?} fusion",
        data.num_views(),
        view_dims,
        args.hidden_dims,
        args.num_clusters,
        args.fusion_type
    );

    // 3. Train
    let train_config = TrainConfig {
        learning_rate: args.lr,
        weight_decay: args.weight_decay,
        optimizer: args.optimizer,
        num_epochs: args.num_epochs,
        device: dev.clone(),
        verbose: args.verbose,
        show_progress: true,
    };

    let weights = LossWeights {
        rg_weight: args.rg_weight,
        cl_weight: args.cl_weight,
        con_weight: args.con_weight,
    };

    let out = train_graph_model(&model, &varmap, &train_data, &weights, &train_config)?;

    if let Some(last) = out.loss_trace.last() {
        info!("final loss: {:?}", last);
    }

    // 4. Cluster the embedding
    let embedding = Mat::from_tensor(&out.embedding)?;
    info!("embedding: {} x {}", embedding.nrows(), embedding.ncols());

    let clusters = kmeans_clustering(
        &embedding,
        KmeansArgs {
            num_clusters: args.num_clusters,
            num_init: args.kmeans_init,
            ..Default::default()
        },
    )?;
    info!("\n{}", clusters.histogram_ascii(50, args.num_clusters));

    let labels: Vec<Box<str>> = clusters
        .labels
        .iter()
        .map(|k| k.to_string().into_boxed_str())
        .collect();

    // 5. Write the results
    for (v, adata) in data.adata.iter().enumerate() {
        let file_name = out_file(&save_path, &format!("adata{}.h5ad", v + 1))?;
        adata.write_annotated(&file_name, "embedding", &embedding, "y_pred", &labels)?;
    }

    let spot_names = data.spot_names();

    embedding.to_parquet(
        Some(spot_names),
        None,
        &out_file(&save_path, "embedding.parquet")?,
    )?;

    let num_epochs = out.loss_trace.len();
    let loss_trace = Mat::from_row_iterator(
        num_epochs,
        LossTerms::names().len(),
        out.loss_trace.iter().flatten().copied(),
    );
    let epochs: Vec<Box<str>> = (1..=num_epochs)
        .map(|t| t.to_string().into_boxed_str())
        .collect();
    let loss_names: Vec<Box<str>> = LossTerms::names().iter().map(|&x| x.into()).collect();
    loss_trace.to_parquet(
        Some(epochs.as_slice()),
        Some(loss_names.as_slice()),
        &out_file(&save_path, "loss_trace.parquet")?,
    )?;

    let y_pred_lines: Vec<Box<str>> = std::iter::once(Box::<str>::from("spot\ty_pred"))
        .chain(
            spot_names
                .iter()
                .zip(labels.iter())
                .map(|(s, k)| format!("{}\t{}", s, k).into_boxed_str()),
        )
        .collect();
    write_lines(&y_pred_lines, &out_file(&save_path, "y_pred.tsv.gz")?)?;

    info!("results in {:?}", save_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::*;
    use data_beans::misc::read_string_attr;
    use matrix_util::parquet::ParquetReader;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        args: TrainArgs,
    }

    #[test]
    fn default_arguments() -> anyhow::Result<()> {
        let cli = TestCli::try_parse_from(["smmgcl"])?;
        let args = cli.args;
        assert_eq!(args.seed, 100);
        assert_eq!(args.optimizer, OptimizerType::Rmsprop);
        assert_eq!(args.fusion_type, FusionType::Att);
        assert_eq!(args.num_epochs, 300);
        assert_eq!(args.num_clusters, 5);
        assert_eq!(args.hidden_dims, vec![32]);
        assert_eq!(args.dataset, vec!["Dataset1_Mouse_Spleen1".to_string()]);
        assert_eq!(args.kmeans_init, 5);
        approx::assert_abs_diff_eq!(args.lr, 1e-5);
        approx::assert_abs_diff_eq!(args.weight_decay, 1e-5);
        approx::assert_abs_diff_eq!(args.rg_weight, 0.1);
        Ok(())
    }

    #[test]
    fn train_and_write_toy_dataset() -> anyhow::Result<()> {
        let data_dir = tempfile::tempdir()?;
        let out_dir = tempfile::tempdir()?;
        let data_dir_str = data_dir.path().to_str().unwrap();
        let out_dir_str = out_dir.path().to_str().unwrap();

        write_toy_dataset(data_dir_str, "toy", 12, &[6, 4])?;

        let cli = TestCli::try_parse_from([
            "smmgcl",
            "--data-dir",
            data_dir_str,
            "--out-dir",
            out_dir_str,
            "--dataset",
            "toy",
            "--num-epochs",
            "5",
            "--num-clusters",
            "3",
            "--hidden-dims",
            "8,4",
            "--optimizer",
            "adam",
            "--lr",
            "0.01",
            "--fusion-type",
            "weight",
        ])?;
        fit_smmgcl(&cli.args)?;

        let save_path = out_dir.path().join("toy");
        for v in 1..=2 {
            let file = hdf5::File::open(save_path.join(format!("adata{}.h5ad", v)))?;
            let emb = file.dataset("obsm/embedding")?.read_2d::<f32>()?;
            assert_eq!(emb.dim(), (12, 4));

            let obs = file.group("obs")?;
            let labels = read_categorical(&obs, "y_pred")?;
            assert_eq!(labels.len(), 12);
            assert!(labels.iter().all(|k| ["0", "1", "2"].contains(&k.as_ref())));
            assert_eq!(read_string_attr(&obs, "_index")?, "_index");
        }

        let loss = ParquetReader::new(save_path.join("loss_trace.parquet").to_str().unwrap())?;
        assert_eq!(loss.row_names.len(), 5);
        assert_eq!(loss.column_names.len(), 5);
        assert!(loss.row_major_data.iter().all(|x| x.is_finite()));

        let emb = ParquetReader::new(save_path.join("embedding.parquet").to_str().unwrap())?;
        assert_eq!(emb.row_names[11].as_ref(), "spot_11");
        assert_eq!(emb.row_major_data.len(), 12 * 4);

        let lines = read_lines(save_path.join("y_pred.tsv.gz").to_str().unwrap())?;
        assert_eq!(lines.len(), 13);
        assert!(lines[1].starts_with("spot_0\t"));
        Ok(())
    }

    #[test]
    fn too_many_clusters_fail() -> anyhow::Result<()> {
        let data_dir = tempfile::tempdir()?;
        let out_dir = tempfile::tempdir()?;
        let data_dir_str = data_dir.path().to_str().unwrap();
        let out_dir_str = out_dir.path().to_str().unwrap();

        write_toy_dataset(data_dir_str, "toy", 6, &[3, 3])?;

        let cli = TestCli::try_parse_from([
            "smmgcl",
            "--data-dir",
            data_dir_str,
            "--out-dir",
            out_dir_str,
            "--dataset",
            "toy",
            "--num-clusters",
            "7",
        ])?;
        assert!(fit_smmgcl(&cli.args).is_err());
        Ok(())
    }
}
