use crate::embed_common::*;
use candle_core::{Device, Tensor};
use std::path::Path;

/// two omics views per dataset
pub const NUM_VIEWS: usize = 2;

pub struct SmmgclData {
    pub adata: Vec<AnnData>,
    pub features: Vec<Mat>,
    pub spatial: Vec<Option<Mat>>,
    pub adj_wave: Vec<SparseTensor>,
    pub adj_hat: Vec<SparseTensor>,
}

impl SmmgclData {
    pub fn num_spots(&self) -> usize {
        self.features[0].nrows()
    }

    pub fn num_views(&self) -> usize {
        self.features.len()
    }

    pub fn view_dims(&self) -> Vec<usize> {
        self.features.iter().map(|x| x.ncols()).collect()
    }

    pub fn spot_names(&self) -> &[Box<str>] {
        self.adata[0].obs_names()
    }

    pub fn feature_tensors(&self, dev: &Device) -> anyhow::Result<Vec<Tensor>> {
        self.features.iter().map(|x| x.to_tensor(dev)).collect()
    }
}

/// Convert a matrix element into a sparse tensor with the same non-zero
/// pattern and values
pub fn construct_sparse_float_tensor(
    matrix: &MatrixElement,
    dev: &Device,
) -> anyhow::Result<SparseTensor> {
    let triplets = matrix.to_triplets()?;
    Ok(SparseTensor::from_triplets(matrix.shape(), &triplets, dev)?)
}

fn path_str(dir: &Path, file: &str) -> anyhow::Result<String> {
    dir.join(file)
        .to_str()
        .map(|s| s.to_string())
        .ok_or(anyhow::anyhow!("invalid path under {:?}", dir))
}

/// Read the omics views and their graphs of `dataset`
///
/// ```text
/// <data_dir>/<dataset>/adata_omics{1,2}.h5ad
/// <data_dir>/<dataset>/{0,1}_graph_dict.h5
/// ```
pub fn load_dataset(data_dir: &str, dataset: &str, dev: &Device) -> anyhow::Result<SmmgclData> {
    let dir = Path::new(data_dir).join(dataset);
    if !dir.is_dir() {
        anyhow::bail!("no dataset directory: {:?}", dir);
    }

    let mut adata = Vec::with_capacity(NUM_VIEWS);
    let mut features = Vec::with_capacity(NUM_VIEWS);
    let mut spatial = Vec::with_capacity(NUM_VIEWS);
    let mut adj_wave = Vec::with_capacity(NUM_VIEWS);
    let mut adj_hat = Vec::with_capacity(NUM_VIEWS);

    for v in 0..NUM_VIEWS {
        let ad = AnnData::open(&path_str(&dir, &format!("adata_omics{}.h5ad", v + 1))?)?;
        let graph = GraphDict::open(&path_str(&dir, &format!("{}_graph_dict.h5", v))?)?;

        let nn = ad.num_obs();
        if graph.adj_hat.shape() != (nn, nn) || graph.adj_wave.shape() != (nn, nn) {
            anyhow::bail!(
                "view {}: graphs {:?} and {:?} for {} spots",
                v,
                graph.adj_hat.shape(),
                graph.adj_wave.shape(),
                nn
            );
        }

        features.push(ad.x().to_dense()?);
        spatial.push(ad.spatial().cloned());
        adj_wave.push(construct_sparse_float_tensor(&graph.adj_wave, dev)?);
        adj_hat.push(construct_sparse_float_tensor(&graph.adj_hat, dev)?);
        adata.push(ad);
    }

    let nn = features[0].nrows();
    if let Some((v, x)) = features.iter().enumerate().find(|(_, x)| x.nrows() != nn) {
        anyhow::bail!("view {} has {} spots, view 0 has {}", v, x.nrows(), nn);
    }

    if adata[0].obs_names() != adata[1].obs_names() {
        info!("spot names differ between the views; using those of the first view");
    }

    for (v, coords) in spatial.iter().enumerate() {
        match coords {
            Some(coords) => info!("view {}: spatial coordinates {:?}", v, coords.shape()),
            None => info!("view {}: no spatial coordinates", v),
        }
    }

    info!(
        "{}: {} spots, view dims {:?}, graph edges {:?}",
        dataset,
        nn,
        features.iter().map(|x| x.ncols()).collect::<Vec<_>>(),
        adj_hat.iter().map(|a| a.nnz()).collect::<Vec<_>>()
    );

    Ok(SmmgclData {
        adata,
        features,
        spatial,
        adj_wave,
        adj_hat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::*;

    #[test]
    fn load_toy_dataset() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let data_dir = dir.path().to_str().unwrap();
        write_toy_dataset(data_dir, "toy", 10, &[5, 3])?;

        let data = load_dataset(data_dir, "toy", &Device::Cpu)?;
        assert_eq!(data.num_views(), 2);
        assert_eq!(data.num_spots(), 10);
        assert_eq!(data.view_dims(), vec![5, 3]);
        assert_eq!(data.adj_hat[0].shape(), (10, 10));
        assert_eq!(data.adj_wave[1].nnz(), 30);
        assert_eq!(data.spot_names()[0].as_ref(), "spot_0");
        assert!(data.spatial.iter().all(|x| x.is_some()));

        let x = data.feature_tensors(&Device::Cpu)?;
        assert_eq!(x[1].dims(), &[10, 3]);
        Ok(())
    }

    #[test]
    fn mismatched_graph_fails() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let data_dir = dir.path().to_str().unwrap();
        write_toy_dataset(data_dir, "toy", 10, &[5, 3])?;

        // replace view 1's graphs with smaller ones
        write_ring_graph_dict(&format!("{}/toy/1_graph_dict.h5", data_dir), 8)?;
        assert!(load_dataset(data_dir, "toy", &Device::Cpu).is_err());
        assert!(load_dataset(data_dir, "nothing", &Device::Cpu).is_err());
        Ok(())
    }

    #[test]
    fn sparse_tensor_from_dense_element() -> anyhow::Result<()> {
        let mat = Mat::from_row_slice(2, 2, &[0., 0.5, 1., 0.]);
        let sparse = construct_sparse_float_tensor(&MatrixElement::Dense(mat.clone()), &Device::Cpu)?;
        assert_eq!(sparse.nnz(), 2);
        assert_eq!(
            sparse.to_dense()?.to_vec2::<f32>()?,
            vec![vec![0., 0.5], vec![1., 0.]]
        );
        Ok(())
    }
}
