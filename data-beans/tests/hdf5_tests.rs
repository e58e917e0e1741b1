use data_beans::anndata_hdf5::*;
use data_beans::misc::*;
use matrix_util::dmatrix_util::DMatrix;

fn spot_names(n: usize) -> Vec<Box<str>> {
    (0..n).map(|i| format!("spot_{}", i).into_boxed_str()).collect()
}

/// X = [[1, 0, 2], [0, 0, 3], [4, 0, 0], [0, 5, 0]]
fn dense_x() -> ndarray::Array2<f32> {
    ndarray::arr2(&[[1., 0., 2.], [0., 0., 3.], [4., 0., 0.], [0., 5., 0.]])
}

fn write_obs(file: &hdf5::File, n: usize) -> anyhow::Result<()> {
    let obs = file.create_group("obs")?;
    write_string_attr(&obs, "encoding-type", "dataframe")?;
    write_string_attr(&obs, "_index", "_index")?;
    write_hdf5_strings(&obs, "_index", &spot_names(n))?;

    let obsm = file.create_group("obsm")?;
    let coords = ndarray::Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
    obsm.new_dataset::<f64>()
        .shape((n, 2))
        .create("spatial")?
        .write(&coords)?;
    Ok(())
}

fn write_csr(
    group: &hdf5::Group,
    name: &str,
    shape: (usize, usize),
    data: &[f32],
    indices: &[i32],
    indptr: &[i32],
) -> anyhow::Result<()> {
    let g = group.create_group(name)?;
    write_string_attr(&g, "encoding-type", "csr_matrix")?;
    g.new_attr::<u64>()
        .shape(2)
        .create("shape")?
        .write(&[shape.0 as u64, shape.1 as u64])?;
    g.new_dataset::<f32>().shape(data.len()).create("data")?.write(data)?;
    g.new_dataset::<i32>()
        .shape(indices.len())
        .create("indices")?
        .write(indices)?;
    g.new_dataset::<i32>()
        .shape(indptr.len())
        .create("indptr")?
        .write(indptr)?;
    Ok(())
}

#[test]
fn dense_and_sparse_x_agree() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let dense_file = dir.path().join("dense.h5ad");
    let sparse_file = dir.path().join("sparse.h5ad");

    {
        let file = hdf5::File::create(&dense_file)?;
        file.new_dataset::<f32>()
            .shape((4, 3))
            .create("X")?
            .write(&dense_x())?;
        write_obs(&file, 4)?;
    }
    {
        let file = hdf5::File::create(&sparse_file)?;
        write_csr(
            &file,
            "X",
            (4, 3),
            &[1., 2., 3., 4., 5.],
            &[0, 2, 2, 0, 1],
            &[0, 2, 3, 4, 5],
        )?;
        write_obs(&file, 4)?;
    }

    let dense = AnnData::open(dense_file.to_str().unwrap())?;
    let sparse = AnnData::open(sparse_file.to_str().unwrap())?;

    assert_eq!(dense.num_obs(), 4);
    assert_eq!(dense.num_vars(), 3);
    assert_eq!(dense.x().to_dense()?, sparse.x().to_dense()?);
    assert_eq!(sparse.x().to_triplets()?.len(), 5);
    assert_eq!(dense.obs_names(), spot_names(4).as_slice());

    let spatial = sparse.spatial().unwrap();
    assert_eq!(spatial.shape(), (4, 2));
    approx::assert_abs_diff_eq!(spatial[(3, 1)], 7.);
    Ok(())
}

#[test]
fn missing_obs_names_fall_back_to_numbers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file_name = dir.path().join("bare.h5ad");
    {
        let file = hdf5::File::create(&file_name)?;
        file.new_dataset::<f32>()
            .shape((4, 3))
            .create("X")?
            .write(&dense_x())?;
    }
    let adata = AnnData::open(file_name.to_str().unwrap())?;
    assert_eq!(adata.obs_names()[3].as_ref(), "3");
    assert!(adata.spatial().is_none());
    Ok(())
}

#[test]
fn write_annotated_adds_embedding_and_labels() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let src = dir.path().join("in.h5ad");
    let dst = dir.path().join("out.h5ad");
    {
        let file = hdf5::File::create(&src)?;
        file.new_dataset::<f32>()
            .shape((4, 3))
            .create("X")?
            .write(&dense_x())?;
        write_obs(&file, 4)?;
    }

    let adata = AnnData::open(src.to_str().unwrap())?;
    let embedding = DMatrix::<f32>::from_row_slice(4, 2, &[0., 1., 2., 3., 4., 5., 6., 7.]);
    let labels: Vec<Box<str>> = ["1", "0", "1", "2"].iter().map(|&x| x.into()).collect();

    // twice: the second write replaces the first
    for _ in 0..2 {
        adata.write_annotated(dst.to_str().unwrap(), "embedding", &embedding, "y_pred", &labels)?;
    }

    let file = hdf5::File::open(&dst)?;
    let emb = file.dataset("obsm/embedding")?.read_2d::<f32>()?;
    assert_eq!(emb.dim(), (4, 2));
    assert_eq!(emb[(2, 1)], 5.);

    let obs = file.group("obs")?;
    assert_eq!(read_categorical(&obs, "y_pred")?, labels);
    assert_eq!(read_string_attr(&obs.group("y_pred")?, "encoding-type")?, "categorical");

    let column_order = read_hdf5_strings(&obs.attr("column-order")?)?;
    assert_eq!(column_order, vec![Box::<str>::from("y_pred")]);

    // the source stays untouched
    let src_file = hdf5::File::open(&src)?;
    assert!(!src_file.link_exists("obsm/embedding"));

    let bad = adata.write_annotated(
        dst.to_str().unwrap(),
        "embedding",
        &DMatrix::<f32>::zeros(3, 2),
        "y_pred",
        &labels,
    );
    assert!(bad.is_err());
    Ok(())
}

#[test]
fn graph_dict_reads_dense_and_sparse() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file_name = dir.path().join("0_graph_dict.h5");
    {
        let file = hdf5::File::create(&file_name)?;
        let adj_hat = ndarray::arr2(&[[1_f32, 1., 0.], [1., 1., 1.], [0., 1., 1.]]);
        file.new_dataset::<f32>()
            .shape((3, 3))
            .create("adj_hat")?
            .write(&adj_hat)?;
        write_csr(
            &file,
            "adj_wave",
            (3, 3),
            &[0.5, 0.5, 0.3, 0.4, 0.3, 0.5, 0.5],
            &[0, 1, 0, 1, 2, 1, 2],
            &[0, 2, 5, 7],
        )?;
    }

    let graph = GraphDict::open(file_name.to_str().unwrap())?;
    assert_eq!(graph.adj_hat.shape(), (3, 3));
    assert_eq!(graph.adj_hat.to_triplets()?.len(), 7);

    let wave = graph.adj_wave.to_dense()?;
    approx::assert_abs_diff_eq!(wave[(1, 2)], 0.3);
    approx::assert_abs_diff_eq!(wave[(2, 0)], 0.);
    Ok(())
}

#[test]
fn missing_graph_entry_fails() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file_name = dir.path().join("1_graph_dict.h5");
    {
        let file = hdf5::File::create(&file_name)?;
        file.new_dataset::<f32>()
            .shape((2, 2))
            .create("adj_hat")?
            .write(&ndarray::Array2::<f32>::eye(2))?;
    }
    assert!(GraphDict::open(file_name.to_str().unwrap()).is_err());
    Ok(())
}
