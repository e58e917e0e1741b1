use data_beans::misc::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// ring neighbours with self-loops: `adj_hat` dense, `adj_wave` CSR
pub fn write_ring_graph_dict(file_name: &str, nn: usize) -> anyhow::Result<()> {
    let file = hdf5::File::create(file_name)?;

    let adj_hat = ndarray::Array2::from_shape_fn((nn, nn), |(i, j)| {
        if i == j || (i + 1) % nn == j || (j + 1) % nn == i {
            1_f32
        } else {
            0.
        }
    });
    file.new_dataset::<f32>()
        .shape((nn, nn))
        .create("adj_hat")?
        .write(&adj_hat)?;

    let mut data = vec![];
    let mut indices = vec![];
    let mut indptr = vec![0_u64];
    for i in 0..nn {
        let mut nbrs = vec![(i + nn - 1) % nn, i, (i + 1) % nn];
        nbrs.sort();
        for j in nbrs {
            indices.push(j as u64);
            data.push(1_f32 / 3.);
        }
        indptr.push(indices.len() as u64);
    }

    let wave = file.create_group("adj_wave")?;
    write_string_attr(&wave, "encoding-type", "csr_matrix")?;
    wave.new_attr::<u64>()
        .shape(2)
        .create("shape")?
        .write(&[nn as u64, nn as u64])?;
    wave.new_dataset::<f32>()
        .shape(data.len())
        .create("data")?
        .write(&data)?;
    wave.new_dataset::<u64>()
        .shape(indices.len())
        .create("indices")?
        .write(&indices)?;
    wave.new_dataset::<u64>()
        .shape(indptr.len())
        .create("indptr")?
        .write(&indptr)?;
    Ok(())
}

/// dense `X` with three groups of spots, spot names and coordinates
pub fn write_toy_h5ad(file_name: &str, nn: usize, dd: usize, seed: u64) -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let noise = Normal::new(0_f32, 0.1)?;

    let x = ndarray::Array2::from_shape_fn((nn, dd), |(i, j)| {
        let centre = if j % 3 == i % 3 { 3. } else { 0. };
        centre + noise.sample(&mut rng)
    });

    let file = hdf5::File::create(file_name)?;
    file.new_dataset::<f32>()
        .shape((nn, dd))
        .create("X")?
        .write(&x)?;

    let obs = file.create_group("obs")?;
    write_string_attr(&obs, "encoding-type", "dataframe")?;
    write_string_attr(&obs, "_index", "_index")?;
    let names: Vec<Box<str>> = (0..nn)
        .map(|i| format!("spot_{}", i).into_boxed_str())
        .collect();
    write_hdf5_strings(&obs, "_index", &names)?;

    let obsm = file.create_group("obsm")?;
    let coords = ndarray::Array2::from_shape_fn((nn, 2), |(i, j)| (i * (j + 1)) as f32);
    obsm.new_dataset::<f32>()
        .shape((nn, 2))
        .create("spatial")?
        .write(&coords)?;
    Ok(())
}

/// `<data_dir>/<dataset>/` with two views and their graphs
pub fn write_toy_dataset(
    data_dir: &str,
    dataset: &str,
    nn: usize,
    view_dims: &[usize],
) -> anyhow::Result<()> {
    let dir = format!("{}/{}", data_dir, dataset);
    std::fs::create_dir_all(&dir)?;

    for (v, &dd) in view_dims.iter().enumerate() {
        write_toy_h5ad(&format!("{}/adata_omics{}.h5ad", dir, v + 1), nn, dd, 42 + v as u64)?;
        write_ring_graph_dict(&format!("{}/{}_graph_dict.h5", dir, v), nn)?;
    }
    Ok(())
}
