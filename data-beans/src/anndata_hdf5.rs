use crate::misc::*;
use crate::sparse_util::*;
use log::info;
use matrix_util::dmatrix_util::DMatrix;
use matrix_util::traits::MatTriplets;

/// A 2-D matrix stored in an AnnData-style HDF5 file
///
/// ```text
/// dense:  <key>           (dataset, n x d)
/// sparse: <key>/data      (values)
///         <key>/indices   (minor indices)
///         <key>/indptr    (major pointers)
///         @shape          [n, d]
///         @encoding-type  csr_matrix | csc_matrix
/// ```
pub enum MatrixElement {
    Dense(DMatrix<f32>),
    Sparse(CooTripletsShape),
}

impl MatrixElement {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Dense(x) => x.shape(),
            Self::Sparse(coo) => (coo.shape.nrows, coo.shape.ncols),
        }
    }

    /// Non-zero `(row, column, value)` triplets
    pub fn to_triplets(&self) -> anyhow::Result<Vec<(usize, usize, f32)>> {
        match self {
            Self::Dense(x) => Ok(x.to_nonzero_triplets()?.2),
            Self::Sparse(coo) => Ok(coo
                .triplets
                .iter()
                .map(|&(i, j, x)| (i as usize, j as usize, x))
                .collect()),
        }
    }

    pub fn to_dense(&self) -> anyhow::Result<DMatrix<f32>> {
        match self {
            Self::Dense(x) => Ok(x.clone()),
            Self::Sparse(coo) => DMatrix::<f32>::from_nonzero_triplets(
                coo.shape.nrows,
                coo.shape.ncols,
                coo.triplets.clone(),
            ),
        }
    }
}

/// Read a dense or sparse matrix element `key` under `loc`
pub fn read_matrix_element(loc: &hdf5::Group, key: &str) -> anyhow::Result<MatrixElement> {
    if !loc.link_exists(key) {
        anyhow::bail!("missing matrix `{}` in {}", key, loc.name());
    }

    if let Ok(ds) = loc.dataset(key) {
        let arr = ds.read_2d::<f32>()?;
        let (nrows, ncols) = arr.dim();
        return Ok(MatrixElement::Dense(DMatrix::<f32>::from_row_iterator(
            nrows,
            ncols,
            arr.iter().copied(),
        )));
    }

    let group = loc.group(key)?;
    let encoding = read_string_attr(&group, "encoding-type")?;
    let pointer_type = IndexPointerType::from_encoding(&encoding)?;

    let shape = group.attr("shape")?.read_raw::<u64>()?;
    if shape.len() != 2 {
        anyhow::bail!("`{}` has shape {:?}, expected 2-D", key, shape);
    }

    let values = group.dataset("data")?.read_raw::<f32>()?;
    let indices = group.dataset("indices")?.read_raw::<u64>()?;
    let indptr = group.dataset("indptr")?.read_raw::<u64>()?;

    let coo = ValuesIndicesPointers {
        values: &values,
        indices: &indices,
        indptr: &indptr,
    }
    .to_coo(pointer_type, (shape[0] as usize, shape[1] as usize))?;

    Ok(MatrixElement::Sparse(coo))
}

/// The parts of an `.h5ad` file needed for training
pub struct AnnData {
    file_name: Box<str>,
    x: MatrixElement,
    obs_names: Vec<Box<str>>,
    spatial: Option<DMatrix<f32>>,
}

impl AnnData {
    /// Read `X`, the spot names and `obsm/spatial` (if any)
    pub fn open(file_name: &str) -> anyhow::Result<Self> {
        let file = hdf5::File::open(file_name)
            .map_err(|e| anyhow::anyhow!("failed to open {}: {}", file_name, e))?;

        let x = read_matrix_element(&file, "X")?;
        let (nn, dd) = x.shape();
        info!("{}: {} spots x {} features", file_name, nn, dd);

        let obs_names = match file.group("obs") {
            Ok(obs) => {
                let index_key = read_string_attr(&obs, "_index").unwrap_or("_index".to_string());
                match obs.dataset(&index_key) {
                    Ok(ds) => read_hdf5_strings(&ds)?,
                    _ => vec![],
                }
            }
            _ => vec![],
        };

        let obs_names = if obs_names.len() == nn {
            obs_names
        } else {
            info!("{}: no spot names, using numeric IDs", file_name);
            (0..nn).map(|i| i.to_string().into_boxed_str()).collect()
        };

        let spatial = match file.group("obsm") {
            Ok(obsm) if obsm.link_exists("spatial") => {
                let coords = read_matrix_element(&obsm, "spatial")?.to_dense()?;
                if coords.nrows() != nn {
                    anyhow::bail!(
                        "{}: {} spatial coordinates for {} spots",
                        file_name,
                        coords.nrows(),
                        nn
                    );
                }
                Some(coords)
            }
            _ => None,
        };

        Ok(Self {
            file_name: file_name.into(),
            x,
            obs_names,
            spatial,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn num_obs(&self) -> usize {
        self.x.shape().0
    }

    pub fn num_vars(&self) -> usize {
        self.x.shape().1
    }

    pub fn x(&self) -> &MatrixElement {
        &self.x
    }

    pub fn obs_names(&self) -> &[Box<str>] {
        &self.obs_names
    }

    pub fn spatial(&self) -> Option<&DMatrix<f32>> {
        self.spatial.as_ref()
    }

    /// Copy this file to `out_file` and add
    ///
    /// * `obsm/<embedding_key>`: dense (spots x latent)
    /// * `obs/<label_key>`: categorical column of the labels
    ///
    /// Existing entries with the same keys are replaced.
    pub fn write_annotated(
        &self,
        out_file: &str,
        embedding_key: &str,
        embedding: &DMatrix<f32>,
        label_key: &str,
        labels: &[Box<str>],
    ) -> anyhow::Result<()> {
        let nn = self.num_obs();
        if embedding.nrows() != nn || labels.len() != nn {
            anyhow::bail!(
                "{} spots, but {} embedding rows and {} labels",
                nn,
                embedding.nrows(),
                labels.len()
            );
        }

        if std::path::Path::new(out_file) != std::path::Path::new(self.file_name()) {
            std::fs::copy(self.file_name(), out_file)?;
        }

        let file = hdf5::File::open_rw(out_file)?;

        let obsm = open_or_create_group(&file, "obsm", "dict")?;
        write_dense_matrix(&obsm, embedding_key, embedding)?;

        let obs = open_or_create_group(&file, "obs", "dataframe")?;
        write_categorical(&obs, label_key, labels)?;

        let mut column_order = match obs.attr("column-order") {
            Ok(attr) => read_hdf5_strings(&attr)?,
            _ => vec![],
        };
        if !column_order.iter().any(|c| c.as_ref() == label_key) {
            column_order.push(label_key.into());
        }
        write_strings_attr(&obs, "column-order", &column_order)?;

        file.flush()?;
        info!("wrote {}", out_file);
        Ok(())
    }
}

fn open_or_create_group(
    file: &hdf5::File,
    name: &str,
    encoding: &str,
) -> anyhow::Result<hdf5::Group> {
    if file.link_exists(name) {
        return Ok(file.group(name)?);
    }
    let group = file.create_group(name)?;
    write_string_attr(&group, "encoding-type", encoding)?;
    write_string_attr(&group, "encoding-version", "0.1.0")?;
    Ok(group)
}

fn unlink_if_exists(group: &hdf5::Group, name: &str) -> anyhow::Result<()> {
    if group.link_exists(name) {
        group.unlink(name)?;
    }
    Ok(())
}

/// Write a row-major dense matrix as an AnnData `array`
pub fn write_dense_matrix(
    group: &hdf5::Group,
    name: &str,
    mat: &DMatrix<f32>,
) -> anyhow::Result<()> {
    unlink_if_exists(group, name)?;

    let (nrows, ncols) = mat.shape();
    let row_major = ndarray::Array2::from_shape_fn((nrows, ncols), |(i, j)| mat[(i, j)]);

    let ds = group
        .new_dataset::<f32>()
        .shape((nrows, ncols))
        .create(name)?;
    ds.write(&row_major)?;

    write_string_attr(&ds, "encoding-type", "array")?;
    write_string_attr(&ds, "encoding-version", "0.2.0")?;
    Ok(())
}

/// Write strings as an AnnData `categorical` column with sorted
/// categories
pub fn write_categorical(
    group: &hdf5::Group,
    name: &str,
    values: &[Box<str>],
) -> anyhow::Result<()> {
    unlink_if_exists(group, name)?;

    let mut categories: Vec<Box<str>> = values.to_vec();
    categories.sort();
    categories.dedup();

    let codes = values
        .iter()
        .map(|v| {
            categories
                .binary_search(v)
                .map(|k| k as i32)
                .map_err(|_| anyhow::anyhow!("missing category {}", v))
        })
        .collect::<anyhow::Result<Vec<i32>>>()?;

    let cat = group.create_group(name)?;
    write_string_attr(&cat, "encoding-type", "categorical")?;
    write_string_attr(&cat, "encoding-version", "0.2.0")?;
    cat.new_attr::<bool>().create("ordered")?.write_scalar(&false)?;

    let cat_ds = write_hdf5_strings(&cat, "categories", &categories)?;
    write_string_attr(&cat_ds, "encoding-type", "string-array")?;
    write_string_attr(&cat_ds, "encoding-version", "0.2.0")?;

    let codes_ds = cat.new_dataset::<i32>().shape(codes.len()).create("codes")?;
    codes_ds.write(&codes)?;
    write_string_attr(&codes_ds, "encoding-type", "array")?;
    write_string_attr(&codes_ds, "encoding-version", "0.2.0")?;

    Ok(())
}

/// Read a categorical column back into strings
pub fn read_categorical(group: &hdf5::Group, name: &str) -> anyhow::Result<Vec<Box<str>>> {
    let cat = group.group(name)?;
    let categories = read_hdf5_strings(&cat.dataset("categories")?)?;
    let codes = cat.dataset("codes")?.read_raw::<i32>()?;
    codes
        .into_iter()
        .map(|k| {
            categories
                .get(k as usize)
                .cloned()
                .ok_or(anyhow::anyhow!("invalid category code {}", k))
        })
        .collect()
}

/// Adjacency matrices of one view
///
/// ```text
/// <v>_graph_dict.h5
///     ├── adj_hat   (graph to reconstruct)
///     └── adj_wave  (normalized graph for message passing)
/// ```
pub struct GraphDict {
    pub adj_hat: MatrixElement,
    pub adj_wave: MatrixElement,
}

impl GraphDict {
    pub fn open(file_name: &str) -> anyhow::Result<Self> {
        let file = hdf5::File::open(file_name)
            .map_err(|e| anyhow::anyhow!("failed to open {}: {}", file_name, e))?;
        let adj_hat = read_matrix_element(&file, "adj_hat")?;
        let adj_wave = read_matrix_element(&file, "adj_wave")?;
        info!(
            "{}: adj_hat {:?}, adj_wave {:?}",
            file_name,
            adj_hat.shape(),
            adj_wave.shape()
        );
        Ok(Self { adj_hat, adj_wave })
    }
}
