use candle_core::{DType, Device, Result, Tensor};

/// Sparse `nrow x ncol` matrix kept in coordinate (COO) form on a
/// device, so that `A * H` stays differentiable with respect to `H`.
///
/// Duplicated coordinates are summed, the same way `scipy` collapses
/// COO entries when densifying.
#[derive(Clone, Debug)]
pub struct SparseTensor {
    nrow: usize,
    ncol: usize,
    rows: Vec<u32>,
    cols: Vec<u32>,
    values: Vec<f32>,
    row_index: Tensor,
    col_index: Tensor,
    values_n1: Tensor,
}

impl SparseTensor {
    /// Build a sparse tensor from `(row, column, value)` triplets
    ///
    /// * `shape` - `(nrow, ncol)`
    /// * `triplets` - zero-based coordinates with values
    /// * `dev` - device where the index and value tensors live
    pub fn from_triplets(
        shape: (usize, usize),
        triplets: &[(usize, usize, f32)],
        dev: &Device,
    ) -> Result<Self> {
        let (nrow, ncol) = shape;

        let mut rows = Vec::with_capacity(triplets.len());
        let mut cols = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());

        for &(i, j, x_ij) in triplets {
            if i >= nrow || j >= ncol {
                candle_core::bail!(
                    "triplet ({}, {}) out of range for a {} x {} matrix",
                    i,
                    j,
                    nrow,
                    ncol
                );
            }
            rows.push(i as u32);
            cols.push(j as u32);
            values.push(x_ij);
        }

        let nnz = values.len();
        let row_index = Tensor::from_vec(rows.clone(), nnz, dev)?;
        let col_index = Tensor::from_vec(cols.clone(), nnz, dev)?;
        let values_n1 = Tensor::from_vec(values.clone(), (nnz, 1), dev)?;

        Ok(Self {
            nrow,
            ncol,
            rows,
            cols,
            values,
            row_index,
            col_index,
            values_n1,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrow, self.ncol)
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn device(&self) -> &Device {
        self.values_n1.device()
    }

    /// Host-side `(row, column, value)` triplets
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.rows
            .iter()
            .zip(self.cols.iter())
            .zip(self.values.iter())
            .map(|((&i, &j), &x)| (i as usize, j as usize, x))
    }

    /// Sparse-dense product `self * h_md`
    ///
    /// out[i,:] = sum_j A[i,j] * h[j,:]
    ///
    /// * `h_md` - dense tensor with `ncol` rows
    pub fn matmul(&self, h_md: &Tensor) -> Result<Tensor> {
        let (m, d) = h_md.dims2()?;
        if m != self.ncol {
            candle_core::bail!(
                "sparse matmul: {} x {} times {} x {}",
                self.nrow,
                self.ncol,
                m,
                d
            );
        }

        let out_nd = Tensor::zeros((self.nrow, d), h_md.dtype(), h_md.device())?;
        if self.nnz() == 0 {
            return Ok(out_nd);
        }

        let values = self.values_n1.to_dtype(h_md.dtype())?;
        let msg_ed = h_md
            .contiguous()?
            .index_select(&self.col_index, 0)?
            .broadcast_mul(&values)?;
        out_nd.index_add(&self.row_index, &msg_ed, 0)
    }

    /// Dense copy of this matrix on the same device
    pub fn to_dense(&self) -> Result<Tensor> {
        let mut data = vec![0_f32; self.nrow * self.ncol];
        for (i, j, x_ij) in self.triplets() {
            data[i * self.ncol + j] += x_ij;
        }
        Tensor::from_vec(data, (self.nrow, self.ncol), self.device())
    }

    /// Dense `{0, 1}` indicator of the non-zero pattern
    pub fn to_dense_indicator(&self) -> Result<Tensor> {
        self.to_dense()?.ne(0_f32)?.to_dtype(DType::F32)
    }
}
