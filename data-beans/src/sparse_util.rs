use rayon::prelude::*;

/// Compressed sparse vectors as stored in HDF5 (`data`, `indices`,
/// `indptr`)
pub struct ValuesIndicesPointers<'a> {
    pub values: &'a [f32],
    pub indices: &'a [u64],
    pub indptr: &'a [u64],
}

#[derive(Clone, Debug)]
pub struct CooTripletsShape {
    pub triplets: Vec<(u64, u64, f32)>,
    pub shape: TripletsShape,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TripletsShape {
    pub nrows: usize,
    pub ncols: usize,
    pub nnz: usize,
}

/// What `indptr` points to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexPointerType {
    /// compressed columns (CSC)
    Column,
    /// compressed rows (CSR)
    Row,
}

impl IndexPointerType {
    /// from the `encoding-type` of AnnData sparse groups
    pub fn from_encoding(encoding: &str) -> anyhow::Result<Self> {
        match encoding {
            "csr_matrix" => Ok(Self::Row),
            "csc_matrix" => Ok(Self::Column),
            _ => Err(anyhow::anyhow!("unsupported sparse encoding: {}", encoding)),
        }
    }
}

pub trait SparseTripletsTraits {
    /// convert sparse pointers into (row, column, value) triplets of a
    /// `nrows x ncols` matrix
    fn to_coo(
        &self,
        pointer_type: IndexPointerType,
        shape: (usize, usize),
    ) -> anyhow::Result<CooTripletsShape>;
}

/////////////////////
// implementations //
/////////////////////

impl SparseTripletsTraits for ValuesIndicesPointers<'_> {
    fn to_coo(
        &self,
        pointer_type: IndexPointerType,
        shape: (usize, usize),
    ) -> anyhow::Result<CooTripletsShape> {
        let (nrows, ncols) = shape;
        let (nvectors, vector_len) = match pointer_type {
            IndexPointerType::Column => (ncols, nrows),
            IndexPointerType::Row => (nrows, ncols),
        };

        let nelem = self.values.len();
        if nelem != self.indices.len() {
            return Err(anyhow::anyhow!(
                "`values` and `indices` have different sizes: {} vs {}",
                nelem,
                self.indices.len()
            ));
        }

        if self.indptr.len() != nvectors + 1 {
            return Err(anyhow::anyhow!(
                "`indptr` of length {} for {} vectors",
                self.indptr.len(),
                nvectors
            ));
        }

        if self.indptr.windows(2).any(|w| w[0] > w[1])
            || self.indptr.last().map(|&x| x as usize) != Some(nelem)
        {
            return Err(anyhow::anyhow!("`indptr` is not a valid pointer array"));
        }

        if let Some(&i) = self.indices.iter().find(|&&i| i as usize >= vector_len) {
            return Err(anyhow::anyhow!(
                "index {} out of range for a {} x {} matrix",
                i,
                nrows,
                ncols
            ));
        }

        let triplets: Vec<(u64, u64, f32)> = (0..nvectors)
            .into_par_iter()
            .flat_map_iter(|idx| {
                let j = idx as u64;
                let start = self.indptr[idx] as usize;
                let end = self.indptr[idx + 1] as usize;

                self.indices[start..end]
                    .iter()
                    .zip(self.values[start..end].iter())
                    .map(move |(&i, &x_ij)| match pointer_type {
                        IndexPointerType::Column => (i, j, x_ij),
                        IndexPointerType::Row => (j, i, x_ij),
                    })
            })
            .collect();

        let nnz = triplets.len();

        Ok(CooTripletsShape {
            triplets,
            shape: TripletsShape { nrows, ncols, nnz },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // [[1, 0, 2],
    //  [0, 0, 3]]
    #[test]
    fn csr_and_csc_give_same_triplets() -> anyhow::Result<()> {
        let csr = ValuesIndicesPointers {
            values: &[1., 2., 3.],
            indices: &[0, 2, 2],
            indptr: &[0, 2, 3],
        }
        .to_coo(IndexPointerType::Row, (2, 3))?;

        let csc = ValuesIndicesPointers {
            values: &[1., 2., 3.],
            indices: &[0, 0, 1],
            indptr: &[0, 1, 1, 3],
        }
        .to_coo(IndexPointerType::Column, (2, 3))?;

        let mut a = csr.triplets.clone();
        let mut b = csc.triplets.clone();
        a.sort_by_key(|&(i, j, _)| (i, j));
        b.sort_by_key(|&(i, j, _)| (i, j));

        assert_eq!(a, vec![(0, 0, 1.), (0, 2, 2.), (1, 2, 3.)]);
        assert_eq!(a, b);
        assert_eq!(csr.shape, csc.shape);
        Ok(())
    }

    #[test]
    fn broken_pointers_fail() {
        let ret = ValuesIndicesPointers {
            values: &[1., 2.],
            indices: &[0, 5],
            indptr: &[0, 2],
        }
        .to_coo(IndexPointerType::Row, (1, 3));
        assert!(ret.is_err());

        let ret = ValuesIndicesPointers {
            values: &[1., 2.],
            indices: &[0, 1],
            indptr: &[0, 1],
        }
        .to_coo(IndexPointerType::Row, (1, 3));
        assert!(ret.is_err());
    }
}
