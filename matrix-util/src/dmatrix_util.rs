use crate::traits::*;
use candle_core::{Device, Tensor};
pub use nalgebra::{DMatrix, DVector};

impl MatTriplets for DMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    /// Duplicated coordinates are added up
    fn from_nonzero_triplets<I>(
        nrow: usize,
        ncol: usize,
        triplets: Vec<(I, I, Self::Scalar)>,
    ) -> anyhow::Result<Self::Mat>
    where
        I: TryInto<usize> + Copy,
        <I as TryInto<usize>>::Error: std::fmt::Debug,
    {
        let mut ret = DMatrix::<f32>::zeros(nrow, ncol);
        for (ii, jj, x_ij) in triplets {
            let ii: usize = ii
                .try_into()
                .map_err(|e| anyhow::anyhow!("row index: {:?}", e))?;
            let jj: usize = jj
                .try_into()
                .map_err(|e| anyhow::anyhow!("column index: {:?}", e))?;
            if ii >= nrow || jj >= ncol {
                anyhow::bail!("({}, {}) out of {} x {}", ii, jj, nrow, ncol);
            }
            ret[(ii, jj)] += x_ij;
        }
        Ok(ret)
    }

    fn to_nonzero_triplets(
        &self,
    ) -> anyhow::Result<(usize, usize, Vec<(usize, usize, Self::Scalar)>)> {
        let mut ret = vec![];
        for (j, x_j) in self.column_iter().enumerate() {
            for (i, &x_ij) in x_j.iter().enumerate() {
                if x_ij != 0. {
                    ret.push((i, j, x_ij));
                }
            }
        }
        Ok((self.nrows(), self.ncols(), ret))
    }
}

impl ConvertMatOps for DMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    fn from_tensor(tensor: &Tensor) -> anyhow::Result<Self::Mat> {
        let (nrow, ncol) = tensor.dims2()?;
        let data = tensor
            .to_device(&Device::Cpu)?
            .to_dtype(candle_core::DType::F32)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        Ok(DMatrix::<f32>::from_row_iterator(nrow, ncol, data))
    }

    fn to_tensor(&self, dev: &Device) -> anyhow::Result<Tensor> {
        let (nrow, ncol) = self.shape();
        // nalgebra is column-major
        let data: Vec<f32> = self.transpose().as_slice().to_vec();
        Ok(Tensor::from_vec(data, (nrow, ncol), dev)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_round_trip_keeps_layout() -> anyhow::Result<()> {
        let mat = DMatrix::<f32>::from_row_slice(2, 3, &[1., 2., 3., 4., 5., 6.]);
        let tensor = mat.to_tensor(&Device::Cpu)?;
        assert_eq!(tensor.to_vec2::<f32>()?, vec![vec![1., 2., 3.], vec![4., 5., 6.]]);
        assert_eq!(DMatrix::<f32>::from_tensor(&tensor)?, mat);
        Ok(())
    }

    #[test]
    fn triplets_sum_duplicates() -> anyhow::Result<()> {
        let mat = DMatrix::<f32>::from_nonzero_triplets(
            2,
            2,
            vec![(0_u64, 1_u64, 1.), (0, 1, 2.), (1, 0, -1.)],
        )?;
        assert_eq!(mat[(0, 1)], 3.);
        let (_, _, triplets) = mat.to_nonzero_triplets()?;
        assert_eq!(triplets, vec![(1, 0, -1.), (0, 1, 3.)]);

        assert!(DMatrix::<f32>::from_nonzero_triplets(2, 2, vec![(2_usize, 0_usize, 1.)]).is_err());
        Ok(())
    }
}
