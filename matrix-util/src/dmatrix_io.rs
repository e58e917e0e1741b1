use crate::common_io::write_lines;
use crate::parquet::*;
use crate::traits::*;
pub use nalgebra::DMatrix;

impl IoOps for DMatrix<f32> {
    type Scalar = f32;

    fn write_file_delim(&self, tsv_file: &str, delim: &str) -> anyhow::Result<()> {
        let lines: Vec<Box<str>> = self
            .row_iter()
            .map(|row| {
                row.iter()
                    .map(|x| format!("{}", *x))
                    .collect::<Vec<String>>()
                    .join(delim)
                    .into_boxed_str()
            })
            .collect();
        write_lines(&lines, tsv_file)
    }

    fn to_parquet(
        &self,
        row_names: Option<&[Box<str>]>,
        column_names: Option<&[Box<str>]>,
        file_path: &str,
    ) -> anyhow::Result<()> {
        let writer = ParquetWriter::new(file_path, self.shape(), (row_names, column_names))?;
        let columns: Vec<Vec<f32>> = self
            .column_iter()
            .map(|x_j| x_j.iter().copied().collect())
            .collect();
        writer.write_columns(&columns)
    }
}
