use parquet::basic::Type as ParquetType;
use parquet::basic::{Compression, ConvertedType, Repetition, ZstdLevel};
use parquet::data_type::{ByteArray, ByteArrayType, FloatType};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::RowAccessor;
use parquet::schema::types::Type;
use std::fs::File;
use std::sync::Arc;

/// get field names by peeking into `file_path`
pub fn peek_parquet_field_names(file_path: &str) -> anyhow::Result<Vec<Box<str>>> {
    let reader = SerializedFileReader::new(File::open(file_path)?)?;
    let fields = reader.metadata().file_metadata().schema().get_fields();

    Ok(fields
        .iter()
        .map(|f| f.name().to_string().into_boxed_str())
        .collect())
}

/// A float matrix read back from a parquet file written by
/// `ParquetWriter`
pub struct ParquetReader {
    pub row_major_data: Vec<f32>,
    pub row_names: Vec<Box<str>>,
    pub column_names: Vec<Box<str>>,
}

impl ParquetReader {
    /// Read all the float columns; the first column holds row names
    pub fn new(file_path: &str) -> anyhow::Result<Self> {
        let reader = SerializedFileReader::new(File::open(file_path)?)?;
        let metadata = reader.metadata();
        let nrows = metadata.file_metadata().num_rows() as usize;
        let fields = metadata.file_metadata().schema().get_fields();

        let select: Vec<usize> = fields
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, f)| f.get_physical_type() == ParquetType::FLOAT)
            .map(|(j, _)| j)
            .collect();

        let column_names: Vec<Box<str>> = select
            .iter()
            .map(|&j| fields[j].name().to_string().into_boxed_str())
            .collect();

        let mut row_names = Vec::with_capacity(nrows);
        let mut row_major_data = Vec::with_capacity(nrows * select.len());

        for record in reader.get_row_iter(None)? {
            let row = record?;
            row_names.push(row.get_string(0)?.clone().into_boxed_str());
            for &j in select.iter() {
                row_major_data.push(row.get_float(j)?);
            }
        }

        Ok(Self {
            row_major_data,
            row_names,
            column_names,
        })
    }
}

pub struct ParquetWriter {
    file: File,
    schema: Arc<Type>,
    writer_properties: Arc<WriterProperties>,
    row_names: Vec<ByteArray>,
}

impl ParquetWriter {
    /// Create a new parquet writer for a float matrix with row and
    /// column names.
    ///
    /// * `file_path`: output file path
    ///
    /// * `shape`: number of rows and columns
    ///
    /// * `names`: for row and column names, respectively; if `None`, just add `[0, n)` numbers.
    ///
    pub fn new(
        file_path: &str,
        shape: (usize, usize),
        names: (Option<&[Box<str>]>, Option<&[Box<str>]>),
    ) -> anyhow::Result<Self> {
        let (nrows, ncols) = shape;
        let (row_names, column_names) = names;

        let schema = build_columns_schema(ncols, column_names)?;

        let row_names: Vec<ByteArray> = match row_names {
            Some(row_names) => {
                if row_names.len() != nrows {
                    return Err(anyhow::anyhow!(
                        "{} row names for {} rows",
                        row_names.len(),
                        nrows
                    ));
                }
                row_names
                    .iter()
                    .map(|r| ByteArray::from(r.as_ref()))
                    .collect()
            }
            None => (0..nrows)
                .map(|i| ByteArray::from(i.to_string().as_str()))
                .collect(),
        };

        let writer_properties = Arc::new(
            WriterProperties::builder()
                .set_compression(Compression::ZSTD(ZstdLevel::try_new(5)?))
                .build(),
        );

        Ok(Self {
            file: File::create(file_path)?,
            schema,
            writer_properties,
            row_names,
        })
    }

    pub fn row_names_vec(&self) -> &Vec<ByteArray> {
        &self.row_names
    }

    pub fn open(&self) -> anyhow::Result<SerializedFileWriter<File>> {
        Ok(SerializedFileWriter::new(
            self.file.try_clone()?,
            self.schema.clone(),
            self.writer_properties.clone(),
        )?)
    }

    /// Write the row names followed by the columns in one row group
    ///
    /// * `columns` - column-major data, each of length `nrows`
    pub fn write_columns(&self, columns: &[Vec<f32>]) -> anyhow::Result<()> {
        let mut writer = self.open()?;
        let mut row_group_writer = writer.next_row_group()?;

        if let Some(mut column_writer) = row_group_writer.next_column()? {
            column_writer
                .typed::<ByteArrayType>()
                .write_batch(&self.row_names, None, None)?;
            column_writer.close()?;
        }

        for data_j in columns {
            if data_j.len() != self.row_names.len() {
                return Err(anyhow::anyhow!(
                    "column of length {}, expected {}",
                    data_j.len(),
                    self.row_names.len()
                ));
            }
            if let Some(mut column_writer) = row_group_writer.next_column()? {
                column_writer
                    .typed::<FloatType>()
                    .write_batch(data_j, None, None)?;
                column_writer.close()?;
            }
        }

        row_group_writer.close()?;
        writer.close()?;
        Ok(())
    }
}

fn build_columns_schema(
    ncols: usize,
    column_names: Option<&[Box<str>]>,
) -> anyhow::Result<Arc<Type>> {
    if let Some(column_names) = column_names {
        if column_names.len() != ncols {
            return Err(anyhow::anyhow!(
                "Column names length ({}) does not match number of columns ({})",
                column_names.len(),
                ncols
            ));
        }
    }

    let mut fields = vec![Arc::new(
        Type::primitive_type_builder("row", ParquetType::BYTE_ARRAY)
            .with_repetition(Repetition::REQUIRED)
            .with_converted_type(ConvertedType::UTF8)
            .build()?,
    )];

    let default_names: Vec<Box<str>> = (0..ncols).map(|x| x.to_string().into_boxed_str()).collect();
    let column_names: &[Box<str>] = column_names.unwrap_or(&default_names);

    for column_name in column_names {
        fields.push(Arc::new(
            Type::primitive_type_builder(column_name, ParquetType::FLOAT)
                .with_repetition(Repetition::REQUIRED)
                .build()?,
        ));
    }

    Ok(Arc::new(
        Type::group_type_builder("2dMatrix")
            .with_fields(fields)
            .build()?,
    ))
}
