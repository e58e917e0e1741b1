use hdf5::types::FixedAscii;
use hdf5::types::FixedUnicode;
use hdf5::types::TypeDescriptor;
use hdf5::types::VarLenUnicode;
use ndarray::{ArrayBase, Data, Dim, RawData};

/// Read strings from a `HDF5` dataset or attribute
pub fn read_hdf5_strings(data: &hdf5::Container) -> anyhow::Result<Vec<Box<str>>> {
    if data.size() == 0 {
        return Ok(vec![]);
    }

    let desc = data.dtype()?.to_descriptor()?;

    let ret: Vec<Box<str>> = match desc {
        TypeDescriptor::VarLenUnicode => ndarray_into_box_str(&data.read_1d::<VarLenUnicode>()?),
        TypeDescriptor::FixedAscii(n) => {
            if n < 24 {
                ndarray_into_box_str(&data.read_1d::<FixedAscii<24>>()?)
            } else if n < 128 {
                ndarray_into_box_str(&data.read_1d::<FixedAscii<128>>()?)
            } else {
                ndarray_into_box_str(&data.read_1d::<FixedAscii<1024>>()?)
            }
        }
        TypeDescriptor::FixedUnicode(n) => {
            if n < 24 {
                ndarray_into_box_str(&data.read_1d::<FixedUnicode<24>>()?)
            } else if n < 128 {
                ndarray_into_box_str(&data.read_1d::<FixedUnicode<128>>()?)
            } else {
                ndarray_into_box_str(&data.read_1d::<FixedUnicode<1024>>()?)
            }
        }
        _ => {
            return Err(anyhow::anyhow!("unsupported string type: {:?}", desc));
        }
    };

    Ok(ret)
}

/// Read a scalar string attribute, e.g., `encoding-type`
pub fn read_string_attr(loc: &hdf5::Location, name: &str) -> anyhow::Result<String> {
    Ok(loc.attr(name)?.read_scalar::<VarLenUnicode>()?.to_string())
}

pub fn to_varlen_unicode(s: &str) -> anyhow::Result<VarLenUnicode> {
    s.parse::<VarLenUnicode>()
        .map_err(|e| anyhow::anyhow!("invalid string {}: {:?}", s, e))
}

/// Write a scalar string attribute, replacing an existing one
pub fn write_string_attr(loc: &hdf5::Location, name: &str, value: &str) -> anyhow::Result<()> {
    if loc.attr(name).is_ok() {
        loc.delete_attr(name)?;
    }
    loc.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&to_varlen_unicode(value)?)?;
    Ok(())
}

/// Write a 1-D string attribute, replacing an existing one
pub fn write_strings_attr(
    loc: &hdf5::Location,
    name: &str,
    values: &[Box<str>],
) -> anyhow::Result<()> {
    if loc.attr(name).is_ok() {
        loc.delete_attr(name)?;
    }
    let values = values
        .iter()
        .map(|s| to_varlen_unicode(s))
        .collect::<anyhow::Result<Vec<_>>>()?;
    loc.new_attr::<VarLenUnicode>()
        .shape(values.len())
        .create(name)?
        .write(&values)?;
    Ok(())
}

/// Write a 1-D string dataset `name` under `group`
pub fn write_hdf5_strings(
    group: &hdf5::Group,
    name: &str,
    values: &[Box<str>],
) -> anyhow::Result<hdf5::Dataset> {
    let values = values
        .iter()
        .map(|s| to_varlen_unicode(s))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let ds = group
        .new_dataset::<VarLenUnicode>()
        .shape(values.len())
        .create(name)?;
    ds.write(&values)?;
    Ok(ds)
}

fn ndarray_into_box_str<T, U>(data: &ArrayBase<T, Dim<[usize; 1]>>) -> Vec<Box<str>>
where
    T: RawData<Elem = U> + Data,
    U: ToString,
{
    data.into_iter()
        .map(|x| x.to_string().into_boxed_str())
        .collect()
}
