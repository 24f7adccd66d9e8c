//! Container codec.
//!
//! A container is an HDF5 file holding one 2-D float32 dataset, `data_down`
//! (time samples x space channels), with scalar or 1-D attributes on the
//! file's root group.
//!
//! Packets written by the upstream client and chunks written by the
//! concatenator share this layout, so a chunk can itself serve as a reference file.

use crate::attrs::{keys, AttrValue, Attributes};
use crate::error::{ProtocolError, Result};
use crate::matrix::Matrix;
use crate::reference::Reference;
use hdf5::types::{TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Attribute, File, Location};
use std::path::Path;

/// Shape and attributes of a container, read without loading samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerHeader {
    pub rows: usize,
    pub cols: usize,
    pub attributes: Attributes,
}

impl ContainerHeader {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

fn dataset_shape(file: &File) -> Result<(hdf5::Dataset, usize, usize)> {
    let dataset = file
        .dataset(keys::DATASET)
        .map_err(|_| ProtocolError::MissingDataset(keys::DATASET.to_string()))?;
    match dataset.shape().as_slice() {
        [rows, cols] => {
            let (rows, cols) = (*rows, *cols);
            Ok((dataset, rows, cols))
        }
        other => Err(ProtocolError::shape(format!(
            "dataset '{}' has {} dimensions, expected 2",
            keys::DATASET,
            other.len()
        ))),
    }
}

fn read_attribute(attr: &Attribute) -> Result<Option<AttrValue>> {
    let descriptor = attr.dtype()?.to_descriptor()?;
    let scalar = attr.is_scalar();
    let value = match descriptor {
        TypeDescriptor::Boolean if scalar => AttrValue::Bool(attr.read_scalar::<bool>()?),
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
            if scalar {
                AttrValue::Int(attr.read_scalar::<i64>()?)
            } else {
                AttrValue::IntArray(attr.read_raw::<i64>()?)
            }
        }
        TypeDescriptor::Float(_) => {
            if scalar {
                AttrValue::Float(attr.read_scalar::<f64>()?)
            } else {
                AttrValue::FloatArray(attr.read_raw::<f64>()?)
            }
        }
        TypeDescriptor::VarLenUnicode if scalar => {
            AttrValue::Text(attr.read_scalar::<VarLenUnicode>()?.as_str().to_string())
        }
        TypeDescriptor::VarLenAscii if scalar => {
            AttrValue::Text(attr.read_scalar::<VarLenAscii>()?.as_str().to_string())
        }
        // Compound, enum and fixed-length string attributes carry nothing we pass on
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn read_attributes(location: &Location) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    for name in location.attr_names()? {
        let attr = location.attr(&name)?;
        if let Some(value) = read_attribute(&attr)? {
            attributes.insert(name, value);
        }
    }
    Ok(attributes)
}

fn write_attribute(location: &Location, name: &str, value: &AttrValue) -> Result<()> {
    match value {
        AttrValue::Bool(v) => location.new_attr::<bool>().create(name)?.write_scalar(v)?,
        AttrValue::Int(v) => location.new_attr::<i64>().create(name)?.write_scalar(v)?,
        AttrValue::Float(v) => location.new_attr::<f64>().create(name)?.write_scalar(v)?,
        AttrValue::Text(v) => {
            let text: VarLenUnicode = v
                .parse()
                .map_err(|e| ProtocolError::invalid_attribute(name, format!("{:?}", e)))?;
            location
                .new_attr::<VarLenUnicode>()
                .create(name)?
                .write_scalar(&text)?
        }
        AttrValue::IntArray(v) => location
            .new_attr::<i64>()
            .shape(v.len())
            .create(name)?
            .write_raw(v.as_slice())?,
        AttrValue::FloatArray(v) => location
            .new_attr::<f64>()
            .shape(v.len())
            .create(name)?
            .write_raw(v.as_slice())?,
    }
    Ok(())
}

/// Write `matrix` and `attributes` as a container at `path`.
///
/// Object modification times are not recorded, so identical input gives
/// identical bytes.
pub fn write_container(path: &Path, matrix: &Matrix, attributes: &Attributes) -> Result<()> {
    if matrix.cols() == 0 {
        return Err(ProtocolError::shape("container needs at least one channel"));
    }
    let file = File::with_options()
        .with_fcpl(|p| p.obj_track_times(false))
        .create(path)?;

    let dataset = file
        .new_dataset::<f32>()
        .obj_track_times(false)
        .shape((matrix.rows(), matrix.cols()))
        .create(keys::DATASET)?;
    dataset.write_raw(matrix.as_slice())?;

    for (name, value) in attributes {
        write_attribute(&file, name, value)?;
    }
    file.close()?;
    Ok(())
}

/// Read shape and attributes without decoding the sample data.
pub fn read_header(path: &Path) -> Result<ContainerHeader> {
    let file = File::open(path)?;
    let (_, rows, cols) = dataset_shape(&file)?;
    let attributes = read_attributes(&file)?;
    Ok(ContainerHeader {
        rows,
        cols,
        attributes,
    })
}

/// Load the reference configuration from a sample container.
pub fn read_reference(path: &Path) -> Result<Reference> {
    let header = read_header(path)?;
    Reference::from_attributes(&header.attributes, header.shape())
}

/// Read the full `data_down` matrix and the attributes of a container.
pub fn read_container(path: &Path) -> Result<(Matrix, Attributes)> {
    let file = File::open(path)?;
    let (dataset, rows, cols) = dataset_shape(&file)?;
    let data = dataset.read_raw::<f32>()?;
    let attributes = read_attributes(&file)?;
    Ok((Matrix::new(rows, cols, data)?, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_attributes() -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(keys::PRR_DOWN.into(), AttrValue::Float(100.0));
        attrs.insert(keys::DX_DOWN.into(), AttrValue::Float(4.08));
        attrs.insert(keys::DOWN_FACTOR_TIME.into(), AttrValue::Int(4));
        attrs.insert(keys::INDEX.into(), AttrValue::IntArray(vec![0, 7, 0, 999]));
        attrs.insert(keys::ORIGIN.into(), AttrValue::FloatArray(vec![0.0, 250.0]));
        attrs.insert(keys::GAP_KIND.into(), AttrValue::from("recoverable_gap"));
        attrs
    }

    #[test]
    fn test_write_then_read_container() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packet.h5");
        let matrix = Matrix::from_fn(50, 8, |r, c| (r * 8 + c) as f32);

        write_container(&path, &matrix, &sample_attributes()).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.shape(), (50, 8));
        assert_eq!(header.attributes, sample_attributes());

        let (read, attrs) = read_container(&path).unwrap();
        assert_eq!(read, matrix);
        assert_eq!(attrs[keys::INDEX], AttrValue::IntArray(vec![0, 7, 0, 999]));
    }

    #[test]
    fn test_identical_input_gives_identical_bytes() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.h5");
        let b = dir.path().join("b.h5");
        let matrix = Matrix::from_fn(20, 3, |r, c| (r + c) as f32 * 0.5);

        write_container(&a, &matrix, &sample_attributes()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        write_container(&b, &matrix, &sample_attributes()).unwrap();

        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }

    #[test]
    fn test_zero_channels_rejected() {
        let dir = tempdir().unwrap();
        let matrix = Matrix::new(0, 0, Vec::new()).unwrap();
        assert!(write_container(&dir.path().join("empty.h5"), &matrix, &Attributes::new()).is_err());
    }

    #[test]
    fn test_missing_dataset_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no_data.h5");
        File::create(&path).unwrap().close().unwrap();
        assert!(matches!(read_header(&path), Err(ProtocolError::MissingDataset(_))));
    }

    #[test]
    fn test_read_header_of_non_container_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.h5");
        std::fs::write(&path, b"not an hdf5 file").unwrap();
        assert!(read_header(&path).is_err());
    }
}
