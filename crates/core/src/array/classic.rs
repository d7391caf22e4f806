//! netCDF-3 classic backend built on the pure-Rust `netcdf3` reader.
//!
//! The file is reopened for each variable read, so a [`ClassicDataset`]
//! holds no file handle between reads.

use std::path::{Path, PathBuf};

use netcdf3::{Attribute, DataType, DataVector, FileReader};

use super::{ArrayError, ArrayFileReader, Dataset, VariableData, FILL_VALUE_ATTR};

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicReader;

impl ArrayFileReader for ClassicReader {
    fn open(&self, path: &Path) -> Result<Box<dyn Dataset>, ArrayError> {
        let reader = FileReader::open(path).map_err(|e| read_error(path, e))?;
        let variables = reader.data_set().get_var_names();
        Ok(Box::new(ClassicDataset {
            path: path.to_path_buf(),
            variables,
        }))
    }
}

#[derive(Debug)]
pub struct ClassicDataset {
    path: PathBuf,
    variables: Vec<String>,
}

impl Dataset for ClassicDataset {
    fn path(&self) -> &Path {
        &self.path
    }

    fn variable_names(&self) -> &[String] {
        &self.variables
    }

    fn read_variable(&self, name: &str) -> Result<VariableData, ArrayError> {
        let mut reader = FileReader::open(&self.path).map_err(|e| read_error(&self.path, e))?;

        let (shape, fill_value) = {
            let data_set = reader.data_set();
            let variable = data_set
                .get_var(name)
                .ok_or_else(|| ArrayError::UnknownVariable(name.to_string()))?;
            let shape: Vec<usize> = variable.get_dims().iter().map(|dim| dim.size()).collect();
            let fill_value = data_set
                .get_var_attr(name, FILL_VALUE_ATTR)
                .and_then(attribute_as_f64);
            (shape, fill_value)
        };

        let values = match reader.read_var(name).map_err(|e| read_error(&self.path, e))? {
            DataVector::I8(values) => values.into_iter().map(f64::from).collect(),
            DataVector::U8(values) => values.into_iter().map(f64::from).collect(),
            DataVector::I16(values) => values.into_iter().map(f64::from).collect(),
            DataVector::I32(values) => values.into_iter().map(f64::from).collect(),
            DataVector::F32(values) => values.into_iter().map(f64::from).collect(),
            DataVector::F64(values) => values,
        };

        VariableData::from_flat(name, shape, values, fill_value)
    }
}

fn attribute_as_f64(attr: &Attribute) -> Option<f64> {
    match attr.data_type() {
        DataType::I8 => attr.get_i8()?.first().map(|v| f64::from(*v)),
        DataType::U8 => attr.get_u8()?.first().map(|v| f64::from(*v)),
        DataType::I16 => attr.get_i16()?.first().map(|v| f64::from(*v)),
        DataType::I32 => attr.get_i32()?.first().map(|v| f64::from(*v)),
        DataType::F32 => attr.get_f32()?.first().map(|v| f64::from(*v)),
        DataType::F64 => attr.get_f64()?.first().copied(),
    }
}

fn read_error(path: &Path, err: impl std::fmt::Debug) -> ArrayError {
    ArrayError::Read {
        path: path.to_path_buf(),
        message: format!("{err:?}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
