//! netCDF-4 backend built on the libnetcdf bindings.

use std::path::{Path, PathBuf};

use netcdf::AttributeValue;

use super::{ArrayError, ArrayFileReader, Dataset, VariableData, FILL_VALUE_ATTR};

#[derive(Debug, Clone, Copy, Default)]
pub struct Netcdf4Reader;

impl ArrayFileReader for Netcdf4Reader {
    fn open(&self, path: &Path) -> Result<Box<dyn Dataset>, ArrayError> {
        let file = netcdf::open(path).map_err(|e| read_error(path, e))?;
        let variables = file.variables().map(|var| var.name()).collect();
        Ok(Box::new(Netcdf4Dataset {
            path: path.to_path_buf(),
            variables,
        }))
    }
}

#[derive(Debug)]
pub struct Netcdf4Dataset {
    path: PathBuf,
    variables: Vec<String>,
}

impl Dataset for Netcdf4Dataset {
    fn path(&self) -> &Path {
        &self.path
    }

    fn variable_names(&self) -> &[String] {
        &self.variables
    }

    fn read_variable(&self, name: &str) -> Result<VariableData, ArrayError> {
        let file = netcdf::open(&self.path).map_err(|e| read_error(&self.path, e))?;
        let variable = file
            .variable(name)
            .ok_or_else(|| ArrayError::UnknownVariable(name.to_string()))?;

        let shape: Vec<usize> = variable.dimensions().iter().map(|dim| dim.len()).collect();
        let values: Vec<f64> = variable
            .get_values::<f64, _>(..)
            .map_err(|e| read_error(&self.path, e))?;
        let fill_value = variable
            .attribute_value(FILL_VALUE_ATTR)
            .and_then(Result::ok)
            .and_then(attribute_as_f64);

        VariableData::from_flat(name, shape, values, fill_value)
    }
}

fn attribute_as_f64(value: AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Uchar(v) => Some(f64::from(v)),
        AttributeValue::Schar(v) => Some(f64::from(v)),
        AttributeValue::Ushort(v) => Some(f64::from(v)),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Uint(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Ulonglong(v) => Some(v as f64),
        AttributeValue::Longlong(v) => Some(v as f64),
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Floats(v) => v.first().map(|x| f64::from(*x)),
        _ => None,
    }
}

fn read_error(path: &Path, err: netcdf::Error) -> ArrayError {
    ArrayError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
