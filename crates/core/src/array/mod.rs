//! Loading operator output files into numeric arrays.
//!
//! Reading the netCDF format itself is delegated to a backend behind the
//! [`ArrayFileReader`] trait. Two backends exist, each behind a cargo
//! feature:
//!
//! - [`ArrayBackend::Classic`]: pure-Rust netCDF-3 reader (`classic`).
//! - [`ArrayBackend::Netcdf4`]: libnetcdf bindings (`netcdf4`).
//!
//! Without either feature, requesting an array fails with
//! [`ArrayError::NoBackend`] at the point of the request.

pub mod masked;

#[cfg(feature = "classic")]
pub mod classic;
#[cfg(feature = "netcdf4")]
pub mod netcdf4;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

pub use masked::MaskedArray;

/// Name of the attribute carrying a variable's missing-data sentinel.
pub const FILL_VALUE_ATTR: &str = "_FillValue";

#[derive(Debug, thiserror::Error)]
pub enum ArrayError {
    #[error("No array backend available; enable the `classic` or `netcdf4` feature")]
    NoBackend,

    #[error("Cannot find variable: {0}")]
    UnknownVariable(String),

    #[error("Failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("Variable {variable} does not fit its declared shape: {source}")]
    Shape {
        variable: String,
        #[source]
        source: ndarray::ShapeError,
    },
}

/// Which library reads output files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayBackend {
    /// netCDF-3 classic reader. Falls back to [`ArrayBackend::Netcdf4`] when
    /// not compiled in.
    #[default]
    Classic,
    Netcdf4,
}

impl fmt::Display for ArrayBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classic => f.write_str("classic"),
            Self::Netcdf4 => f.write_str("netcdf4"),
        }
    }
}

impl FromStr for ArrayBackend {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" | "netcdf3" | "scipy" => Ok(Self::Classic),
            "netcdf4" => Ok(Self::Netcdf4),
            _ => Err(crate::error::ConfigError::InvalidValue {
                var: "array backend",
                value: s.to_string(),
            }),
        }
    }
}

/// Values and fill value of one variable, widened to `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableData {
    pub name: String,
    pub values: ArrayD<f64>,
    /// Declared `_FillValue`, if any.
    pub fill_value: Option<f64>,
}

impl VariableData {
    /// Shape a flat, row-major buffer into a [`VariableData`].
    pub fn from_flat(
        name: impl Into<String>,
        shape: Vec<usize>,
        values: Vec<f64>,
        fill_value: Option<f64>,
    ) -> Result<Self, ArrayError> {
        let name = name.into();
        let values = ArrayD::from_shape_vec(shape, values).map_err(|source| ArrayError::Shape {
            variable: name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            values,
            fill_value,
        })
    }
}

/// An opened dataset. Closing it is the caller's responsibility (drop).
pub trait Dataset: Send + fmt::Debug {
    fn path(&self) -> &Path;

    fn variable_names(&self) -> &[String];

    fn has_variable(&self, name: &str) -> bool {
        self.variable_names().iter().any(|existing| existing == name)
    }

    fn read_variable(&self, name: &str) -> Result<VariableData, ArrayError>;
}

/// Opens netCDF files produced by the operators.
pub trait ArrayFileReader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn Dataset>, ArrayError>;

    /// Plain array of variable `name` in the file at `path`.
    fn read_array(&self, path: &Path, name: &str) -> Result<ArrayD<f64>, ArrayError> {
        let dataset = self.open(path)?;
        if !dataset.has_variable(name) {
            return Err(ArrayError::UnknownVariable(name.to_string()));
        }
        Ok(dataset.read_variable(name)?.values)
    }

    /// Masked array of variable `name`, masked where values equal the
    /// declared fill value.
    fn read_masked_array(&self, path: &Path, name: &str) -> Result<MaskedArray, ArrayError> {
        let dataset = self.open(path)?;
        if !dataset.has_variable(name) {
            return Err(ArrayError::UnknownVariable(name.to_string()));
        }
        Ok(MaskedArray::from_variable(dataset.read_variable(name)?))
    }
}

/// Reader for `backend`, falling back the way [`ArrayBackend::Classic`]
/// documents.
#[allow(unreachable_code)]
pub fn reader_for(backend: ArrayBackend) -> Result<Arc<dyn ArrayFileReader>, ArrayError> {
    if backend == ArrayBackend::Classic {
        #[cfg(feature = "classic")]
        return Ok(Arc::new(classic::ClassicReader));

        tracing::warn!("Classic netCDF reader not compiled in; trying netcdf4");
    }

    #[cfg(feature = "netcdf4")]
    return Ok(Arc::new(netcdf4::Netcdf4Reader));

    Err(ArrayError::NoBackend)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
