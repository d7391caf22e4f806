//! Arrays with a validity mask derived from a fill value.

use ndarray::{ArrayD, Zip};

use super::VariableData;

/// Data plus a same-shaped mask; `true` marks an invalid element.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray {
    pub data: ArrayD<f64>,
    pub mask: ArrayD<bool>,
}

impl MaskedArray {
    /// Mask every element equal to `fill_value`.
    ///
    /// A NaN fill value masks nothing, since NaN never compares equal.
    pub fn masked_equal(data: ArrayD<f64>, fill_value: f64) -> Self {
        let mask = data.mapv(|value| value == fill_value);
        Self { data, mask }
    }

    /// All elements valid.
    pub fn unmasked(data: ArrayD<f64>) -> Self {
        let mask = ArrayD::from_elem(data.raw_dim(), false);
        Self { data, mask }
    }

    /// Mask derived from the variable's declared fill value, or all-valid
    /// when none is declared.
    pub fn from_variable(variable: VariableData) -> Self {
        match variable.fill_value {
            Some(fill_value) => Self::masked_equal(variable.values, fill_value),
            None => Self::unmasked(variable.values),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn masked_count(&self) -> usize {
        self.mask.iter().filter(|masked| **masked).count()
    }

    /// Valid elements in row-major order.
    pub fn compressed(&self) -> Vec<f64> {
        self.data
            .iter()
            .zip(self.mask.iter())
            .filter(|(_, masked)| !**masked)
            .map(|(value, _)| *value)
            .collect()
    }

    /// Copy of the data with masked elements replaced by `value`.
    pub fn filled(&self, value: f64) -> ArrayD<f64> {
        let mut filled = self.data.clone();
        Zip::from(&mut filled)
            .and(&self.mask)
            .for_each(|element, &masked| {
                if masked {
                    *element = value;
                }
            });
        filled
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
