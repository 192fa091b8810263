//! Feature Vector - Core data structure for ML input
//!
//! **Versioned feature vector with layout validation**
//!
//! Mỗi vector mang theo version + layout hash của schema đã tạo ra nó,
//! để classifier adapter từ chối vector lệch layout.

use serde::{Deserialize, Serialize};

use super::layout::{FeatureSchema, LayoutMismatchError};

/// Versioned Feature Vector with layout metadata
///
/// Values are one-to-one with the schema's feature order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Schema version
    pub version: u8,
    /// CRC32 hash of the feature layout (for mismatch detection)
    pub layout_hash: u32,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Zeroed vector for this schema
    pub fn zeros(schema: &FeatureSchema) -> Self {
        Self {
            version: schema.version(),
            layout_hash: schema.layout_hash(),
            values: vec![0.0; schema.len()],
        }
    }

    /// Create from raw values (truncates or zero-pads to the schema width)
    pub fn from_values(schema: &FeatureSchema, mut values: Vec<f64>) -> Self {
        values.resize(schema.len(), 0.0);
        Self {
            version: schema.version(),
            layout_hash: schema.layout_hash(),
            values,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get feature by index
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Get feature by name
    pub fn get_by_name(&self, schema: &FeatureSchema, name: &str) -> Option<f64> {
        schema.index_of(name).and_then(|i| self.get(i))
    }

    /// Set feature by index
    pub fn set(&mut self, index: usize, value: f64) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// Validate that this vector was built for `schema`
    pub fn validate(&self, schema: &FeatureSchema) -> Result<(), LayoutMismatchError> {
        schema.validate_layout(self.version, self.layout_hash)?;
        if self.values.len() != schema.len() {
            return Err(LayoutMismatchError {
                expected_version: schema.version(),
                expected_hash: schema.layout_hash(),
                actual_version: self.version,
                actual_hash: self.layout_hash,
            });
        }
        Ok(())
    }
}
