//! Biometric descriptor: the fixed-length face embedding produced by the extractor.

use serde::{Deserialize, Serialize};

use crate::DescriptorError;

/// Descriptor length used by the reference face-recognition model.
pub const DEFAULT_DESCRIPTOR_LEN: usize = 128;

/// An ordered, immutable vector of finite `f32` values.
///
/// Two captures of the same face produce close but not identical descriptors,
/// so equality here is exact value equality, not identity equality. Use the
/// matcher for the latter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct BiometricDescriptor(Vec<f32>);

impl BiometricDescriptor {
    /// Build a descriptor, rejecting empty input and non-finite values.
    ///
    /// Length against the deployment dimension is checked by the codec, which
    /// knows the configured dimension.
    pub fn new(values: Vec<f32>) -> Result<Self, DescriptorError> {
        if values.is_empty() {
            return Err(DescriptorError::InvalidDescriptor(
                "descriptor is empty".to_string(),
            ));
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(DescriptorError::InvalidDescriptor(format!(
                "element {index} is not a finite number"
            )));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed descriptor; provided for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<f32>> for BiometricDescriptor {
    type Error = DescriptorError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<BiometricDescriptor> for Vec<f32> {
    fn from(d: BiometricDescriptor) -> Self {
        d.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            BiometricDescriptor::new(vec![]),
            Err(DescriptorError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn rejects_nan_and_infinity() {
        assert!(BiometricDescriptor::new(vec![0.1, f32::NAN]).is_err());
        assert!(BiometricDescriptor::new(vec![f32::INFINITY]).is_err());
    }

    #[test]
    fn serializes_as_plain_array() {
        let d = BiometricDescriptor::new(vec![0.5, -0.25]).unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "[0.5,-0.25]");
        let back: BiometricDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn deserialization_validates() {
        let res: Result<BiometricDescriptor, _> = serde_json::from_str("[]");
        assert!(res.is_err());
    }

    #[test]
    fn bincode_round_trip() {
        let d = BiometricDescriptor::new(vec![0.1; 8]).unwrap();
        let bytes = bincode::serialize(&d).unwrap();
        let back: BiometricDescriptor = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, d);
    }
}
