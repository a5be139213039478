//! Canonical descriptor encoding and digest derivation.
//!
//! Layout: `u32` LE element count, then each element's IEEE-754 bit pattern
//! as `u32` LE. The encoding never formats floats as text, so it is stable
//! across locales and float printers. `0.0` and `-0.0` encode differently and
//! therefore digest differently.

use faceid_types::{BiometricDescriptor, DescriptorDigest, DescriptorError};

use crate::blake2b_256;

const LEN_PREFIX: usize = 4;
const ELEMENT_SIZE: usize = 4;

/// Encodes and digests descriptors of one fixed deployment dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorCodec {
    dimension: usize,
}

impl DescriptorCodec {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Reject empty descriptors and descriptors of the wrong length.
    pub fn validate(&self, descriptor: &BiometricDescriptor) -> Result<(), DescriptorError> {
        if descriptor.is_empty() {
            return Err(DescriptorError::InvalidDescriptor(
                "descriptor is empty".to_string(),
            ));
        }
        if descriptor.len() != self.dimension {
            return Err(DescriptorError::InvalidDescriptor(format!(
                "expected {} elements, got {}",
                self.dimension,
                descriptor.len()
            )));
        }
        Ok(())
    }

    /// Canonical byte encoding of a validated descriptor.
    pub fn serialize(&self, descriptor: &BiometricDescriptor) -> Result<Vec<u8>, DescriptorError> {
        self.validate(descriptor)?;
        let values = descriptor.as_slice();
        let mut out = Vec::with_capacity(LEN_PREFIX + values.len() * ELEMENT_SIZE);
        out.extend_from_slice(&(values.len() as u32).to_le_bytes());
        for v in values {
            out.extend_from_slice(&v.to_bits().to_le_bytes());
        }
        Ok(out)
    }

    /// Blake2b-256 of the canonical encoding.
    pub fn digest(&self, descriptor: &BiometricDescriptor) -> Result<DescriptorDigest, DescriptorError> {
        let bytes = self.serialize(descriptor)?;
        Ok(DescriptorDigest::new(blake2b_256(&bytes)))
    }

    /// Inverse of [`DescriptorCodec::serialize`].
    pub fn decode(&self, bytes: &[u8]) -> Result<BiometricDescriptor, DescriptorError> {
        if bytes.len() < LEN_PREFIX {
            return Err(DescriptorError::InvalidDescriptor(
                "encoding shorter than length prefix".to_string(),
            ));
        }
        let (prefix, body) = bytes.split_at(LEN_PREFIX);
        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(prefix);
        let count = u32::from_le_bytes(len_bytes) as usize;

        if body.len() != count * ELEMENT_SIZE {
            return Err(DescriptorError::InvalidDescriptor(format!(
                "length prefix says {count} elements but body holds {} bytes",
                body.len()
            )));
        }

        let values = body
            .chunks_exact(ELEMENT_SIZE)
            .map(|chunk| {
                let mut b = [0u8; ELEMENT_SIZE];
                b.copy_from_slice(chunk);
                f32::from_bits(u32::from_le_bytes(b))
            })
            .collect();
        let descriptor = BiometricDescriptor::new(values)?;
        self.validate(&descriptor)?;
        Ok(descriptor)
    }
}
