use sha2::{Digest, Sha256};

/// Incremental SHA-256 over an unambiguous field encoding.
///
/// Integers are written as fixed-width little-endian `u64`, strings and byte
/// slices are prefixed with their length, so no two distinct field sequences
/// share an encoding.
#[derive(Default)]
pub struct FieldHasher {
    hasher: Sha256,
}

impl FieldHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.u64(value.len() as u64);
        self.hasher.update(value);
        self
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}
