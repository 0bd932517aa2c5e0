//! Firmware checksum
//!
//! The device reports a 64-bit checksum of the object it was built from,
//! which lets a host tool check that a model belongs to the running
//! firmware. It is the SHA-256 digest of the object reduced modulo 2^64.
//!
//! Firmware built with the SHA-1 based checksum of older host tools carries
//! a different value: the two are not interchangeable, and a document from
//! this crate only matches firmware whose checksum was computed the same way.

use byteorder::{BigEndian, ByteOrder};
use sha2::{Digest, Sha256};

/// 64-bit checksum of an object file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FirmwareChecksum(u64);

impl FirmwareChecksum {
    pub fn compute(object: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(object);
        let digest = hasher.finalize();

        // The low 64 bits of the big-endian digest value
        Self(BigEndian::read_u64(&digest[digest.len() - 8..]))
    }

    /// Byte layout stored in the firmware
    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_le_bytes())
    }
}

impl std::fmt::Display for FirmwareChecksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_of_empty_object() {
        // SHA-256("") ends in ...a495991b7852b855
        let checksum = FirmwareChecksum::compute(b"");
        assert_eq!(checksum.to_le_bytes(), 0xa495_991b_7852_b855u64.to_le_bytes());
        assert_eq!(checksum.to_string(), checksum.to_hex());
        assert_eq!(checksum.to_hex(), "55b852781b9995a4");
    }

    #[test]
    fn test_checksum_depends_on_content() {
        let a = FirmwareChecksum::compute(b"\x7fELF one");
        let b = FirmwareChecksum::compute(b"\x7fELF two");
        assert_ne!(a, b);
        assert_eq!(a, FirmwareChecksum::compute(b"\x7fELF one"));
    }
}
