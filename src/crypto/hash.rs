//! Blake2b digests used across the protocol.

use blake2::digest::consts::{U20, U32};
use blake2::{Blake2b, Digest};

/// 32-byte blake2b digest (operation hashes, signing payloads).
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let digest = Blake2b::<U32>::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// 20-byte blake2b digest (public key hashes).
pub fn blake2b_160(data: &[u8]) -> [u8; 20] {
    let digest = Blake2b::<U20>::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake2b_256_empty() {
        assert_eq!(
            hex::encode(blake2b_256(b"")),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }

    #[test]
    fn test_digest_lengths_differ() {
        let long = blake2b_256(b"tezos");
        let short = blake2b_160(b"tezos");
        // Output length is part of the blake2b parameter block.
        assert_ne!(&long[..20], &short[..]);
    }
}
