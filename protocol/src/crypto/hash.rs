//! # Hashing Utilities
//!
//! Two hash functions, two jobs, and we refuse to support more without a
//! very good reason:
//!
//! - **BLAKE3** — the default. Addresses, collateral ids, and signing-domain
//!   separators are all BLAKE3 digests. Fast on every platform, SIMD-friendly,
//!   and a proper cryptographic hash.
//! - **SHA-256** — for the double-SHA-256 request ids that the off-chain
//!   manager tooling correlates against. Bitcoin chose it in 2009; the
//!   ecosystem around BTC-denominated assets still speaks it.
//!
//! When building Coffer-native data structures, prefer BLAKE3. When
//! producing identifiers external systems will grep their logs for, use
//! `double_sha256`.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// Returns a 32-byte digest as a `Vec<u8>`. Used primarily as the inner
/// stage of [`double_sha256`]; for Coffer-internal hashing prefer
/// [`blake3_hash`].
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute SHA-256 twice: `SHA-256(SHA-256(data))`.
///
/// The classic double-hash construction. Withdrawal-request ids use this
/// so that operators can compute them with any bitcoin-ecosystem tooling
/// lying around.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = sha256(data);
    let mut hasher = Sha256::new();
    hasher.update(&first);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the BLAKE3 hash of the input data.
///
/// Returns a 32-byte digest as a fixed-size array. The workhorse hash of
/// the protocol: address derivation, collateral content-addressing, and
/// domain separators all come through here.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3, hex-encoded. Convenience for logging and identifiers.
pub fn blake3_hex(data: &[u8]) -> String {
    hex::encode(blake3_hash(data))
}
