//! # Cryptographic Primitives for Coffer
//!
//! Everything security-related in the vault flows through here: the hash
//! functions behind addresses, collateral ids, and signing domains, and
//! the Ed25519 operations behind withdrawal authorizations.
//!
//! We deliberately chose boring, well-audited cryptography:
//!
//! - **Ed25519** for signatures — fast, deterministic, and nobody has
//!   broken it.
//! - **BLAKE3** for hashing — because we live in the future.
//! - **SHA-256** for request ids — because double-SHA-256 is the lingua
//!   franca of the bitcoin-adjacent world this vault settles in.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations. If you're tempted to optimize these functions, go
//! read about timing attacks and come back when you've lost the urge.

pub mod hash;
pub mod keys;
pub mod signatures;

// Re-export the things people actually need so they don't have to memorize
// our module hierarchy.
pub use hash::{blake3_hash, double_sha256, sha256};
pub use keys::{CofferKeypair, CofferPublicKey, CofferSignature};
pub use signatures::{sign, verify};
