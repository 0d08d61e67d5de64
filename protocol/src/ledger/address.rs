//! # Addresses
//!
//! A Coffer address is the human-facing identity of a share owner, a
//! manager, or a payout destination. It is derived from an Ed25519 public
//! key via BLAKE3 hashing and bech32 encoding:
//!
//! ```text
//! public_key (32 bytes)
//!     -> BLAKE3(public_key) -> 32 bytes
//!     -> bech32("coffer", hash) -> coffer1qw508d6qe...
//! ```
//!
//! The `coffer` human-readable prefix makes addresses immediately
//! recognizable, and bech32's checksum catches the copy-paste mutilations
//! that happen when destinations travel through ticketing systems and
//! spreadsheets on their way to the manager.
//!
//! Hashing the key (rather than using it raw) keeps the address format
//! stable if the key scheme ever changes, and gives signature verification
//! a useful extra check: a presented public key must hash back to the
//! claimed owner address before its signature counts for anything.

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::MAINNET_HRP;
use crate::crypto::keys::CofferPublicKey;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while parsing an address.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The bech32 string could not be decoded.
    #[error("bech32 decode error: {0}")]
    Bech32Decode(String),

    /// The decoded address has an unexpected human-readable prefix.
    #[error("invalid HRP: expected '{expected}', got '{got}'")]
    InvalidHrp { expected: String, got: String },

    /// The decoded data has an unexpected length.
    #[error("invalid address data length: expected {expected} bytes, got {got}")]
    InvalidDataLength { expected: usize, got: usize },
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A Coffer address: the BLAKE3 hash of an Ed25519 public key.
///
/// `Copy` on purpose — addresses are 32 bytes and flow through every vault
/// operation; forcing `.clone()` everywhere would be noise.
///
/// # Examples
///
/// ```
/// use coffer_protocol::crypto::keys::CofferKeypair;
/// use coffer_protocol::ledger::Address;
///
/// let kp = CofferKeypair::generate();
/// let addr = Address::from_public_key(&kp.public_key());
/// let encoded = addr.to_bech32();
/// assert!(encoded.starts_with("coffer1"));
/// assert_eq!(Address::from_bech32(&encoded).unwrap(), addr);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// Derive an address from a public key.
    pub fn from_public_key(pk: &CofferPublicKey) -> Self {
        Self(*blake3::hash(pk.as_bytes()).as_bytes())
    }

    /// Construct an address from its raw 32-byte hash.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The all-zero address. Used as the "nobody" sentinel in input
    /// validation: minting to it or paying out to it is always rejected.
    pub fn null() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if this is the all-zero null address.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Returns the raw 32-byte hash underlying this address.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as a bech32 address string (`coffer1...`), checksum included.
    pub fn to_bech32(&self) -> String {
        let hrp = Hrp::parse(MAINNET_HRP).expect("static HRP is valid");
        bech32::encode::<Bech32>(hrp, &self.0)
            .expect("encoding a 32-byte payload should never fail")
    }

    /// Parse a bech32-encoded address. Validates HRP, checksum, and length.
    pub fn from_bech32(addr: &str) -> Result<Self, AddressError> {
        let (hrp, data) =
            bech32::decode(addr).map_err(|e| AddressError::Bech32Decode(e.to_string()))?;

        let expected_hrp = Hrp::parse(MAINNET_HRP).expect("static HRP is valid");
        if hrp != expected_hrp {
            return Err(AddressError::InvalidHrp {
                expected: MAINNET_HRP.to_string(),
                got: hrp.to_string(),
            });
        }

        if data.len() != 32 {
            return Err(AddressError::InvalidDataLength {
                expected: 32,
                got: data.len(),
            });
        }

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&data);
        Ok(Self(hash))
    }

    /// Short display form for logs: `coffer1qw50...8d6q`.
    pub fn short(&self) -> String {
        let full = self.to_bech32();
        if full.len() > 16 {
            format!("{}...{}", &full[..11], &full[full.len() - 4..])
        } else {
            full
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bech32())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_bech32())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Address::from_bech32(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            if bytes.len() != 32 {
                return Err(serde::de::Error::custom(format!(
                    "expected 32-byte address hash, got {}",
                    bytes.len()
                )));
            }
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&bytes);
            Ok(Address(hash))
        }
    }
}
