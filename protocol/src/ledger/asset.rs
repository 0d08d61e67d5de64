//! # Asset Tokens
//!
//! The collateral side of the vault: wrapped-bitcoin variants and the
//! settlement asset itself. The vault consumes these through the
//! [`AssetToken`] trait — balance, transfer, decimals — and treats the
//! implementation as someone else's problem, which it is: in production
//! the trait fronts an external custody system, in tests it fronts the
//! in-memory [`LedgerToken`] defined here.
//!
//! Token identity is content-addressed: a [`CollateralId`] is the BLAKE3
//! hash of the token's canonical properties, so the same token always gets
//! the same id with no registry coordination.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use super::address::Address;
use crate::crypto::hash::blake3_hash;

// ---------------------------------------------------------------------------
// CollateralId
// ---------------------------------------------------------------------------

/// A unique, content-addressed identifier for a collateral token type.
///
/// Computed as `BLAKE3(name || 0x00 || symbol)`. The separator byte
/// prevents ambiguity when one field's suffix matches another's prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollateralId([u8; 32]);

impl CollateralId {
    /// Creates a `CollateralId` from a raw 32-byte hash.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 32-byte identifier.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the hex-encoded id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded id.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Derives a `CollateralId` from the token's canonical properties.
    pub fn derive(name: &str, symbol: &str) -> Self {
        let mut preimage = Vec::with_capacity(name.len() + symbol.len() + 1);
        preimage.extend_from_slice(name.as_bytes());
        preimage.push(0x00);
        preimage.extend_from_slice(symbol.as_bytes());
        Self(blake3_hash(&preimage))
    }
}

impl Serialize for CollateralId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Hex string in human-readable formats so ids can key JSON maps;
        // raw bytes everywhere else.
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for CollateralId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            CollateralId::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            if bytes.len() != 32 {
                return Err(serde::de::Error::custom(format!(
                    "expected 32-byte collateral id, got {}",
                    bytes.len()
                )));
            }
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes);
            Ok(CollateralId(arr))
        }
    }
}

impl fmt::Debug for CollateralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollateralId({}...)", &self.to_hex()[..12])
    }
}

impl fmt::Display for CollateralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from asset-token operations.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Attempted to transfer more than the holder's balance.
    #[error("insufficient balance: available {available}, requested {requested} ({token})")]
    InsufficientBalance {
        token: CollateralId,
        available: u128,
        requested: u128,
    },

    /// Arithmetic overflow while crediting a balance.
    #[error("balance overflow: current {current}, credit {credit} ({token})")]
    Overflow {
        token: CollateralId,
        current: u128,
        credit: u128,
    },
}

// ---------------------------------------------------------------------------
// AssetToken trait
// ---------------------------------------------------------------------------

/// The collateral interface the vault consumes.
///
/// Matches what the vault actually needs from a token and nothing more:
/// identity, precision, balance queries, and transfers. Implementations
/// are expected to be atomic per call — a returned `Ok` means the transfer
/// fully happened.
pub trait AssetToken {
    /// Content-addressed identity of this token type.
    fn id(&self) -> CollateralId;

    /// Ticker symbol, for registry records and logs.
    fn symbol(&self) -> &str;

    /// Decimal precision of the token's base unit.
    ///
    /// The registry rejects tokens whose precision differs from the
    /// protocol's fixed collateral precision; pricing "1:1 in value terms"
    /// is only coherent when the units agree.
    fn decimals(&self) -> u8;

    /// Balance of `owner` in base units.
    fn balance_of(&self, owner: &Address) -> u128;

    /// Move `amount` base units from `from` to `to`.
    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), AssetError>;
}

// ---------------------------------------------------------------------------
// LedgerToken
// ---------------------------------------------------------------------------

/// An in-memory [`AssetToken`]: a balance map with checked arithmetic.
///
/// This is what tests, the demo, and off-chain custody deployments use.
/// It enforces the same discipline a real token would: no overdrafts, no
/// silent overflow, every transfer atomic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerToken {
    id: CollateralId,
    name: String,
    symbol: String,
    decimals: u8,
    balances: HashMap<Address, u128>,
}

impl LedgerToken {
    /// Creates a new token with no balances.
    pub fn new(name: &str, symbol: &str, decimals: u8) -> Self {
        Self {
            id: CollateralId::derive(name, symbol),
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            balances: HashMap::new(),
        }
    }

    /// Token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Credit `amount` to `owner` out of thin air.
    ///
    /// Issuance is the bridge/custodian's job, not the vault's; tests and
    /// demos use this to seed balances.
    pub fn mint(&mut self, owner: &Address, amount: u128) -> Result<u128, AssetError> {
        let balance = self.balances.entry(*owner).or_insert(0);
        let new_balance = balance.checked_add(amount).ok_or(AssetError::Overflow {
            token: self.id,
            current: *balance,
            credit: amount,
        })?;
        *balance = new_balance;
        Ok(new_balance)
    }

    /// Total of all balances. Handy for conservation checks in tests.
    pub fn total_issued(&self) -> u128 {
        self.balances.values().sum()
    }
}

impl AssetToken for LedgerToken {
    fn id(&self) -> CollateralId {
        self.id
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), AssetError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(AssetError::InsufficientBalance {
                token: self.id,
                available: from_balance,
                requested: amount,
            });
        }

        // Self-transfer: funds verified, nothing moves. Reading `to`'s
        // balance after debiting `from` would double-count otherwise.
        if from == to {
            return Ok(());
        }

        let to_balance = self.balance_of(to);
        let new_to = to_balance.checked_add(amount).ok_or(AssetError::Overflow {
            token: self.id,
            current: to_balance,
            credit: amount,
        })?;

        self.balances.insert(*from, from_balance - amount);
        self.balances.insert(*to, new_to);
        Ok(())
    }
}
