//! # Collateral Registry
//!
//! The manager-controlled allow-list of deposit assets. Every entry is a
//! BTC-denominated token at the protocol's fixed 8-decimal precision,
//! valued 1:1 against the settlement asset — wrapped, bridged, and
//! threshold variants of the same underlying bitcoin.
//!
//! Two rules the registry enforces without exception:
//!
//! - **Fixed precision.** A token whose `decimals()` isn't exactly the
//!   protocol precision never gets in. "1:1 in value terms" is only
//!   arithmetic-safe when every unit means the same thing.
//! - **The settlement asset is permanent.** It is registered at
//!   construction and `remove` refuses to touch it — a vault that can't
//!   accept its own redemption asset is a vault that can't redeem.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::COLLATERAL_DECIMALS;
use crate::ledger::asset::{AssetToken, CollateralId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The token's precision doesn't match the protocol's fixed precision.
    #[error("collateral precision mismatch: expected {expected} decimals, got {got} ({symbol})")]
    DecimalMismatch {
        symbol: String,
        expected: u8,
        got: u8,
    },

    /// The token is already registered.
    #[error("collateral already registered: {0}")]
    AlreadyRegistered(CollateralId),

    /// The token is not in the registry.
    #[error("collateral not registered: {0}")]
    NotRegistered(CollateralId),

    /// Attempted to remove the settlement asset.
    #[error("the settlement asset cannot be removed from the registry")]
    SettlementAssetProtected,
}

// ---------------------------------------------------------------------------
// CollateralInfo
// ---------------------------------------------------------------------------

/// Registry record for one accepted collateral type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralInfo {
    /// Content-addressed token identity.
    pub id: CollateralId,

    /// Ticker symbol, for events and logs.
    pub symbol: String,

    /// Decimal precision. Always [`COLLATERAL_DECIMALS`] once registered;
    /// recorded anyway so serialized registries are self-describing.
    pub decimals: u8,
}

// ---------------------------------------------------------------------------
// CollateralRegistry
// ---------------------------------------------------------------------------

/// The allow-list of deposit assets, plus the settlement-asset designation.
///
/// Entries are kept both in a lookup map and in an insertion-ordered list
/// so observers can enumerate supported collateral deterministically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollateralRegistry {
    /// Registered collateral by id.
    entries: HashMap<CollateralId, CollateralInfo>,

    /// Registration order, for enumeration.
    order: Vec<CollateralId>,

    /// The one asset redemptions pay out in. Always a registry member.
    settlement: CollateralId,
}

impl CollateralRegistry {
    /// Creates a registry with the settlement asset as its first —
    /// and permanent — member.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DecimalMismatch`] if the settlement asset itself
    /// doesn't carry the protocol precision.
    pub fn new(settlement_asset: &dyn AssetToken) -> Result<Self, RegistryError> {
        let mut registry = Self {
            entries: HashMap::new(),
            order: Vec::new(),
            settlement: settlement_asset.id(),
        };
        registry.insert(settlement_asset)?;
        Ok(registry)
    }

    /// The settlement asset's id.
    pub fn settlement_asset(&self) -> CollateralId {
        self.settlement
    }

    /// Returns `true` if the token is an accepted deposit asset.
    pub fn is_supported(&self, id: &CollateralId) -> bool {
        self.entries.contains_key(id)
    }

    /// Registry record for a token, if registered.
    pub fn get(&self, id: &CollateralId) -> Option<&CollateralInfo> {
        self.entries.get(id)
    }

    /// All registered collateral, in registration order.
    pub fn supported(&self) -> impl Iterator<Item = &CollateralInfo> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Number of registered collateral types.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the registry is empty. It never is — the
    /// settlement asset is always present — but clippy asks, and the
    /// answer is honest.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Add a collateral type to the allow-list.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DecimalMismatch`] for wrong precision;
    /// [`RegistryError::AlreadyRegistered`] for duplicates.
    pub(crate) fn insert(&mut self, token: &dyn AssetToken) -> Result<(), RegistryError> {
        if token.decimals() != COLLATERAL_DECIMALS {
            return Err(RegistryError::DecimalMismatch {
                symbol: token.symbol().to_string(),
                expected: COLLATERAL_DECIMALS,
                got: token.decimals(),
            });
        }

        let id = token.id();
        if self.entries.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }

        self.entries.insert(
            id,
            CollateralInfo {
                id,
                symbol: token.symbol().to_string(),
                decimals: token.decimals(),
            },
        );
        self.order.push(id);
        Ok(())
    }

    /// Remove a collateral type from the allow-list.
    ///
    /// Removal stops new deposits of that token; custody already held is
    /// unaffected.
    ///
    /// # Errors
    ///
    /// [`RegistryError::SettlementAssetProtected`] for the settlement
    /// asset; [`RegistryError::NotRegistered`] for unknown tokens.
    pub(crate) fn remove(&mut self, id: &CollateralId) -> Result<CollateralInfo, RegistryError> {
        if *id == self.settlement {
            return Err(RegistryError::SettlementAssetProtected);
        }
        let info = self
            .entries
            .remove(id)
            .ok_or(RegistryError::NotRegistered(*id))?;
        self.order.retain(|entry| entry != id);
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::asset::LedgerToken;

    fn wbtc() -> LedgerToken {
        LedgerToken::new("Wrapped Bitcoin", "wBTC", 8)
    }

    fn tbtc() -> LedgerToken {
        LedgerToken::new("Threshold Bitcoin", "tBTC", 8)
    }

    #[test]
    fn settlement_asset_is_registered_at_construction() {
        let settlement = wbtc();
        let registry = CollateralRegistry::new(&settlement).unwrap();

        assert_eq!(registry.settlement_asset(), settlement.id());
        assert!(registry.is_supported(&settlement.id()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn wrong_precision_settlement_asset_rejected() {
        let bad = LedgerToken::new("Wrapped Bitcoin", "wBTC", 18);
        assert!(matches!(
            CollateralRegistry::new(&bad),
            Err(RegistryError::DecimalMismatch {
                expected: 8,
                got: 18,
                ..
            })
        ));
    }

    #[test]
    fn add_and_enumerate_in_order() {
        let settlement = wbtc();
        let mut registry = CollateralRegistry::new(&settlement).unwrap();
        let second = tbtc();
        registry.insert(&second).unwrap();

        let symbols: Vec<&str> = registry.supported().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["wBTC", "tBTC"]);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let settlement = wbtc();
        let mut registry = CollateralRegistry::new(&settlement).unwrap();
        assert!(matches!(
            registry.insert(&wbtc()),
            Err(RegistryError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn wrong_precision_collateral_rejected() {
        let settlement = wbtc();
        let mut registry = CollateralRegistry::new(&settlement).unwrap();
        let six_dec = LedgerToken::new("Hex Bitcoin", "hBTC", 6);
        assert!(matches!(
            registry.insert(&six_dec),
            Err(RegistryError::DecimalMismatch { got: 6, .. })
        ));
        assert!(!registry.is_supported(&six_dec.id()));
    }

    #[test]
    fn remove_collateral() {
        let settlement = wbtc();
        let mut registry = CollateralRegistry::new(&settlement).unwrap();
        let second = tbtc();
        registry.insert(&second).unwrap();

        let removed = registry.remove(&second.id()).unwrap();
        assert_eq!(removed.symbol, "tBTC");
        assert!(!registry.is_supported(&second.id()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn settlement_asset_cannot_be_removed() {
        let settlement = wbtc();
        let mut registry = CollateralRegistry::new(&settlement).unwrap();
        assert!(matches!(
            registry.remove(&settlement.id()),
            Err(RegistryError::SettlementAssetProtected)
        ));
        assert!(registry.is_supported(&settlement.id()));
    }

    #[test]
    fn removing_unknown_collateral_rejected() {
        let settlement = wbtc();
        let mut registry = CollateralRegistry::new(&settlement).unwrap();
        assert!(matches!(
            registry.remove(&tbtc().id()),
            Err(RegistryError::NotRegistered(_))
        ));
    }

    #[test]
    fn serialization_roundtrip() {
        let settlement = wbtc();
        let mut registry = CollateralRegistry::new(&settlement).unwrap();
        registry.insert(&tbtc()).unwrap();

        let json = serde_json::to_string(&registry).expect("serialize");
        let recovered: CollateralRegistry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered.len(), 2);
        assert_eq!(recovered.settlement_asset(), settlement.id());
    }
}
