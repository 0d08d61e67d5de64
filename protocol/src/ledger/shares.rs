//! # Share Ledger
//!
//! The vault's own accounting book: who owns how many shares, who has
//! authorized whom to redeem on their behalf, and how many shares exist
//! at all.
//!
//! Shares are 18-decimal fixed point. The ledger enforces one invariant
//! above all others: **the sum of all balances equals the total supply**,
//! and supply only ever changes through mint-on-deposit and
//! burn-on-redeem. Both of those are `pub(crate)` — the vault is the only
//! component that may move supply, and the compiler enforces it so we
//! don't have to trust discipline.
//!
//! Allowances follow the familiar owner → spender model: a share owner
//! grants the manager a redemption allowance once, and batch settlement
//! spends it down as redemptions execute.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::address::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during share-ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Attempted to burn or transfer more shares than the owner holds.
    #[error("insufficient shares: owner has {available}, requested {requested}")]
    InsufficientShares { available: u128, requested: u128 },

    /// The spender's allowance does not cover the requested amount.
    #[error("insufficient allowance: granted {granted}, requested {requested}")]
    InsufficientAllowance { granted: u128, requested: u128 },

    /// Arithmetic overflow on a mint or approval.
    ///
    /// With 18-decimal shares and u128 arithmetic, hitting this means
    /// someone minted more than 3.4 * 10^20 whole shares. That's a bug
    /// or an attack, not a Tuesday.
    #[error("share supply overflow: current {current}, minting {minting}")]
    SupplyOverflow { current: u128, minting: u128 },
}

// ---------------------------------------------------------------------------
// ShareLedger
// ---------------------------------------------------------------------------

/// Per-owner share balances, allowances, and total supply.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ShareLedger {
    /// Share balances by owner.
    balances: HashMap<Address, u128>,

    /// Redemption allowances: owner → spender → remaining shares.
    /// Nested rather than tuple-keyed so the ledger stays representable
    /// as JSON (object keys must be strings).
    allowances: HashMap<Address, HashMap<Address, u128>>,

    /// Total shares in existence. Always equals the sum of `balances`.
    total_supply: u128,
}

impl ShareLedger {
    /// Creates an empty ledger: no shares, no owners, no allowances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares held by `owner`. Unknown owners hold zero.
    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Total shares in existence.
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Remaining allowance granted by `owner` to `spender`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|grants| grants.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct owners with a balance entry (including zeros
    /// left behind by full redemptions).
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Grant `spender` the right to redeem up to `amount` of `owner`'s
    /// shares. Overwrites any previous allowance — the set-to-zero-first
    /// dance is a footgun we decline to import.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) {
        if amount == 0 {
            if let Some(grants) = self.allowances.get_mut(owner) {
                grants.remove(spender);
                if grants.is_empty() {
                    self.allowances.remove(owner);
                }
            }
        } else {
            self.allowances
                .entry(*owner)
                .or_default()
                .insert(*spender, amount);
        }
    }

    /// Mint `amount` shares to `owner`. Vault-internal: the only path here
    /// is a collateral deposit that already passed NAV conversion.
    pub(crate) fn mint(&mut self, owner: &Address, amount: u128) -> Result<u128, LedgerError> {
        let new_supply =
            self.total_supply
                .checked_add(amount)
                .ok_or(LedgerError::SupplyOverflow {
                    current: self.total_supply,
                    minting: amount,
                })?;

        // Balance cannot overflow if supply didn't: balance <= supply.
        let balance = self.balances.entry(*owner).or_insert(0);
        *balance += amount;
        self.total_supply = new_supply;
        Ok(*balance)
    }

    /// Burn `amount` shares from `owner`. Vault-internal: the only path
    /// here is a verified redemption.
    pub(crate) fn burn(&mut self, owner: &Address, amount: u128) -> Result<u128, LedgerError> {
        let balance = self.balance_of(owner);
        if balance < amount {
            return Err(LedgerError::InsufficientShares {
                available: balance,
                requested: amount,
            });
        }

        self.balances.insert(*owner, balance - amount);
        self.total_supply -= amount;
        Ok(balance - amount)
    }

    /// Spend `amount` of the allowance `owner` granted `spender`.
    ///
    /// Fails without mutating anything if the allowance doesn't cover the
    /// amount.
    pub(crate) fn spend_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let granted = self.allowance(owner, spender);
        if granted < amount {
            return Err(LedgerError::InsufficientAllowance {
                granted,
                requested: amount,
            });
        }
        self.approve(owner, spender, granted - amount);
        Ok(())
    }

    /// Sum of all balances. Exposed for invariant checks in tests; in
    /// correct operation this always equals [`total_supply`](Self::total_supply).
    pub fn balance_sum(&self) -> u128 {
        self.balances.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::CofferKeypair;

    fn addr() -> Address {
        Address::from_public_key(&CofferKeypair::generate().public_key())
    }

    #[test]
    fn mint_credits_owner_and_supply() {
        let mut ledger = ShareLedger::new();
        let alice = addr();

        ledger.mint(&alice, 1_000).unwrap();
        assert_eq!(ledger.balance_of(&alice), 1_000);
        assert_eq!(ledger.total_supply(), 1_000);
    }

    #[test]
    fn burn_debits_owner_and_supply() {
        let mut ledger = ShareLedger::new();
        let alice = addr();

        ledger.mint(&alice, 1_000).unwrap();
        let remaining = ledger.burn(&alice, 400).unwrap();

        assert_eq!(remaining, 600);
        assert_eq!(ledger.balance_of(&alice), 600);
        assert_eq!(ledger.total_supply(), 600);
    }

    #[test]
    fn burn_more_than_balance_rejected() {
        let mut ledger = ShareLedger::new();
        let alice = addr();

        ledger.mint(&alice, 100).unwrap();
        let result = ledger.burn(&alice, 101);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientShares {
                available: 100,
                requested: 101,
            })
        ));
        // Nothing changed.
        assert_eq!(ledger.balance_of(&alice), 100);
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn supply_overflow_rejected() {
        let mut ledger = ShareLedger::new();
        let alice = addr();
        let bob = addr();

        ledger.mint(&alice, u128::MAX).unwrap();
        assert!(matches!(
            ledger.mint(&bob, 1),
            Err(LedgerError::SupplyOverflow { .. })
        ));
    }

    #[test]
    fn supply_equals_balance_sum_across_operations() {
        let mut ledger = ShareLedger::new();
        let alice = addr();
        let bob = addr();

        ledger.mint(&alice, 700).unwrap();
        ledger.mint(&bob, 300).unwrap();
        ledger.burn(&alice, 150).unwrap();
        ledger.burn(&bob, 300).unwrap();

        assert_eq!(ledger.balance_sum(), ledger.total_supply());
        assert_eq!(ledger.total_supply(), 550);
    }

    #[test]
    fn approve_and_spend_allowance() {
        let mut ledger = ShareLedger::new();
        let owner = addr();
        let manager = addr();

        ledger.approve(&owner, &manager, 500);
        assert_eq!(ledger.allowance(&owner, &manager), 500);

        ledger.spend_allowance(&owner, &manager, 200).unwrap();
        assert_eq!(ledger.allowance(&owner, &manager), 300);
    }

    #[test]
    fn spend_beyond_allowance_rejected() {
        let mut ledger = ShareLedger::new();
        let owner = addr();
        let manager = addr();

        ledger.approve(&owner, &manager, 100);
        let result = ledger.spend_allowance(&owner, &manager, 150);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientAllowance {
                granted: 100,
                requested: 150,
            })
        ));
        assert_eq!(ledger.allowance(&owner, &manager), 100);
    }

    #[test]
    fn approve_overwrites_not_accumulates() {
        let mut ledger = ShareLedger::new();
        let owner = addr();
        let manager = addr();

        ledger.approve(&owner, &manager, 100);
        ledger.approve(&owner, &manager, 40);
        assert_eq!(ledger.allowance(&owner, &manager), 40);
    }

    #[test]
    fn zero_approve_clears_entry() {
        let mut ledger = ShareLedger::new();
        let owner = addr();
        let manager = addr();

        ledger.approve(&owner, &manager, 100);
        ledger.approve(&owner, &manager, 0);
        assert_eq!(ledger.allowance(&owner, &manager), 0);
    }

    #[test]
    fn allowances_are_directional() {
        let mut ledger = ShareLedger::new();
        let owner = addr();
        let manager = addr();

        ledger.approve(&owner, &manager, 100);
        assert_eq!(ledger.allowance(&manager, &owner), 0);
    }

    #[test]
    fn serialization_roundtrip() {
        let mut ledger = ShareLedger::new();
        let alice = addr();
        let manager = addr();
        ledger.mint(&alice, 42).unwrap();
        ledger.approve(&alice, &manager, 7);

        let json = serde_json::to_string(&ledger).expect("serialize");
        let recovered: ShareLedger = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered.balance_of(&alice), 42);
        assert_eq!(recovered.total_supply(), 42);
        assert_eq!(recovered.allowance(&alice, &manager), 7);
    }
}
