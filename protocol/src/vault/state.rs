//! # Vault State — Replay Protection and Custody Bookkeeping
//!
//! Two explicit, versioned state structs with single-writer discipline:
//! only the vault's own entry points mutate them, and they are plain data
//! passed through methods — no ambient globals, no statics, no interior
//! mutability.
//!
//! [`ReplayState`] is the authorization side: which (owner, nonce) pairs
//! have been consumed, and the monotonic round counter that lets the
//! manager void every outstanding signature older than a given round by
//! doing nothing more than advancing the number.
//!
//! [`Custody`] is the asset side: how much of each collateral the vault
//! believes it holds. It is bookkeeping, not custody itself — the tokens
//! live behind [`AssetToken`](crate::ledger::asset::AssetToken) — but the
//! liquidity checks that gate redemptions read from here, so it is updated
//! in the same atomic unit as every transfer.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use crate::ledger::address::Address;
use crate::ledger::asset::CollateralId;

/// Schema version of [`ReplayState`]. Bump on layout changes so persisted
/// state can't be misread across upgrades.
const REPLAY_STATE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from replay-state transitions.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The (owner, nonce) pair was already consumed. Spent flags move
    /// 0 → 1 exactly once; there is no way back.
    #[error("nonce {nonce} already spent for owner {owner}")]
    NonceAlreadySpent { owner: Address, nonce: u64 },
}

/// Errors from custody bookkeeping.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// Recording a withdrawal larger than the tracked balance.
    #[error("insufficient custody: holding {held}, withdrawing {requested} ({token})")]
    InsufficientCustody {
        token: CollateralId,
        held: u128,
        requested: u128,
    },

    /// Arithmetic overflow recording a deposit.
    #[error("custody overflow: holding {held}, depositing {deposit} ({token})")]
    Overflow {
        token: CollateralId,
        held: u128,
        deposit: u128,
    },
}

// ---------------------------------------------------------------------------
// ReplayState
// ---------------------------------------------------------------------------

/// Spent-nonce set plus the monotonic round counter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayState {
    /// Schema version for persisted state.
    version: u32,

    /// Consumed nonces per owner. A `BTreeSet` keeps serialized state
    /// deterministic, which matters when state digests are compared
    /// across manager replicas.
    spent: HashMap<Address, BTreeSet<u64>>,

    /// The current round. Never decreases; advanced on every processed
    /// redemption.
    round: u64,
}

impl Default for ReplayState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayState {
    /// Fresh state: round zero, nothing spent.
    pub fn new() -> Self {
        Self {
            version: REPLAY_STATE_VERSION,
            spent: HashMap::new(),
            round: 0,
        }
    }

    /// The current round.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Returns `true` if the (owner, nonce) pair has been consumed.
    pub fn is_spent(&self, owner: &Address, nonce: u64) -> bool {
        self.spent
            .get(owner)
            .map(|nonces| nonces.contains(&nonce))
            .unwrap_or(false)
    }

    /// Number of consumed nonces for an owner.
    pub fn spent_count(&self, owner: &Address) -> usize {
        self.spent.get(owner).map(BTreeSet::len).unwrap_or(0)
    }

    /// Consume a nonce. The 0 → 1 transition happens exactly once per
    /// (owner, nonce) pair; a second attempt is an error, not a no-op.
    pub(crate) fn mark_spent(&mut self, owner: &Address, nonce: u64) -> Result<(), ReplayError> {
        let nonces = self.spent.entry(*owner).or_default();
        if !nonces.insert(nonce) {
            return Err(ReplayError::NonceAlreadySpent {
                owner: *owner,
                nonce,
            });
        }
        Ok(())
    }

    /// Advance the round counter and return the new round.
    ///
    /// Every outstanding signature with `max_round` below the new value
    /// is dead from this moment. Saturating rather than wrapping: a u64
    /// of rounds outlasts the heat death of the vault, but a wrap to zero
    /// would resurrect every signature ever issued.
    pub(crate) fn advance_round(&mut self) -> u64 {
        self.round = self.round.saturating_add(1);
        self.round
    }
}

// ---------------------------------------------------------------------------
// Custody
// ---------------------------------------------------------------------------

/// Per-collateral balance bookkeeping for assets under vault custody.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Custody {
    /// Tracked balances by collateral id, in native units.
    balances: HashMap<CollateralId, u128>,
}

impl Custody {
    /// Empty bookkeeping: the vault holds nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracked balance for a collateral type.
    pub fn balance(&self, token: &CollateralId) -> u128 {
        self.balances.get(token).copied().unwrap_or(0)
    }

    /// Record an inbound transfer.
    pub(crate) fn record_deposit(
        &mut self,
        token: CollateralId,
        amount: u128,
    ) -> Result<u128, CustodyError> {
        let held = self.balances.entry(token).or_insert(0);
        let new_held = held.checked_add(amount).ok_or(CustodyError::Overflow {
            token,
            held: *held,
            deposit: amount,
        })?;
        *held = new_held;
        Ok(new_held)
    }

    /// Record an outbound transfer.
    pub(crate) fn record_withdrawal(
        &mut self,
        token: CollateralId,
        amount: u128,
    ) -> Result<u128, CustodyError> {
        let held = self.balance(&token);
        if held < amount {
            return Err(CustodyError::InsufficientCustody {
                token,
                held,
                requested: amount,
            });
        }
        self.balances.insert(token, held - amount);
        Ok(held - amount)
    }
}
