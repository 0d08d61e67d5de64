//! # Vault Events
//!
//! The observer-facing record of everything that changed vault state.
//! Indexers, the manager's audit log, and dashboards all consume these;
//! the vault itself never reads them back.
//!
//! Events are buffered on the vault and drained with
//! [`Vault::take_events`](super::Vault::take_events) — the engine has no
//! opinion about where they go, only that every state change produces
//! exactly one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::address::Address;
use crate::ledger::asset::CollateralId;

/// A state-changing vault operation, as observed from outside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    /// A collateral type was added to the allow-list.
    CollateralAdded {
        collateral: CollateralId,
        symbol: String,
        at: DateTime<Utc>,
    },

    /// A collateral type was removed from the allow-list.
    CollateralRemoved {
        collateral: CollateralId,
        symbol: String,
        at: DateTime<Utc>,
    },

    /// The manager topped up settlement-asset liquidity.
    LiquidityAdded { amount: u128, at: DateTime<Utc> },

    /// The manager withdrew settlement-asset liquidity.
    LiquidityRemoved { amount: u128, at: DateTime<Utc> },

    /// A depositor exchanged collateral for shares.
    CollateralDeposited {
        depositor: Address,
        collateral: CollateralId,
        amount: u128,
        shares: u128,
        receiver: Address,
        at: DateTime<Utc>,
    },

    /// A redemption settled: shares burned, settlement asset paid.
    /// Emitted once per request, batch or single.
    WithdrawalProcessed {
        owner: Address,
        destination: Address,
        assets: u128,
        shares: u128,
        round: u64,
        at: DateTime<Utc>,
    },

    /// The valuation reporter was replaced.
    ReporterChanged { at: DateTime<Utc> },
}
