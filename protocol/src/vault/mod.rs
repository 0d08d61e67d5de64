//! # The Vault
//!
//! The aggregate that ties the protocol together: the collateral registry,
//! the custody bookkeeping, the share ledger, the replay-protection state,
//! and the reporter handle, all owned by one [`Vault`] value with
//! single-writer discipline — every mutation goes through a `&mut self`
//! entry point, and the pieces change together or not at all.
//!
//! The division of labor mirrors the protocol roles:
//!
//! - This module: construction, manager-gated registry/liquidity/reporter
//!   management, valuation snapshots, and the multi-collateral deposit
//!   path.
//! - [`redemption`]: the signed single-withdrawal and batch-settlement
//!   paths, where shares leave the world.
//!
//! ## Two roles, two kinds of authority
//!
//! The **manager** may execute: add and remove collateral, move
//! liquidity, submit redemptions. A share **owner** may consent: sign
//! withdrawal authorizations, grant allowances. Neither authority
//! substitutes for the other — a manager without an owner's signature
//! cannot touch the owner's shares, and an owner without the manager
//! cannot force a settlement.

pub mod collateral;
pub mod events;
pub mod nav;
pub mod redemption;
pub mod reporter;
pub mod state;
pub mod withdrawal;

pub use collateral::{CollateralInfo, CollateralRegistry, RegistryError};
pub use events::VaultEvent;
pub use nav::NavError;
pub use redemption::{BatchSettlement, HookRejection, Redemption, SettledItem, WithdrawHook};
pub use reporter::{ReportedValue, Reporter, ReporterError, StaticReporter};
pub use state::{Custody, ReplayState};
pub use withdrawal::{SignedWithdrawal, SigningDomain, WithdrawalError, WithdrawalRequest};

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::config::MIN_DEPOSIT;
use crate::ledger::address::Address;
use crate::ledger::asset::{AssetError, AssetToken, CollateralId};
use crate::ledger::shares::{LedgerError, ShareLedger};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The vault's error umbrella.
///
/// Input-validation and role failures get their own variants; lower-layer
/// failures bubble up through `#[from]` conversions so callers can match
/// on exactly the stage that failed.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The caller is not the manager.
    #[error("caller {caller} is not the vault manager")]
    NotManager { caller: Address },

    /// A zero amount where a positive one is required.
    #[error("amount must be positive")]
    ZeroAmount,

    /// The null address where a real one is required.
    #[error("the null address cannot receive value")]
    NullAddress,

    /// The deposit token is not on the allow-list.
    #[error("unsupported collateral: {0}")]
    UnsupportedCollateral(CollateralId),

    /// The deposit is below the protocol floor.
    #[error("deposit {amount} below minimum {minimum}")]
    BelowMinimumDeposit { amount: u128, minimum: u128 },

    /// The deposit converts to zero shares at the current valuation.
    /// Minting a zero-value position helps nobody and corrupts averages.
    #[error("deposit converts to zero shares at the current valuation")]
    ZeroShares,

    /// The generic single-asset `deposit`/`mint` entry points are
    /// permanently disabled on this vault type; only
    /// [`Vault::deposit_collateral`] creates shares.
    #[error("direct deposit/mint entry points are disabled; use deposit_collateral")]
    DirectEntryDisabled,

    /// The token handed to a settlement operation isn't the settlement
    /// asset.
    #[error("wrong settlement asset: expected {expected}, got {got}")]
    WrongSettlementAsset {
        expected: CollateralId,
        got: CollateralId,
    },

    /// Batch input slices disagree on length.
    #[error("batch array length mismatch: shares {shares}, destinations {destinations}, owners {owners}, minimums {minimums}")]
    LengthMismatch {
        shares: usize,
        destinations: usize,
        owners: usize,
        minimums: usize,
    },

    /// A batch with no items is a bug in the caller, not a settlement.
    #[error("empty batch")]
    EmptyBatch,

    /// Redeeming more shares than `max_redeem(owner)` allows.
    #[error("redeem of {requested} exceeds max_redeem {available} for {owner}")]
    ExceedsMaxRedeem {
        owner: Address,
        requested: u128,
        available: u128,
    },

    /// A batch item's previewed output falls short of its declared floor.
    #[error("item {index}: previewed output {previewed} below minimum {minimum}")]
    OutputBelowMinimum {
        index: usize,
        previewed: u128,
        minimum: u128,
    },

    /// Custody cannot cover the settlement. Retryable after a liquidity
    /// top-up; never consumes replay state.
    #[error("insufficient settlement liquidity: available {available}, required {required}")]
    InsufficientLiquidity { available: u128, required: u128 },

    /// A pre-withdrawal hook refused an item.
    #[error("withdrawal hook rejected item {index}: {reason}")]
    HookRejected { index: usize, reason: String },

    /// Valuation boundary failure.
    #[error(transparent)]
    Reporter(#[from] ReporterError),

    /// Registry failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Conversion arithmetic failure.
    #[error(transparent)]
    Nav(#[from] NavError),

    /// Share-ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Authorization failure on a signed withdrawal.
    #[error(transparent)]
    Withdrawal(#[from] WithdrawalError),

    /// Asset-token failure.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Custody bookkeeping failure.
    #[error(transparent)]
    Custody(#[from] state::CustodyError),
}

// ---------------------------------------------------------------------------
// Configuration & snapshots
// ---------------------------------------------------------------------------

/// Identity and authority configuration fixed at construction.
#[derive(Clone, Debug)]
pub struct VaultConfig {
    /// Network this vault instance lives on; bound into the signing domain.
    pub network_id: u32,

    /// The vault's own address: custody account and signing-domain
    /// verifier.
    pub address: Address,

    /// The single manager authority.
    pub manager: Address,
}

/// A valuation pulled fresh from the reporter, valid for exactly one
/// entry point.
///
/// Every conversion inside a compound operation (a batch, a deposit)
/// prices against the same snapshot; snapshots are never cached across
/// operations or mixed within one.
#[derive(Clone, Copy, Debug)]
pub struct ValuationSnapshot {
    /// Total vault value at 18-decimal share precision.
    pub total_assets: u128,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// The vault engine. See the module docs for the role model.
pub struct Vault {
    config: VaultConfig,
    reporter: Box<dyn Reporter>,
    registry: CollateralRegistry,
    custody: Custody,
    shares: ShareLedger,
    replay: ReplayState,
    hooks: Vec<Box<dyn WithdrawHook>>,
    events: Vec<VaultEvent>,
}

impl Vault {
    /// Create a vault around a settlement asset and a reporter.
    ///
    /// The settlement asset is registered as the first, permanent
    /// collateral; its precision is checked here, at construction, so a
    /// misconfigured vault never exists at all.
    pub fn new(
        config: VaultConfig,
        settlement_asset: &dyn AssetToken,
        reporter: Box<dyn Reporter>,
    ) -> Result<Self, VaultError> {
        let registry = CollateralRegistry::new(settlement_asset)?;
        Ok(Self {
            config,
            reporter,
            registry,
            custody: Custody::new(),
            shares: ShareLedger::new(),
            replay: ReplayState::new(),
            hooks: Vec::new(),
            events: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The vault's own address (custody account, domain verifier).
    pub fn address(&self) -> Address {
        self.config.address
    }

    /// The manager authority.
    pub fn manager(&self) -> Address {
        self.config.manager
    }

    /// The signing domain withdrawal authorizations must bind to.
    pub fn domain(&self) -> SigningDomain {
        SigningDomain::new(self.config.network_id, self.config.address)
    }

    /// The collateral registry, read-only.
    pub fn registry(&self) -> &CollateralRegistry {
        &self.registry
    }

    /// Shares held by `owner`.
    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.shares.balance_of(owner)
    }

    /// Total shares outstanding.
    pub fn total_supply(&self) -> u128 {
        self.shares.total_supply()
    }

    /// Remaining redemption allowance from `owner` to `spender`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.shares.allowance(owner, spender)
    }

    /// The current replay-protection round.
    pub fn current_round(&self) -> u64 {
        self.replay.round()
    }

    /// Returns `true` if `owner`'s `nonce` has been consumed.
    pub fn is_nonce_spent(&self, owner: &Address, nonce: u64) -> bool {
        self.replay.is_spent(owner, nonce)
    }

    /// Settlement-asset custody available to pay redemptions.
    pub fn settlement_liquidity(&self) -> u128 {
        self.custody.balance(&self.registry.settlement_asset())
    }

    /// Tracked custody balance for any collateral.
    pub fn custody_balance(&self, token: &CollateralId) -> u128 {
        self.custody.balance(token)
    }

    /// Grant `spender` a redemption allowance over `owner`'s shares.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) {
        self.shares.approve(owner, spender, amount);
    }

    /// Drain buffered events for indexers.
    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Valuation
    // -----------------------------------------------------------------------

    /// Pull a fresh valuation from the reporter.
    ///
    /// A `Balance` report arrives in native precision and is scaled up; a
    /// `PricePerShare` report is 18-decimal and is multiplied out against
    /// the current supply. Reporter failure is conversion failure — there
    /// is no fallback number.
    pub fn valuation(&self) -> Result<ValuationSnapshot, VaultError> {
        let frame = self.reporter.report()?;
        let total_assets = match ReportedValue::decode(&frame)? {
            ReportedValue::Balance(native) => nav::scale_to_shares(native)?,
            ReportedValue::PricePerShare(pps) => {
                nav::mul_div(pps, self.shares.total_supply(), crate::config::ONE_SHARE)?
            }
        };
        Ok(ValuationSnapshot { total_assets })
    }

    /// Total vault value at 18-decimal precision, freshly reported.
    pub fn total_assets(&self) -> Result<u128, VaultError> {
        Ok(self.valuation()?.total_assets)
    }

    /// Shares a native-precision asset amount converts to right now.
    pub fn convert_to_shares(&self, assets: u128) -> Result<u128, VaultError> {
        let snapshot = self.valuation()?;
        Ok(nav::convert_to_shares(
            nav::scale_to_shares(assets)?,
            self.shares.total_supply(),
            snapshot.total_assets,
        )?)
    }

    /// Native-precision assets a share amount converts to right now.
    pub fn convert_to_assets(&self, shares: u128) -> Result<u128, VaultError> {
        let snapshot = self.valuation()?;
        let scaled = nav::convert_to_assets(
            shares,
            self.shares.total_supply(),
            snapshot.total_assets,
        )?;
        Ok(nav::scale_to_native(scaled))
    }

    // -----------------------------------------------------------------------
    // Deposits
    // -----------------------------------------------------------------------

    /// Deposit registered collateral and mint shares to `receiver`.
    ///
    /// The share count comes from the live NAV conversion against a
    /// snapshot taken inside this call — never from a fixed scale factor.
    /// A vault whose reported value has drifted above par mints fewer
    /// shares per unit than it did at launch, and that is the entire
    /// point.
    ///
    /// Effects, in order: collateral moves depositor → vault custody,
    /// custody bookkeeping records it, shares mint to the receiver, the
    /// event lands in the buffer.
    pub fn deposit_collateral(
        &mut self,
        token: &mut dyn AssetToken,
        depositor: &Address,
        amount: u128,
        receiver: &Address,
    ) -> Result<u128, VaultError> {
        let collateral = token.id();
        if !self.registry.is_supported(&collateral) {
            return Err(VaultError::UnsupportedCollateral(collateral));
        }
        if amount < MIN_DEPOSIT {
            return Err(VaultError::BelowMinimumDeposit {
                amount,
                minimum: MIN_DEPOSIT,
            });
        }
        if receiver.is_null() {
            return Err(VaultError::NullAddress);
        }

        // Price against a snapshot taken before this deposit's collateral
        // is counted anywhere.
        let snapshot = self.valuation()?;
        let shares = nav::convert_to_shares(
            nav::scale_to_shares(amount)?,
            self.shares.total_supply(),
            snapshot.total_assets,
        )?;
        if shares == 0 {
            return Err(VaultError::ZeroShares);
        }

        token.transfer(depositor, &self.config.address, amount)?;
        self.custody.record_deposit(collateral, amount)?;
        self.shares.mint(receiver, shares)?;

        info!(
            depositor = %depositor.short(),
            collateral = %token.symbol(),
            amount,
            shares,
            receiver = %receiver.short(),
            "collateral deposited"
        );
        self.events.push(VaultEvent::CollateralDeposited {
            depositor: *depositor,
            collateral,
            amount,
            shares,
            receiver: *receiver,
            at: Utc::now(),
        });

        Ok(shares)
    }

    /// Generic single-asset deposit, inherited from the standard vault
    /// vocabulary and permanently disabled here: it would bypass the
    /// collateral allow-list.
    pub fn deposit(&mut self, _assets: u128, _receiver: &Address) -> Result<u128, VaultError> {
        Err(VaultError::DirectEntryDisabled)
    }

    /// Generic mint-by-shares entry point. Disabled; see
    /// [`deposit`](Self::deposit).
    pub fn mint(&mut self, _shares: u128, _receiver: &Address) -> Result<u128, VaultError> {
        Err(VaultError::DirectEntryDisabled)
    }

    // -----------------------------------------------------------------------
    // Manager operations
    // -----------------------------------------------------------------------

    fn ensure_manager(&self, caller: &Address) -> Result<(), VaultError> {
        if *caller != self.config.manager {
            return Err(VaultError::NotManager { caller: *caller });
        }
        Ok(())
    }

    /// Add a collateral type to the allow-list. Manager only.
    pub fn add_collateral(
        &mut self,
        caller: &Address,
        token: &dyn AssetToken,
    ) -> Result<(), VaultError> {
        self.ensure_manager(caller)?;
        self.registry.insert(token)?;

        info!(collateral = %token.symbol(), "collateral added");
        self.events.push(VaultEvent::CollateralAdded {
            collateral: token.id(),
            symbol: token.symbol().to_string(),
            at: Utc::now(),
        });
        Ok(())
    }

    /// Remove a collateral type from the allow-list. Manager only; the
    /// settlement asset refuses to go.
    pub fn remove_collateral(
        &mut self,
        caller: &Address,
        collateral: &CollateralId,
    ) -> Result<(), VaultError> {
        self.ensure_manager(caller)?;
        let removed = self.registry.remove(collateral)?;

        info!(collateral = %removed.symbol, "collateral removed");
        self.events.push(VaultEvent::CollateralRemoved {
            collateral: *collateral,
            symbol: removed.symbol,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Top up settlement-asset liquidity from the manager's own balance.
    /// Manager only.
    pub fn add_liquidity(
        &mut self,
        caller: &Address,
        token: &mut dyn AssetToken,
        amount: u128,
    ) -> Result<(), VaultError> {
        self.ensure_manager(caller)?;
        self.expect_settlement(token)?;
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }

        token.transfer(caller, &self.config.address, amount)?;
        self.custody.record_deposit(token.id(), amount)?;

        info!(amount, "liquidity added");
        self.events.push(VaultEvent::LiquidityAdded {
            amount,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Withdraw settlement-asset liquidity back to the manager. Manager
    /// only; bounded by tracked custody.
    pub fn remove_liquidity(
        &mut self,
        caller: &Address,
        token: &mut dyn AssetToken,
        amount: u128,
    ) -> Result<(), VaultError> {
        self.ensure_manager(caller)?;
        self.expect_settlement(token)?;
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }

        let available = self.settlement_liquidity();
        if available < amount {
            return Err(VaultError::InsufficientLiquidity {
                available,
                required: amount,
            });
        }

        self.custody.record_withdrawal(token.id(), amount)?;
        token.transfer(&self.config.address, caller, amount)?;

        info!(amount, "liquidity removed");
        self.events.push(VaultEvent::LiquidityRemoved {
            amount,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Replace the valuation reporter. Manager only.
    pub fn set_reporter(
        &mut self,
        caller: &Address,
        reporter: Box<dyn Reporter>,
    ) -> Result<(), VaultError> {
        self.ensure_manager(caller)?;
        self.reporter = reporter;

        info!("reporter changed");
        self.events.push(VaultEvent::ReporterChanged { at: Utc::now() });
        Ok(())
    }

    /// Register a pre-withdrawal hook, consulted on every redemption.
    /// Manager only.
    pub fn add_hook(
        &mut self,
        caller: &Address,
        hook: Box<dyn WithdrawHook>,
    ) -> Result<(), VaultError> {
        self.ensure_manager(caller)?;
        self.hooks.push(hook);
        Ok(())
    }

    fn expect_settlement(&self, token: &dyn AssetToken) -> Result<(), VaultError> {
        let expected = self.registry.settlement_asset();
        if token.id() != expected {
            return Err(VaultError::WrongSettlementAsset {
                expected,
                got: token.id(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
