//! # Redemption — Where Shares Leave the World
//!
//! Two manager-gated paths out of the vault:
//!
//! - **Signed single withdrawal** ([`Vault::process_withdrawal`]): the
//!   owner's consent is an off-line signature over a
//!   [`WithdrawalRequest`](super::withdrawal::WithdrawalRequest); the
//!   manager's authority is the caller check. Both required, neither
//!   sufficient.
//! - **Batch settlement** ([`Vault::batch_redeem`]): many redemptions
//!   against one custody debit; consent is a standing share allowance
//!   from each owner to the manager.
//!
//! ## Validate, then apply
//!
//! Every fallible check — authorization, balances, liquidity, hooks —
//! runs before the first byte of state changes. The apply phase then
//! writes replay state (nonce spend, round advance) *before* any asset
//! transfer, so a resubmission racing the settlement finds the
//! authorization already consumed. Economic-guard failures (liquidity,
//! minimum output) happen in the validate phase and therefore never
//! consume a nonce: top up liquidity and the same signed request is
//! still good.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use super::nav;
use super::withdrawal::{SignedWithdrawal, WithdrawalError};
use super::{Vault, VaultError, VaultEvent};
use crate::ledger::address::Address;
use crate::ledger::asset::AssetToken;

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// A hook's refusal, with the reason the compliance layer gave.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookRejection(pub String);

/// A pre-withdrawal check consulted on every redemption, single or batch.
///
/// This is the seam where external compliance and policy modules plug in:
/// sanctions screening, per-owner rate limits, whatever the deployment
/// requires. A hook sees the settlement terms and may veto; it must not
/// assume any state has changed yet, because none has — hooks run in the
/// validate phase, and one veto aborts the entire operation.
pub trait WithdrawHook {
    /// Accept or reject a pending withdrawal.
    fn before_withdraw(
        &self,
        owner: &Address,
        destination: &Address,
        shares: u128,
        assets: u128,
    ) -> Result<(), HookRejection>;
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// The outcome of a single processed withdrawal.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Redemption {
    /// Shares burned.
    pub shares: u128,

    /// Settlement asset paid, native units.
    pub assets: u128,

    /// The round after this redemption.
    pub round: u64,
}

/// One settled line item of a batch.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SettledItem {
    /// Whose shares were burned.
    pub owner: Address,

    /// Where the assets went.
    pub destination: Address,

    /// Shares burned for this item.
    pub shares: u128,

    /// Assets paid for this item — its own independent preview, not a
    /// share of some pro-rated total.
    pub assets: u128,
}

/// The outcome of an atomic batch settlement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchSettlement {
    /// Total assets debited from custody, exactly once. Equals the sum
    /// of the items' `assets` — conservation is by construction, and the
    /// tests pin it anyway.
    pub total_assets: u128,

    /// Per-item settlement record, in input order.
    pub items: Vec<SettledItem>,

    /// The round after this batch.
    pub round: u64,
}

// ---------------------------------------------------------------------------
// Vault redemption paths
// ---------------------------------------------------------------------------

impl Vault {
    /// The most shares `owner` could redeem right now: their balance.
    ///
    /// Liquidity is deliberately not folded in — a redemption above
    /// current liquidity fails retryably rather than silently shrinking
    /// the owner's apparent entitlement.
    pub fn max_redeem(&self, owner: &Address) -> u128 {
        self.shares.balance_of(owner)
    }

    /// Native-precision assets `shares` would pay at the current
    /// valuation. Fresh snapshot per call.
    pub fn preview_redeem(&self, shares: u128) -> Result<u128, VaultError> {
        self.convert_to_assets(shares)
    }

    /// Execute one signed withdrawal. Manager only.
    ///
    /// Validation order, each stage its own error: expiration, round
    /// lapse, nonce reuse, signature. Only then the economics: balance,
    /// valuation, liquidity, hooks. The signed `amount` is
    /// share-denominated — exactly that many shares burn, and the payout
    /// is derived from the snapshot taken in this call.
    pub fn process_withdrawal(
        &mut self,
        caller: &Address,
        token: &mut dyn AssetToken,
        signed: &SignedWithdrawal,
    ) -> Result<Redemption, VaultError> {
        self.ensure_manager(caller)?;
        self.expect_settlement(token)?;

        let request = &signed.request;
        if request.shares == 0 {
            return Err(VaultError::ZeroAmount);
        }
        if request.destination.is_null() {
            return Err(VaultError::NullAddress);
        }

        // Stage 1: expiration.
        let now = Utc::now().timestamp().max(0) as u64;
        if request.expires_at < now {
            return Err(WithdrawalError::Expired {
                expires_at: request.expires_at,
                now,
            }
            .into());
        }

        // Stage 2: round lapse. Advancing the round voids every
        // outstanding authorization older than it — the manager's mass
        // kill switch after a valuation change.
        let current = self.replay.round();
        if request.max_round < current {
            return Err(WithdrawalError::RoundLapsed {
                max_round: request.max_round,
                current,
            }
            .into());
        }

        // Stage 3: nonce reuse.
        if self.replay.is_spent(&request.owner, request.nonce) {
            return Err(WithdrawalError::NonceReused {
                owner: request.owner,
                nonce: request.nonce,
            }
            .into());
        }

        // Stage 4: the signature itself, bound to this vault's domain.
        signed.verify_signature(&self.domain())?;

        // Economics: entitlement, valuation, liquidity, hooks.
        let available = self.max_redeem(&request.owner);
        if request.shares > available {
            return Err(VaultError::ExceedsMaxRedeem {
                owner: request.owner,
                requested: request.shares,
                available,
            });
        }

        let snapshot = self.valuation()?;
        let assets = nav::scale_to_native(nav::convert_to_assets(
            request.shares,
            self.shares.total_supply(),
            snapshot.total_assets,
        )?);

        let liquidity = self.settlement_liquidity();
        if liquidity < assets {
            return Err(VaultError::InsufficientLiquidity {
                available: liquidity,
                required: assets,
            });
        }

        for hook in &self.hooks {
            hook.before_withdraw(&request.owner, &request.destination, request.shares, assets)
                .map_err(|rejection| VaultError::HookRejected {
                    index: 0,
                    reason: rejection.to_string(),
                })?;
        }

        // Apply. Replay state first: the authorization is dead before any
        // value moves.
        self.replay
            .mark_spent(&request.owner, request.nonce)
            .map_err(|_| WithdrawalError::NonceReused {
                owner: request.owner,
                nonce: request.nonce,
            })?;
        let round = self.replay.advance_round();

        self.shares.burn(&request.owner, request.shares)?;
        self.custody
            .record_withdrawal(self.registry.settlement_asset(), assets)?;
        token.transfer(&self.config.address, &request.destination, assets)?;

        info!(
            request = %request.id(&self.domain()),
            owner = %request.owner.short(),
            destination = %request.destination.short(),
            shares = request.shares,
            assets,
            round,
            "withdrawal processed"
        );
        self.events.push(VaultEvent::WithdrawalProcessed {
            owner: request.owner,
            destination: request.destination,
            assets,
            shares: request.shares,
            round,
            at: Utc::now(),
        });

        Ok(Redemption {
            shares: request.shares,
            assets,
            round,
        })
    }

    /// Settle a batch of redemptions atomically. Manager only.
    ///
    /// Input is parallel slices — one array position per request — and a
    /// length mismatch fails the whole batch before anything else is
    /// looked at. Consent per item is the owner's standing allowance to
    /// the caller (waived where the caller redeems their own shares).
    ///
    /// Every item prices against the same valuation snapshot. The total
    /// is debited from custody exactly once; each item then receives its
    /// own previewed amount, so the per-item payouts sum to the debit
    /// with no remainder to dispose of.
    pub fn batch_redeem(
        &mut self,
        caller: &Address,
        token: &mut dyn AssetToken,
        shares: &[u128],
        destinations: &[Address],
        owners: &[Address],
        min_assets_out: &[u128],
    ) -> Result<BatchSettlement, VaultError> {
        self.ensure_manager(caller)?;
        self.expect_settlement(token)?;

        if shares.len() != destinations.len()
            || shares.len() != owners.len()
            || shares.len() != min_assets_out.len()
        {
            return Err(VaultError::LengthMismatch {
                shares: shares.len(),
                destinations: destinations.len(),
                owners: owners.len(),
                minimums: min_assets_out.len(),
            });
        }
        if shares.is_empty() {
            return Err(VaultError::EmptyBatch);
        }

        // One snapshot for every item in the batch: a compound operation
        // never mixes valuations.
        let snapshot = self.valuation()?;
        let supply = self.shares.total_supply();

        // Validate everything before mutating anything. Per-owner tallies
        // catch the case where one owner appears in several items whose
        // individual amounts fit their balance but whose sum does not.
        let mut previews = Vec::with_capacity(shares.len());
        let mut total: u128 = 0;
        let mut owed_shares: HashMap<Address, u128> = HashMap::new();

        for (index, &share_amount) in shares.iter().enumerate() {
            let owner = owners[index];
            let destination = destinations[index];

            if share_amount == 0 {
                return Err(VaultError::ZeroAmount);
            }
            if destination.is_null() {
                return Err(VaultError::NullAddress);
            }

            let owed = owed_shares.entry(owner).or_insert(0);
            *owed = owed.saturating_add(share_amount);
            let available = self.max_redeem(&owner);
            if *owed > available {
                return Err(VaultError::ExceedsMaxRedeem {
                    owner,
                    requested: *owed,
                    available,
                });
            }

            if *caller != owner && self.shares.allowance(&owner, caller) < *owed {
                return Err(VaultError::Ledger(
                    crate::ledger::shares::LedgerError::InsufficientAllowance {
                        granted: self.shares.allowance(&owner, caller),
                        requested: *owed,
                    },
                ));
            }

            let assets = nav::scale_to_native(nav::convert_to_assets(
                share_amount,
                supply,
                snapshot.total_assets,
            )?);
            if assets < min_assets_out[index] {
                return Err(VaultError::OutputBelowMinimum {
                    index,
                    previewed: assets,
                    minimum: min_assets_out[index],
                });
            }

            for hook in &self.hooks {
                hook.before_withdraw(&owner, &destination, share_amount, assets)
                    .map_err(|rejection| VaultError::HookRejected {
                        index,
                        reason: rejection.to_string(),
                    })?;
            }

            total = total.checked_add(assets).ok_or(nav::NavError::Overflow {
                a: total,
                b: assets,
                denominator: 1,
            })?;
            previews.push(assets);
        }

        let liquidity = self.settlement_liquidity();
        if liquidity < total {
            return Err(VaultError::InsufficientLiquidity {
                available: liquidity,
                required: total,
            });
        }

        // Apply. Round first, then the single custody debit, then the
        // per-item settlement loop — all checks already passed, so the
        // loop is pure bookkeeping.
        let round = self.replay.advance_round();
        let settlement_id = self.registry.settlement_asset();
        self.custody.record_withdrawal(settlement_id, total)?;

        let mut items = Vec::with_capacity(shares.len());
        let now = Utc::now();
        for (index, &share_amount) in shares.iter().enumerate() {
            let owner = owners[index];
            let destination = destinations[index];
            let assets = previews[index];

            if *caller != owner {
                self.shares.spend_allowance(&owner, caller, share_amount)?;
            }
            self.shares.burn(&owner, share_amount)?;
            token.transfer(&self.config.address, &destination, assets)?;

            self.events.push(VaultEvent::WithdrawalProcessed {
                owner,
                destination,
                assets,
                shares: share_amount,
                round,
                at: now,
            });
            items.push(SettledItem {
                owner,
                destination,
                shares: share_amount,
                assets,
            });
        }

        info!(
            items = items.len(),
            total_assets = total,
            round,
            "batch settled"
        );

        Ok(BatchSettlement {
            total_assets: total,
            items,
            round,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NETWORK_ID_TESTNET;
    use crate::crypto::keys::CofferKeypair;
    use crate::ledger::asset::LedgerToken;
    use crate::ledger::shares::LedgerError;
    use crate::vault::withdrawal::WithdrawalRequest;
    use crate::vault::{StaticReporter, VaultConfig};

    const FAR_FUTURE: u64 = 4_000_000_000; // year 2096; this test suite should be retired by then

    fn addr() -> Address {
        Address::from_public_key(&CofferKeypair::generate().public_key())
    }

    /// Vault with one depositor (0.5 BTC in, reporter at par) and fully
    /// liquid settlement custody.
    fn setup() -> (Vault, LedgerToken, Address, CofferKeypair, Address) {
        let manager = addr();
        let config = VaultConfig {
            network_id: NETWORK_ID_TESTNET,
            address: addr(),
            manager,
        };
        let mut settlement = LedgerToken::new("Wrapped Bitcoin", "wBTC", 8);
        let mut vault = Vault::new(
            config,
            &settlement,
            Box::new(StaticReporter::balance(50_000_000)),
        )
        .unwrap();

        let owner_kp = CofferKeypair::generate();
        let owner = Address::from_public_key(&owner_kp.public_key());
        settlement.mint(&owner, 50_000_000).unwrap();
        vault
            .deposit_collateral(&mut settlement, &owner, 50_000_000, &owner)
            .unwrap();

        (vault, settlement, manager, owner_kp, owner)
    }

    fn request(owner: &Address, shares: u128, nonce: u64) -> WithdrawalRequest {
        WithdrawalRequest {
            owner: *owner,
            destination: addr(),
            shares,
            nonce,
            expires_at: FAR_FUTURE,
            max_round: 100,
        }
    }

    struct DenyHook;
    impl WithdrawHook for DenyHook {
        fn before_withdraw(
            &self,
            _owner: &Address,
            _destination: &Address,
            _shares: u128,
            _assets: u128,
        ) -> Result<(), HookRejection> {
            Err(HookRejection("compliance hold".to_string()))
        }
    }

    struct AllowHook;
    impl WithdrawHook for AllowHook {
        fn before_withdraw(
            &self,
            _owner: &Address,
            _destination: &Address,
            _shares: u128,
            _assets: u128,
        ) -> Result<(), HookRejection> {
            Ok(())
        }
    }

    // -- signed single withdrawal -------------------------------------------

    #[test]
    fn signed_withdrawal_happy_path() {
        let (mut vault, mut settlement, manager, owner_kp, owner) = setup();
        let req = request(&owner, 100_000_000_000_000_000, 1); // 0.1 shares
        let destination = req.destination;
        let signed = SignedWithdrawal::sign(req, &owner_kp, &vault.domain());

        let result = vault
            .process_withdrawal(&manager, &mut settlement, &signed)
            .unwrap();

        // At par: 0.1 shares pay 0.1 BTC.
        assert_eq!(result.shares, 100_000_000_000_000_000);
        assert_eq!(result.assets, 10_000_000);
        assert_eq!(result.round, 1);

        assert_eq!(settlement.balance_of(&destination), 10_000_000);
        assert_eq!(vault.balance_of(&owner), 400_000_000_000_000_000);
        assert_eq!(vault.settlement_liquidity(), 40_000_000);
        assert!(vault.is_nonce_spent(&owner, 1));
        assert_eq!(vault.current_round(), 1);

        let events = vault.take_events();
        assert!(events.iter().any(|e| matches!(
            e,
            VaultEvent::WithdrawalProcessed {
                assets: 10_000_000,
                ..
            }
        )));
    }

    #[test]
    fn signed_quantity_is_share_denominated() {
        // The signed `amount` is shares: at a 1.05 NAV the vault burns
        // exactly the signed quantity and pays proportionally more assets.
        let (mut vault, mut settlement, manager, owner_kp, owner) = setup();
        settlement.mint(&manager, 10_000_000).unwrap();
        vault
            .set_reporter(&manager, Box::new(StaticReporter::balance(52_500_000)))
            .unwrap();
        vault
            .add_liquidity(&manager, &mut settlement, 10_000_000)
            .unwrap();

        let signed = SignedWithdrawal::sign(
            request(&owner, 100_000_000_000_000_000, 1),
            &owner_kp,
            &vault.domain(),
        );
        let before = vault.balance_of(&owner);
        let result = vault
            .process_withdrawal(&manager, &mut settlement, &signed)
            .unwrap();

        // Exactly the signed share quantity burned...
        assert_eq!(result.shares, 100_000_000_000_000_000);
        assert_eq!(vault.balance_of(&owner), before - result.shares);
        // ...and the payout is conversion-derived: 0.1 * 1.05 BTC.
        assert_eq!(result.assets, 10_500_000);
    }

    #[test]
    fn replayed_request_rejected() {
        let (mut vault, mut settlement, manager, owner_kp, owner) = setup();
        let signed = SignedWithdrawal::sign(
            request(&owner, 50_000_000_000_000_000, 7),
            &owner_kp,
            &vault.domain(),
        );

        vault
            .process_withdrawal(&manager, &mut settlement, &signed)
            .unwrap();
        let replay = vault.process_withdrawal(&manager, &mut settlement, &signed);
        assert!(matches!(
            replay,
            Err(VaultError::Withdrawal(WithdrawalError::NonceReused {
                nonce: 7,
                ..
            }))
        ));
    }

    #[test]
    fn expired_request_rejected_despite_valid_signature() {
        let (mut vault, mut settlement, manager, owner_kp, owner) = setup();
        let mut req = request(&owner, 50_000_000_000_000_000, 1);
        req.expires_at = 1_000; // 1970 called
        let signed = SignedWithdrawal::sign(req, &owner_kp, &vault.domain());

        assert!(matches!(
            vault.process_withdrawal(&manager, &mut settlement, &signed),
            Err(VaultError::Withdrawal(WithdrawalError::Expired { .. }))
        ));
        assert!(!vault.is_nonce_spent(&owner, 1));
    }

    #[test]
    fn lapsed_round_rejected() {
        let (mut vault, mut settlement, manager, owner_kp, owner) = setup();

        // Advance the round with a first redemption.
        let first = SignedWithdrawal::sign(
            request(&owner, 10_000_000_000_000_000, 1),
            &owner_kp,
            &vault.domain(),
        );
        vault
            .process_withdrawal(&manager, &mut settlement, &first)
            .unwrap();
        assert_eq!(vault.current_round(), 1);

        // A request only valid through round 0 is now dead, signature
        // and all.
        let mut stale = request(&owner, 10_000_000_000_000_000, 2);
        stale.max_round = 0;
        let signed = SignedWithdrawal::sign(stale, &owner_kp, &vault.domain());
        assert!(matches!(
            vault.process_withdrawal(&manager, &mut settlement, &signed),
            Err(VaultError::Withdrawal(WithdrawalError::RoundLapsed {
                max_round: 0,
                current: 1,
            }))
        ));
    }

    #[test]
    fn tampered_request_rejected() {
        let (mut vault, mut settlement, manager, owner_kp, owner) = setup();
        let mut signed = SignedWithdrawal::sign(
            request(&owner, 10_000_000_000_000_000, 1),
            &owner_kp,
            &vault.domain(),
        );
        signed.request.shares *= 2;

        assert!(matches!(
            vault.process_withdrawal(&manager, &mut settlement, &signed),
            Err(VaultError::Withdrawal(WithdrawalError::InvalidSignature {
                ..
            }))
        ));
    }

    #[test]
    fn non_manager_cannot_execute_valid_authorization() {
        let (mut vault, mut settlement, _manager, owner_kp, owner) = setup();
        let signed = SignedWithdrawal::sign(
            request(&owner, 10_000_000_000_000_000, 1),
            &owner_kp,
            &vault.domain(),
        );

        // The owner themselves can't push it through either — consent
        // and execution authority are different powers.
        assert!(matches!(
            vault.process_withdrawal(&owner, &mut settlement, &signed),
            Err(VaultError::NotManager { .. })
        ));
    }

    #[test]
    fn validation_order_expiry_before_nonce_and_signature() {
        // A request that is simultaneously expired, nonce-reused, and
        // garbage-signed must fail as Expired: stages run in order.
        let (mut vault, mut settlement, manager, owner_kp, owner) = setup();

        let good = SignedWithdrawal::sign(
            request(&owner, 10_000_000_000_000_000, 3),
            &owner_kp,
            &vault.domain(),
        );
        vault
            .process_withdrawal(&manager, &mut settlement, &good)
            .unwrap();

        let mut bad = request(&owner, 10_000_000_000_000_000, 3); // reused nonce
        bad.expires_at = 1_000; // expired
        let mut signed = SignedWithdrawal::sign(bad, &owner_kp, &vault.domain());
        signed.request.shares += 1; // and tampered

        assert!(matches!(
            vault.process_withdrawal(&manager, &mut settlement, &signed),
            Err(VaultError::Withdrawal(WithdrawalError::Expired { .. }))
        ));
    }

    #[test]
    fn over_balance_redemption_rejected() {
        let (mut vault, mut settlement, manager, owner_kp, owner) = setup();
        let too_many = vault.max_redeem(&owner) + 1;
        let signed =
            SignedWithdrawal::sign(request(&owner, too_many, 1), &owner_kp, &vault.domain());

        assert!(matches!(
            vault.process_withdrawal(&manager, &mut settlement, &signed),
            Err(VaultError::ExceedsMaxRedeem { .. })
        ));
    }

    #[test]
    fn insufficient_liquidity_is_retryable_without_resigning() {
        let (mut vault, mut settlement, manager, owner_kp, owner) = setup();

        // Drain most of the liquidity.
        vault
            .remove_liquidity(&manager, &mut settlement, 45_000_000)
            .unwrap();

        let signed = SignedWithdrawal::sign(
            request(&owner, 100_000_000_000_000_000, 1), // wants 0.1 BTC
            &owner_kp,
            &vault.domain(),
        );
        let starved = vault.process_withdrawal(&manager, &mut settlement, &signed);
        assert!(matches!(
            starved,
            Err(VaultError::InsufficientLiquidity { .. })
        ));
        // The economic failure consumed nothing: nonce unspent, round
        // unmoved.
        assert!(!vault.is_nonce_spent(&owner, 1));
        assert_eq!(vault.current_round(), 0);

        // Top up and retry the SAME signed request.
        vault
            .add_liquidity(&manager, &mut settlement, 45_000_000)
            .unwrap();
        assert!(vault
            .process_withdrawal(&manager, &mut settlement, &signed)
            .is_ok());
    }

    #[test]
    fn hook_vetoes_single_withdrawal() {
        let (mut vault, mut settlement, manager, owner_kp, owner) = setup();
        vault.add_hook(&manager, Box::new(DenyHook)).unwrap();

        let signed = SignedWithdrawal::sign(
            request(&owner, 10_000_000_000_000_000, 1),
            &owner_kp,
            &vault.domain(),
        );
        assert!(matches!(
            vault.process_withdrawal(&manager, &mut settlement, &signed),
            Err(VaultError::HookRejected { .. })
        ));
        assert!(!vault.is_nonce_spent(&owner, 1));
    }

    #[test]
    fn wrong_settlement_token_rejected() {
        let (mut vault, _settlement, manager, owner_kp, owner) = setup();
        let mut tbtc = LedgerToken::new("Threshold Bitcoin", "tBTC", 8);
        let signed = SignedWithdrawal::sign(
            request(&owner, 10_000_000_000_000_000, 1),
            &owner_kp,
            &vault.domain(),
        );

        assert!(matches!(
            vault.process_withdrawal(&manager, &mut tbtc, &signed),
            Err(VaultError::WrongSettlementAsset { .. })
        ));
    }

    // -- batch settlement ---------------------------------------------------

    /// Three owners, equal deposits, allowances granted to the manager.
    fn batch_setup() -> (Vault, LedgerToken, Address, Vec<Address>) {
        let manager = addr();
        let config = VaultConfig {
            network_id: NETWORK_ID_TESTNET,
            address: addr(),
            manager,
        };
        let mut settlement = LedgerToken::new("Wrapped Bitcoin", "wBTC", 8);
        let mut vault = Vault::new(
            config,
            &settlement,
            Box::new(StaticReporter::balance(60_000_000)),
        )
        .unwrap();

        let mut owners = Vec::new();
        for i in 0..3u128 {
            // Keep the reported value in step with custody so every
            // deposit prices at par and the three owners end up equal.
            vault
                .set_reporter(
                    &manager,
                    Box::new(StaticReporter::balance(20_000_000 * i)),
                )
                .unwrap();
            let owner = addr();
            settlement.mint(&owner, 20_000_000).unwrap();
            vault
                .deposit_collateral(&mut settlement, &owner, 20_000_000, &owner)
                .unwrap();
            vault.approve(&owner, &manager, u128::MAX);
            owners.push(owner);
        }
        vault
            .set_reporter(&manager, Box::new(StaticReporter::balance(60_000_000)))
            .unwrap();

        (vault, settlement, manager, owners)
    }

    #[test]
    fn batch_settlement_conserves_custody_debit() {
        let (mut vault, mut settlement, manager, owners) = batch_setup();
        let destinations: Vec<Address> = (0..3).map(|_| addr()).collect();
        // Awkward share amounts so per-item previews actually round.
        let shares = [
            33_333_333_333_333_333u128,
            77_777_777_777_777_777,
            123_456_789_012_345_678,
        ];
        let mins = [0u128, 0, 0];

        let liquidity_before = vault.settlement_liquidity();
        let result = vault
            .batch_redeem(
                &manager,
                &mut settlement,
                &shares,
                &destinations,
                &owners,
                &mins,
            )
            .unwrap();

        // Conservation, exactly: the one custody debit equals the sum of
        // per-item transfers, which equal the destinations' receipts.
        let paid: u128 = result.items.iter().map(|item| item.assets).sum();
        assert_eq!(paid, result.total_assets);
        assert_eq!(
            vault.settlement_liquidity(),
            liquidity_before - result.total_assets
        );
        let received: u128 = destinations
            .iter()
            .map(|d| settlement.balance_of(d))
            .sum();
        assert_eq!(received, result.total_assets);
    }

    #[test]
    fn batch_burns_each_item_and_advances_round_once() {
        let (mut vault, mut settlement, manager, owners) = batch_setup();
        let destinations: Vec<Address> = (0..3).map(|_| addr()).collect();
        let shares = [
            100_000_000_000_000_000u128,
            100_000_000_000_000_000,
            100_000_000_000_000_000,
        ];
        let supply_before = vault.total_supply();

        let result = vault
            .batch_redeem(
                &manager,
                &mut settlement,
                &shares,
                &destinations,
                &owners,
                &[0, 0, 0],
            )
            .unwrap();

        assert_eq!(result.items.len(), 3);
        assert_eq!(result.round, 1);
        assert_eq!(vault.current_round(), 1);
        assert_eq!(
            vault.total_supply(),
            supply_before - 300_000_000_000_000_000
        );
        // At par each 0.1-share item pays 0.1 BTC.
        for item in &result.items {
            assert_eq!(item.assets, 10_000_000);
        }
        // Three per-item events.
        let events = vault.take_events();
        let processed = events
            .iter()
            .filter(|e| matches!(e, VaultEvent::WithdrawalProcessed { .. }))
            .count();
        assert_eq!(processed, 3);
    }

    #[test]
    fn batch_length_mismatch_rejected() {
        let (mut vault, mut settlement, manager, owners) = batch_setup();
        let destinations = [addr(), addr()];

        assert!(matches!(
            vault.batch_redeem(
                &manager,
                &mut settlement,
                &[1_000, 1_000, 1_000],
                &destinations,
                &owners,
                &[0, 0, 0],
            ),
            Err(VaultError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn empty_batch_rejected() {
        let (mut vault, mut settlement, manager, _owners) = batch_setup();
        assert!(matches!(
            vault.batch_redeem(&manager, &mut settlement, &[], &[], &[], &[]),
            Err(VaultError::EmptyBatch)
        ));
    }

    #[test]
    fn one_bad_minimum_aborts_whole_batch() {
        let (mut vault, mut settlement, manager, owners) = batch_setup();
        let destinations: Vec<Address> = (0..3).map(|_| addr()).collect();
        let shares = [
            100_000_000_000_000_000u128,
            100_000_000_000_000_000,
            100_000_000_000_000_000,
        ];
        // Item 1 demands more than its preview will pay.
        let mins = [0u128, 10_000_001, 0];

        let supply_before = vault.total_supply();
        let result = vault.batch_redeem(
            &manager,
            &mut settlement,
            &shares,
            &destinations,
            &owners,
            &mins,
        );

        assert!(matches!(
            result,
            Err(VaultError::OutputBelowMinimum {
                index: 1,
                previewed: 10_000_000,
                minimum: 10_000_001,
            })
        ));
        // No partial settlement: supply, round, and destinations untouched.
        assert_eq!(vault.total_supply(), supply_before);
        assert_eq!(vault.current_round(), 0);
        assert!(destinations.iter().all(|d| settlement.balance_of(d) == 0));
    }

    #[test]
    fn missing_allowance_aborts_whole_batch() {
        let (mut vault, mut settlement, manager, owners) = batch_setup();
        // Revoke the second owner's allowance.
        vault.approve(&owners[1], &manager, 0);
        let destinations: Vec<Address> = (0..3).map(|_| addr()).collect();

        let result = vault.batch_redeem(
            &manager,
            &mut settlement,
            &[1_000_000_000_000u128, 1_000_000_000_000, 1_000_000_000_000],
            &destinations,
            &owners,
            &[0, 0, 0],
        );
        assert!(matches!(
            result,
            Err(VaultError::Ledger(LedgerError::InsufficientAllowance { .. }))
        ));
        assert_eq!(vault.current_round(), 0);
    }

    #[test]
    fn hook_rejection_aborts_whole_batch() {
        let (mut vault, mut settlement, manager, owners) = batch_setup();
        vault.add_hook(&manager, Box::new(AllowHook)).unwrap();
        vault.add_hook(&manager, Box::new(DenyHook)).unwrap();
        let destinations: Vec<Address> = (0..3).map(|_| addr()).collect();

        let result = vault.batch_redeem(
            &manager,
            &mut settlement,
            &[1_000_000_000_000u128, 1_000_000_000_000, 1_000_000_000_000],
            &destinations,
            &owners,
            &[0, 0, 0],
        );
        assert!(matches!(
            result,
            Err(VaultError::HookRejected { index: 0, .. })
        ));
        assert_eq!(vault.current_round(), 0);
    }

    #[test]
    fn repeated_owner_is_checked_cumulatively() {
        let (mut vault, mut settlement, manager, owners) = batch_setup();
        let owner = owners[0];
        let balance = vault.balance_of(&owner);
        let destinations = [addr(), addr()];

        // Two items, each within the owner's balance, together above it.
        let result = vault.batch_redeem(
            &manager,
            &mut settlement,
            &[balance, balance],
            &destinations,
            &[owner, owner],
            &[0, 0],
        );
        assert!(matches!(result, Err(VaultError::ExceedsMaxRedeem { .. })));
    }

    #[test]
    fn batch_liquidity_shortfall_rejected_before_any_mutation() {
        let (mut vault, mut settlement, manager, owners) = batch_setup();
        vault
            .remove_liquidity(&manager, &mut settlement, 55_000_000)
            .unwrap();
        let destinations: Vec<Address> = (0..3).map(|_| addr()).collect();
        let shares = [
            100_000_000_000_000_000u128,
            100_000_000_000_000_000,
            100_000_000_000_000_000,
        ];

        let supply_before = vault.total_supply();
        assert!(matches!(
            vault.batch_redeem(
                &manager,
                &mut settlement,
                &shares,
                &destinations,
                &owners,
                &[0, 0, 0],
            ),
            Err(VaultError::InsufficientLiquidity { .. })
        ));
        assert_eq!(vault.total_supply(), supply_before);
        assert_eq!(vault.current_round(), 0);
    }

    #[test]
    fn manager_redeeming_own_shares_needs_no_allowance() {
        let manager = addr();
        let config = VaultConfig {
            network_id: NETWORK_ID_TESTNET,
            address: addr(),
            manager,
        };
        let mut settlement = LedgerToken::new("Wrapped Bitcoin", "wBTC", 8);
        let mut vault = Vault::new(
            config,
            &settlement,
            Box::new(StaticReporter::balance(20_000_000)),
        )
        .unwrap();
        settlement.mint(&manager, 20_000_000).unwrap();
        vault
            .deposit_collateral(&mut settlement, &manager, 20_000_000, &manager)
            .unwrap();

        // No approve() call anywhere: owner == caller.
        let destination = addr();
        let result = vault
            .batch_redeem(
                &manager,
                &mut settlement,
                &[100_000_000_000_000_000],
                &[destination],
                &[manager],
                &[9_999_999],
            )
            .unwrap();
        assert_eq!(result.items[0].assets, 10_000_000);
        assert_eq!(settlement.balance_of(&destination), 10_000_000);
    }

    #[test]
    fn batch_spends_allowances_down() {
        let (mut vault, mut settlement, manager, owners) = batch_setup();
        vault.approve(&owners[0], &manager, 150_000_000_000_000_000);
        let destination = addr();

        vault
            .batch_redeem(
                &manager,
                &mut settlement,
                &[100_000_000_000_000_000],
                &[destination],
                &[owners[0]],
                &[0],
            )
            .unwrap();
        assert_eq!(
            vault.allowance(&owners[0], &manager),
            50_000_000_000_000_000
        );
    }
}
