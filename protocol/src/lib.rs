// Copyright (c) 2026 Coffer Labs. MIT License.
// See LICENSE for details.

//! # Coffer Protocol — Core Library
//!
//! Coffer is a BTC-denominated tokenized vault: depositors bring any
//! registered wrapped-bitcoin collateral, receive fungible 18-decimal
//! shares priced at the vault's live net asset value, and are later paid
//! out in a single settlement asset by a manager-executed redemption that
//! the owner authorized with nothing more than an off-line Ed25519
//! signature.
//!
//! The engine deliberately does three hard things and refuses to do much
//! else:
//!
//! 1. **NAV-aware conversion** — every deposit and redemption is priced
//!    against a valuation pulled fresh from an external
//!    [`Reporter`](vault::reporter::Reporter), never against a fixed
//!    ratio. Vaults
//!    that price deposits at par regardless of NAV quietly rob either the
//!    new depositor or everyone else; we've read that post-mortem and
//!    declined to star in it.
//! 2. **Signature-authorized withdrawal** — a typed, domain-separated
//!    signing scheme with spent-nonce and monotonic-round replay
//!    protection, so owners pre-commit once and the manager executes when
//!    liquidity allows.
//! 3. **Batch settlement** — many redemptions settled against a single
//!    custody debit, conserving every base unit, with per-item minimum
//!    output guarantees and all-or-nothing semantics.
//!
//! ## Architecture
//!
//! - **config** — Protocol constants and network parameters.
//! - **crypto** — Hashing and Ed25519 primitives. Don't roll your own.
//! - **ledger** — Addresses, asset tokens, and the share ledger.
//! - **vault** — The vault aggregate: registry, valuation, deposits,
//!   signed and batch redemption, replay state, events.
//!
//! ## Design Philosophy
//!
//! 1. Checked arithmetic everywhere value moves. Overflow is a bug report,
//!    not a balance.
//! 2. Validate everything, then mutate. An entry point either fully
//!    applies or leaves no trace.
//! 3. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod ledger;
pub mod vault;
