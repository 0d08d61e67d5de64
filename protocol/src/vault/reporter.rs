//! # Reporter — the External Valuation Oracle
//!
//! The vault does not know what it is worth. Collateral sits in custody,
//! positions get deployed by the manager, yield accrues somewhere off the
//! books — and the only party with the full picture is the reporting
//! process that watches all of it. The [`Reporter`] trait is that party's
//! interface: one method, one authoritative number, pulled fresh every
//! time the vault needs to price anything.
//!
//! ## The contract
//!
//! - `report()` returns an encoded [`ReportedValue`]: either the vault's
//!   total balance in the settlement asset's native precision, or a
//!   price-per-share at 18 decimals.
//! - Freshness and deviation bounds are the reporter's responsibility.
//!   The vault trusts the number; it does not second-guess it.
//! - Failure is failure. If the reporter can't produce a value, every
//!   conversion depending on it fails too. The vault never substitutes a
//!   stale or fabricated valuation — mispricing every depositor is worse
//!   than rejecting one transaction.
//!
//! ## Wire format
//!
//! One tag byte followed by a 16-byte big-endian `u128`:
//!
//! ```text
//! 0x01 || balance (native precision)      -- total settlement-asset value
//! 0x02 || price_per_share (18 decimals)   -- value of one whole share
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the reporter boundary.
#[derive(Debug, Error)]
pub enum ReporterError {
    /// The reporter could not produce a valuation at all.
    #[error("valuation unavailable: {reason}")]
    Unavailable { reason: String },

    /// The reporter returned bytes that don't decode as a report frame.
    #[error("malformed report frame: {reason}")]
    Malformed { reason: String },
}

// ---------------------------------------------------------------------------
// ReportedValue
// ---------------------------------------------------------------------------

/// Frame tag for a total-balance report.
const TAG_BALANCE: u8 = 0x01;

/// Frame tag for a price-per-share report.
const TAG_PRICE_PER_SHARE: u8 = 0x02;

/// Encoded frame length: tag + u128.
const FRAME_LEN: usize = 1 + 16;

/// A decoded valuation report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportedValue {
    /// Total vault value in the settlement asset's native precision
    /// (8 decimals for a BTC-denominated vault).
    Balance(u128),

    /// Value of one whole share (10^18 base units), at 18 decimals.
    PricePerShare(u128),
}

impl ReportedValue {
    /// Encode to the wire frame: tag byte + 16-byte big-endian value.
    pub fn encode(&self) -> Vec<u8> {
        let (tag, value) = match self {
            ReportedValue::Balance(v) => (TAG_BALANCE, v),
            ReportedValue::PricePerShare(v) => (TAG_PRICE_PER_SHARE, v),
        };
        let mut frame = Vec::with_capacity(FRAME_LEN);
        frame.push(tag);
        frame.extend_from_slice(&value.to_be_bytes());
        frame
    }

    /// Decode a wire frame. Rejects wrong lengths and unknown tags —
    /// a truncated or mistagged report is a failed report, not a zero.
    pub fn decode(frame: &[u8]) -> Result<Self, ReporterError> {
        if frame.len() != FRAME_LEN {
            return Err(ReporterError::Malformed {
                reason: format!("expected {} bytes, got {}", FRAME_LEN, frame.len()),
            });
        }

        let mut value_bytes = [0u8; 16];
        value_bytes.copy_from_slice(&frame[1..]);
        let value = u128::from_be_bytes(value_bytes);

        match frame[0] {
            TAG_BALANCE => Ok(ReportedValue::Balance(value)),
            TAG_PRICE_PER_SHARE => Ok(ReportedValue::PricePerShare(value)),
            other => Err(ReporterError::Malformed {
                reason: format!("unknown report tag 0x{:02X}", other),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Reporter trait
// ---------------------------------------------------------------------------

/// The valuation oracle the vault consumes.
///
/// Implementations live outside this crate in production — a process
/// watching custody balances and deployed positions. The vault calls
/// `report()` at the top of every entry point that needs a price and
/// decodes the frame with [`ReportedValue::decode`].
pub trait Reporter {
    /// Produce the current valuation, encoded as a report frame.
    fn report(&self) -> Result<Vec<u8>, ReporterError>;
}

// ---------------------------------------------------------------------------
// StaticReporter
// ---------------------------------------------------------------------------

/// A [`Reporter`] that returns whatever it was last told.
///
/// The test and demo workhorse: set a value, run an operation, change the
/// value, watch the NAV math react. Can also be told to fail, for
/// exercising the valuation-unavailable path.
#[derive(Clone, Debug)]
pub struct StaticReporter {
    value: ReportedValue,
    failing: bool,
}

impl StaticReporter {
    /// Reporter that returns the given value until told otherwise.
    pub fn new(value: ReportedValue) -> Self {
        Self {
            value,
            failing: false,
        }
    }

    /// Reporter reporting a total balance in native precision.
    pub fn balance(value: u128) -> Self {
        Self::new(ReportedValue::Balance(value))
    }

    /// Reporter reporting an 18-decimal price per share.
    pub fn price_per_share(value: u128) -> Self {
        Self::new(ReportedValue::PricePerShare(value))
    }

    /// Replace the reported value.
    pub fn set(&mut self, value: ReportedValue) {
        self.value = value;
    }

    /// Make every subsequent `report()` call fail (or succeed again).
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }
}

impl Reporter for StaticReporter {
    fn report(&self) -> Result<Vec<u8>, ReporterError> {
        if self.failing {
            return Err(ReporterError::Unavailable {
                reason: "reporter offline".to_string(),
            });
        }
        Ok(self.value.encode())
    }
}
