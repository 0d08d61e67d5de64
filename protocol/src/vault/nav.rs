//! # NAV Conversion Math
//!
//! The exchange-rate arithmetic between settlement assets, shares, and
//! collateral, consistent at 18-decimal share precision regardless of the
//! asset's native precision.
//!
//! Two rules hold everywhere in this module:
//!
//! 1. **Multiply first, divide once.** `assets * supply / total` computed
//!    with a 256-bit intermediate. The naive `assets / total * supply`
//!    ordering double-rounds, and the error compounds over thousands of
//!    deposits until someone's spreadsheet disagrees with the vault.
//! 2. **Round down, always.** The vault keeps the dust, never pays it
//!    out. A conversion can short a caller by at most one base unit; it
//!    can never over-credit.
//!
//! The zero-supply bootstrap is 1:1 at share precision: the first
//! depositor defines the initial price, and the reported valuation takes
//! over from there.

use thiserror::Error;

use crate::config::DECIMAL_SCALE_FACTOR;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from conversion arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavError {
    /// The quotient of a full-precision multiply-divide exceeds `u128`.
    /// With 18-decimal BTC-denominated quantities this is unreachable in
    /// honest operation; reaching it means the inputs are garbage.
    #[error("conversion overflow: {a} * {b} / {denominator} exceeds u128")]
    Overflow { a: u128, b: u128, denominator: u128 },

    /// Division by zero in a conversion.
    #[error("conversion with zero denominator")]
    ZeroDenominator,

    /// Shares exist but the reported valuation is zero: there is no rate
    /// at which shares and assets can be exchanged. Refusing is the only
    /// honest answer.
    #[error("vault has {supply} shares outstanding but zero reported value")]
    ZeroValuation { supply: u128 },
}

// ---------------------------------------------------------------------------
// Full-precision multiply-divide
// ---------------------------------------------------------------------------

/// Widening multiply: `a * b` as a 256-bit (hi, lo) pair of `u128` halves.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    // Split into 64-bit limbs and do schoolbook multiplication. Rust has
    // no u256, but four limb products and carry tracking get us there.
    const MASK: u128 = (1 << 64) - 1;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    // Middle column: lh + hl + carry-in from ll's high half.
    let mid = lh + (ll >> 64); // cannot overflow: (2^64-1)^2 / 2^64 + ...
    let (mid, mid_carry) = mid.overflowing_add(hl);

    let lo = (mid << 64) | (ll & MASK);
    let hi = hh + (mid >> 64) + ((mid_carry as u128) << 64);
    (hi, lo)
}

/// Compute `a * b / denominator` with a 256-bit intermediate, rounding
/// down.
///
/// # Errors
///
/// [`NavError::ZeroDenominator`] when `denominator == 0`;
/// [`NavError::Overflow`] when the true quotient doesn't fit in `u128`.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, NavError> {
    if denominator == 0 {
        return Err(NavError::ZeroDenominator);
    }

    let (hi, lo) = mul_wide(a, b);

    // Fast path: the product already fits in 128 bits.
    if hi == 0 {
        return Ok(lo / denominator);
    }

    // The quotient fits in u128 iff hi < denominator.
    if hi >= denominator {
        return Err(NavError::Overflow { a, b, denominator });
    }

    // Restoring binary long division of the 256-bit (hi, lo) by
    // `denominator`. The running remainder starts at `hi` (< denominator)
    // and shifts in one bit of `lo` per step. When the pre-shift remainder
    // has its top bit set, the shifted value exceeds 2^128 and therefore
    // exceeds the denominator, so the subtraction branch is taken and
    // wrapping arithmetic yields the correct 128-bit remainder.
    let mut rem = hi;
    let mut quotient: u128 = 0;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        if carry == 1 || rem >= denominator {
            rem = rem.wrapping_sub(denominator);
            quotient |= 1 << i;
        }
    }

    Ok(quotient)
}

// ---------------------------------------------------------------------------
// Decimal scaling
// ---------------------------------------------------------------------------

/// Scale a native-precision asset amount (8 decimals) up to share
/// precision (18 decimals).
pub fn scale_to_shares(native: u128) -> Result<u128, NavError> {
    native
        .checked_mul(DECIMAL_SCALE_FACTOR)
        .ok_or(NavError::Overflow {
            a: native,
            b: DECIMAL_SCALE_FACTOR,
            denominator: 1,
        })
}

/// Scale an 18-decimal amount down to native asset precision, rounding
/// down. The truncated dust stays in the vault.
pub fn scale_to_native(scaled: u128) -> u128 {
    scaled / DECIMAL_SCALE_FACTOR
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Convert an 18-decimal asset amount into shares at the current rate.
///
/// Zero supply is the bootstrap case: 1:1 at share precision, so the
/// first depositor gets exactly their scaled deposit. Otherwise
/// `assets * supply / total_assets`, floor.
pub fn convert_to_shares(
    assets_scaled: u128,
    total_supply: u128,
    total_assets: u128,
) -> Result<u128, NavError> {
    if total_supply == 0 {
        return Ok(assets_scaled);
    }
    if total_assets == 0 {
        return Err(NavError::ZeroValuation {
            supply: total_supply,
        });
    }
    mul_div(assets_scaled, total_supply, total_assets)
}

/// Convert shares into an 18-decimal asset amount at the current rate.
///
/// The inverse of [`convert_to_shares`], same bootstrap and floor rules.
pub fn convert_to_assets(
    shares: u128,
    total_supply: u128,
    total_assets: u128,
) -> Result<u128, NavError> {
    if total_supply == 0 {
        return Ok(shares);
    }
    if total_assets == 0 {
        return Err(NavError::ZeroValuation {
            supply: total_supply,
        });
    }
    mul_div(shares, total_assets, total_supply)
}
