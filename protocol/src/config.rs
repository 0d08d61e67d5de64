//! # Protocol Configuration & Constants
//!
//! Every magic number in Coffer lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong and you owe the team
//! coffee.
//!
//! Most of these values are load-bearing for accounting correctness:
//! the decimal precisions and the scale factor between them define the
//! unit system every conversion in `vault::nav` operates in, and the
//! signing-domain constants are baked into every withdrawal authorization
//! ever produced. Changing them after launch invalidates outstanding
//! signatures and re-prices the vault, so don't.

// ---------------------------------------------------------------------------
// Decimal Precision
// ---------------------------------------------------------------------------

/// Share precision: 18 decimal places, the lingua franca of tokenized
/// vaults. All share quantities and all internal valuation math use this
/// precision.
pub const SHARE_DECIMALS: u8 = 18;

/// Collateral precision: 8 decimal places (satoshis). Every registered
/// collateral, the settlement asset included, must report exactly this
/// precision — the registry refuses anything else. Treating all collateral
/// 1:1 in value terms only works if they also agree on what "one unit"
/// means.
pub const COLLATERAL_DECIMALS: u8 = 8;

/// Multiplier from native collateral units (8 decimals) up to share
/// precision (18 decimals): 10^10.
pub const DECIMAL_SCALE_FACTOR: u128 = 10u128.pow((SHARE_DECIMALS - COLLATERAL_DECIMALS) as u32);

/// One whole share in base units (10^18).
pub const ONE_SHARE: u128 = 10u128.pow(SHARE_DECIMALS as u32);

// ---------------------------------------------------------------------------
// Deposit Limits
// ---------------------------------------------------------------------------

/// Minimum deposit in native collateral units: 10_000 sats (0.0001 BTC).
/// Small enough to be inclusive, large enough that a deposit can never
/// round to zero shares under any NAV this vault could plausibly report,
/// and dust positions don't clutter the ledger.
pub const MIN_DEPOSIT: u128 = 10_000;

// ---------------------------------------------------------------------------
// Signing Domain
// ---------------------------------------------------------------------------

/// Human-readable name bound into every withdrawal-authorization domain.
pub const DOMAIN_NAME: &str = "Coffer Vault";

/// Version tag of the withdrawal-authorization struct layout. Bump on any
/// change to the signable byte layout — old signatures must not validate
/// against a new layout, and vice versa.
pub const DOMAIN_VERSION: &str = "1";

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Mainnet — the real deal. Mistakes here cost real bitcoin.
pub const NETWORK_ID_MAINNET: u32 = 0x434F4652; // "COFR"

/// Testnet — where we break things on purpose and call it "testing."
pub const NETWORK_ID_TESTNET: u32 = 0x434F4654; // "COFT"

/// Devnet — reset weekly, no promises, no survivors.
pub const NETWORK_ID_DEVNET: u32 = 0x434F4644; // "COFD"

/// Human-readable bech32 prefixes for addresses, per network.
pub const MAINNET_HRP: &str = "coffer";
pub const TESTNET_HRP: &str = "tcoffer";
pub const DEVNET_HRP: &str = "dcoffer";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 secret key length in bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Ed25519 public (verifying) key length in bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes. If yours isn't, something
/// has gone terribly wrong.
pub const SIGNATURE_LENGTH: usize = 64;

/// Hash output length in bytes. Both BLAKE3 and SHA-256 produce 32-byte
/// digests, and addresses and domain separators are exactly one digest.
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Returns the bech32 HRP for a given network ID.
/// Returns `None` for unrecognized networks — we don't guess.
pub fn hrp_for_network(network_id: u32) -> Option<&'static str> {
    match network_id {
        NETWORK_ID_MAINNET => Some(MAINNET_HRP),
        NETWORK_ID_TESTNET => Some(TESTNET_HRP),
        NETWORK_ID_DEVNET => Some(DEVNET_HRP),
        _ => None,
    }
}

/// Returns a friendly name for a network ID, mainly for logging.
/// Unknown networks get a hex dump because we're helpful like that.
pub fn network_name(network_id: u32) -> String {
    match network_id {
        NETWORK_ID_MAINNET => "mainnet".to_string(),
        NETWORK_ID_TESTNET => "testnet".to_string(),
        NETWORK_ID_DEVNET => "devnet".to_string(),
        other => format!("unknown(0x{:08X})", other),
    }
}
