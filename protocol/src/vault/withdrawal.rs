//! # Withdrawal Authorization
//!
//! The typed signing scheme that lets a share owner authorize a specific
//! redemption while completely offline. The owner signs once, hands the
//! bytes to the manager through any channel at all — email, a queue, a
//! napkin — and the vault will honor it exactly once, before its
//! expiration, and only while the round it was signed against is still
//! current.
//!
//! ## Domain separation
//!
//! Every signature binds to a [`SigningDomain`]: protocol name, struct
//! version, network id, and the verifying vault's address, hashed into a
//! 32-byte separator that prefixes the signable payload. Two structurally
//! identical requests signed for different networks — or for two vault
//! instances on the same network — can never cross-validate. This is the
//! whole reason the domain exists; skip any field and some replay becomes
//! possible somewhere.
//!
//! ## Share denomination
//!
//! The authorized quantity is **share-denominated**. The wire field keeps
//! its historical name `amount`, but the vault burns exactly this many
//! shares and derives the assets paid at settlement time — the owner
//! authorizes a claim size, not a payout size. The `min_assets_out`
//! protection for payout size lives in the batch path's line items.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{DOMAIN_NAME, DOMAIN_VERSION};
use crate::crypto::hash::{blake3_hash, double_sha256};
use crate::crypto::keys::{CofferKeypair, CofferPublicKey, CofferSignature};
use crate::ledger::address::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Authorization failures, one variant per validation stage.
///
/// The vault checks these in a fixed order (expiry, round, nonce,
/// signature) so a given bad request always fails the same way — manager
/// tooling keys retry behavior off these variants.
#[derive(Debug, Error)]
pub enum WithdrawalError {
    /// The request's expiration timestamp is in the past.
    #[error("request expired at {expires_at}, now {now}")]
    Expired { expires_at: u64, now: u64 },

    /// The vault's round counter has advanced past the request's limit.
    #[error("round lapsed: request valid through round {max_round}, current round {current}")]
    RoundLapsed { max_round: u64, current: u64 },

    /// The (owner, nonce) pair was already consumed.
    #[error("nonce {nonce} reused for owner {owner}")]
    NonceReused { owner: Address, nonce: u64 },

    /// The signature does not recover to the declared owner under the
    /// bound domain: bad signature, wrong key, or a key that doesn't
    /// hash to the owner address. Deliberately not distinguished.
    #[error("invalid signature for owner {owner}")]
    InvalidSignature { owner: Address },

    /// The wire bytes don't decode as a signed withdrawal.
    #[error("malformed signed withdrawal: {reason}")]
    Malformed { reason: String },
}

// ---------------------------------------------------------------------------
// SigningDomain
// ---------------------------------------------------------------------------

/// The domain a withdrawal authorization is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningDomain {
    /// Human-readable system name ([`DOMAIN_NAME`]).
    pub name: String,

    /// Struct-layout version tag ([`DOMAIN_VERSION`]).
    pub version: String,

    /// Ledger network identifier.
    pub network_id: u32,

    /// Address of the vault instance that will verify the signature.
    pub verifying_vault: Address,
}

impl SigningDomain {
    /// Domain for a vault instance on a given network, using the
    /// protocol's canonical name and version.
    pub fn new(network_id: u32, verifying_vault: Address) -> Self {
        Self {
            name: DOMAIN_NAME.to_string(),
            version: DOMAIN_VERSION.to_string(),
            network_id,
            verifying_vault,
        }
    }

    /// The 32-byte domain separator:
    /// `BLAKE3(name || 0x00 || version || 0x00 || network_id_be || 0x00 || vault)`.
    ///
    /// Separator bytes between the variable-length fields, same reasoning
    /// as everywhere else we hash concatenations.
    pub fn separator(&self) -> [u8; 32] {
        let mut preimage =
            Vec::with_capacity(self.name.len() + self.version.len() + 4 + 32 + 3);
        preimage.extend_from_slice(self.name.as_bytes());
        preimage.push(0x00);
        preimage.extend_from_slice(self.version.as_bytes());
        preimage.push(0x00);
        preimage.extend_from_slice(&self.network_id.to_be_bytes());
        preimage.push(0x00);
        preimage.extend_from_slice(self.verifying_vault.as_bytes());
        blake3_hash(&preimage)
    }
}

// ---------------------------------------------------------------------------
// WithdrawalRequest
// ---------------------------------------------------------------------------

/// The struct a share owner signs.
///
/// Immutable once signed: the vault consumes it exactly once and never
/// mutates it. All quantities little-endian in the signable layout, like
/// every other canonical byte string in the protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// The share owner granting the authorization.
    pub owner: Address,

    /// Where the settlement asset should be paid.
    pub destination: Address,

    /// Share quantity to redeem, 18-decimal base units.
    ///
    /// Wire name `amount` for layout compatibility; semantically shares.
    #[serde(rename = "amount")]
    pub shares: u128,

    /// Owner-chosen replay nonce, unique per owner.
    pub nonce: u64,

    /// Unix timestamp (seconds) after which the request is dead.
    pub expires_at: u64,

    /// Highest vault round this request is valid in.
    pub max_round: u64,
}

impl WithdrawalRequest {
    /// The canonical byte string the owner signs, bound to `domain`.
    ///
    /// Layout: `separator(32) || owner(32) || destination(32) ||
    /// shares_le(16) || nonce_le(8) || expires_at_le(8) || max_round_le(8)`.
    /// Every field fixed-width, so no length prefixes are needed and the
    /// layout can't be reparsed ambiguously.
    pub fn signable_bytes(&self, domain: &SigningDomain) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + 32 + 32 + 16 + 8 + 8 + 8);
        buf.extend_from_slice(&domain.separator());
        buf.extend_from_slice(self.owner.as_bytes());
        buf.extend_from_slice(self.destination.as_bytes());
        buf.extend_from_slice(&self.shares.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&self.expires_at.to_le_bytes());
        buf.extend_from_slice(&self.max_round.to_le_bytes());
        buf
    }

    /// Request id: `hex(double_sha256(signable_bytes))`.
    ///
    /// Stable per (request, domain) pair; what events and the manager's
    /// queue use to correlate a request across systems.
    pub fn id(&self, domain: &SigningDomain) -> String {
        hex::encode(double_sha256(&self.signable_bytes(domain)))
    }
}

// ---------------------------------------------------------------------------
// SignedWithdrawal
// ---------------------------------------------------------------------------

/// A withdrawal request plus the owner's signature and public key.
///
/// The public key travels with the signature because the vault only knows
/// owners by address (a key hash). Verification first checks that the
/// presented key hashes to the declared owner — otherwise any valid
/// signature from any key would pass — and only then checks the signature
/// itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedWithdrawal {
    /// The authorized request.
    pub request: WithdrawalRequest,

    /// The owner's Ed25519 public key.
    pub public_key: CofferPublicKey,

    /// Ed25519 signature over [`WithdrawalRequest::signable_bytes`].
    pub signature: CofferSignature,
}

impl SignedWithdrawal {
    /// Sign `request` with the owner's keypair under `domain`.
    ///
    /// The keypair must belong to `request.owner`; signing with any other
    /// key produces an authorization that will never verify.
    pub fn sign(
        request: WithdrawalRequest,
        keypair: &CofferKeypair,
        domain: &SigningDomain,
    ) -> Self {
        let signature = keypair.sign(&request.signable_bytes(domain));
        Self {
            request,
            public_key: keypair.public_key(),
            signature,
        }
    }

    /// Verify the cryptographic half of the authorization: the presented
    /// public key must hash to the declared owner, and the signature must
    /// verify over the domain-bound signable bytes.
    ///
    /// The stateful half — expiry, round, nonce — is the vault's job;
    /// this method is deliberately pure so it can run anywhere the bytes
    /// do (manager-side pre-checks use it too).
    pub fn verify_signature(&self, domain: &SigningDomain) -> Result<(), WithdrawalError> {
        let derived = Address::from_public_key(&self.public_key);
        if derived != self.request.owner {
            return Err(WithdrawalError::InvalidSignature {
                owner: self.request.owner,
            });
        }

        let signable = self.request.signable_bytes(domain);
        if !self.public_key.verify(&signable, &self.signature) {
            return Err(WithdrawalError::InvalidSignature {
                owner: self.request.owner,
            });
        }
        Ok(())
    }

    /// Encode for transport to the manager's queue.
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("signed withdrawal always serializes")
    }

    /// Decode from transport bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WithdrawalError> {
        bincode::deserialize(bytes).map_err(|e| WithdrawalError::Malformed {
            reason: e.to_string(),
        })
    }
}
