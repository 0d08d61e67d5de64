//! # Digital Signatures
//!
//! Ed25519 signing and verification — the backbone of withdrawal
//! authorization in Coffer.
//!
//! Every withdrawal request the manager executes was authorized by one of
//! these signatures; the vault never moves shares on anyone's word alone.
//!
//! ## Why wrap ed25519-dalek at all?
//!
//! 1. A single place to audit all signing operations.
//! 2. Consistent error types across the codebase.
//! 3. Type safety — you can't accidentally pass a digest where a message
//!    goes.
//!
//! ## Strictness
//!
//! We use `ed25519-dalek`'s strict verification by default, rejecting the
//! edge-case signatures lenient implementations accept. Stricter is safer,
//! and we have no legacy implementations to stay compatible with.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use thiserror::Error;

use super::keys::{CofferKeypair, CofferPublicKey, CofferSignature};

/// Errors during signature operations.
///
/// Intentionally vague — we don't tell attackers why verification failed.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignatureBytes,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Sign a message using a Coffer keypair.
///
/// Produces a 64-byte Ed25519 signature over the given message bytes.
/// Deterministic per RFC 8032 — no nonce reuse bugs possible.
pub fn sign(keypair: &CofferKeypair, message: &[u8]) -> CofferSignature {
    keypair.sign(message)
}

/// Verify an Ed25519 signature against a public key and message.
///
/// Returns `true` if the signature is valid, `false` otherwise. We don't
/// distinguish "invalid signature" from "wrong public key" — both are just
/// "nope." A detailed error oracle helps exactly one audience, and it
/// isn't ours.
pub fn verify(public_key: &CofferPublicKey, message: &[u8], signature: &CofferSignature) -> bool {
    public_key.verify(message, signature)
}

/// Verify a signature using raw byte components.
///
/// The "I got these bytes off the wire and need to check them" variant.
/// Useful when deserializing withdrawal authorizations from the manager's
/// queue where everything arrives as byte slices.
pub fn verify_raw(
    public_key_bytes: &[u8; 32],
    message: &[u8],
    signature_bytes: &[u8; 64],
) -> Result<(), SignatureError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;

    let signature = DalekSignature::from_bytes(signature_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}
