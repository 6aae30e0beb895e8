//! Hashing, signature recovery, and hex helpers for wallet responses.
//!
//! Everything here is pure: no I/O, no state. Verification never panics on
//! malformed wallet output; a bad signature is a `false`, not a crash.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// EIP-191 domain separator for personal messages.
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid signature: {0}")]
    InvalidSignature(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// Keccak-256 over the length-prefixed personal message.
///
/// The prefix uses the byte length of the message, not its character count.
pub fn hash_personal_message(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Recover the signer address from a 65-byte `r ‖ s ‖ v` signature over
/// `hash`.
///
/// The `v` byte is accepted in any of the three encodings wallets produce:
/// raw {0,1}, legacy {27,28}, or EIP-155 (`recovery_id + 35 + 2*chain_id`).
/// High-`s` signatures are normalized, flipping the recovery parity to
/// match.
pub fn recover_address(
    hash: &[u8; 32],
    signature: &[u8],
    chain_id: u64,
) -> Result<String, CryptoError> {
    if signature.len() != 65 {
        return Err(CryptoError::InvalidSignature("signature must be 65 bytes"));
    }

    let mut r = [0_u8; 32];
    let mut s = [0_u8; 32];
    r.copy_from_slice(&signature[..32]);
    s.copy_from_slice(&signature[32..64]);

    let mut recovery = normalize_v(signature[64], chain_id)?;

    // from_scalars rejects zero scalars and anything at or above the curve
    // order.
    let mut parsed = Signature::from_scalars(r, s)
        .map_err(|_| CryptoError::InvalidSignature("r or s out of range"))?;

    if let Some(normalized) = parsed.normalize_s() {
        parsed = normalized;
        recovery ^= 1;
    }

    let recovery_id = RecoveryId::from_byte(recovery)
        .ok_or(CryptoError::InvalidSignature("recovery id out of range"))?;

    let key = VerifyingKey::recover_from_prehash(hash, &parsed, recovery_id)
        .map_err(|_| CryptoError::InvalidSignature("public key recovery failed"))?;

    Ok(public_key_address(&key))
}

/// Collapse a `v` byte into the raw recovery id {0, 1}.
fn normalize_v(v: u8, chain_id: u64) -> Result<u8, CryptoError> {
    let v = u64::from(v);
    let raw = if v >= 35 {
        v.checked_sub(35 + 2 * chain_id)
            .ok_or(CryptoError::InvalidSignature("v does not match chain id"))?
    } else if v >= 27 {
        v - 27
    } else {
        v
    };

    if raw > 1 {
        return Err(CryptoError::InvalidSignature("v does not match chain id"));
    }

    Ok(raw as u8)
}

/// True iff `signature` over `hash` recovers to `claimed_address`.
///
/// Address comparison is case-insensitive (checksummed and lower-case forms
/// are equal). Any recovery failure is `false`, never an error.
pub fn verify_signature(
    claimed_address: &str,
    signature: &[u8],
    hash: &[u8; 32],
    chain_id: u64,
) -> bool {
    match recover_address(hash, signature, chain_id) {
        Ok(recovered) => recovered.eq_ignore_ascii_case(claimed_address),
        Err(_) => false,
    }
}

/// Lower-case `0x` address from an uncompressed public key: the low 20
/// bytes of the Keccak-256 of the key minus its SEC1 prefix byte.
pub fn public_key_address(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", encode_hex(&digest[12..]))
}

/// Minimal-length lower-case `0x` quantity string; `0` stays `"0x0"`.
pub fn quantity_to_hex(value: i128) -> Result<String, CryptoError> {
    if value < 0 {
        return Err(CryptoError::InvalidArgument("quantity cannot be negative"));
    }
    Ok(format!("0x{value:x}"))
}

/// Parse a `0x` (or bare) hex quantity string.
pub fn parse_hex_quantity(input: &str) -> Result<u128, CryptoError> {
    let digits = strip_hex_prefix(input);
    if digits.is_empty() {
        return Err(CryptoError::InvalidArgument("empty hex quantity"));
    }
    u128::from_str_radix(digits, 16)
        .map_err(|_| CryptoError::InvalidArgument("malformed hex quantity"))
}

/// Decode a hex string into bytes. Accepts an optional `0x` prefix;
/// odd-length input is left-padded with a zero nibble.
pub fn decode_hex(input: &str) -> Result<Vec<u8>, CryptoError> {
    let digits = strip_hex_prefix(input);
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{digits}");
        &padded
    } else {
        digits
    };

    let raw = digits.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len() / 2);
    for pair in raw.chunks(2) {
        let hi = hex_nibble(pair[0])?;
        let lo = hex_nibble(pair[1])?;
        bytes.push(hi << 4 | lo);
    }
    Ok(bytes)
}

pub fn encode_hex(input: &[u8]) -> String {
    let mut output = String::with_capacity(input.len() * 2);
    for byte in input {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

fn hex_nibble(c: u8) -> Result<u8, CryptoError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(CryptoError::InvalidArgument("malformed hex string")),
    }
}
