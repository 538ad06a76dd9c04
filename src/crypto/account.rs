/// Blockchain account keys
///
/// Recovers the signing address from a recoverable secp256k1 signature over
/// an EIP-191 personal message and compares it with a CAIP-10 account id.

use crate::error::{ValidatorError, ValidatorResult};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

/// Keccak-256 of `data`
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// EIP-191 personal message hash
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    prefixed.extend_from_slice(message);
    keccak256(&prefixed)
}

/// Lowercase `0x`-prefixed address of a public key
pub fn address_from_verifying_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Extract the address from a CAIP-10 account id.
///
/// Accepts `eip155:<chain>:0x..`, `0x..@eip155:<chain>` and a bare `0x..`.
pub fn parse_account_address(account_id: &str) -> ValidatorResult<String> {
    let account_id = account_id.trim();
    let address = if let Some((address, _chain)) = account_id.split_once('@') {
        address
    } else {
        account_id.rsplit(':').next().unwrap_or(account_id)
    };

    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| ValidatorError::Decode(format!("Invalid account id: {}", account_id)))?;

    if hex_part.len() != 40 || hex::decode(hex_part).is_err() {
        return Err(ValidatorError::Decode(format!(
            "Invalid account address: {}",
            address
        )));
    }

    Ok(format!("0x{}", hex_part.to_lowercase()))
}

/// Recover the signer address of `message` from a 65-byte `r || s || v` signature
pub fn recover_address(message: &[u8], signature: &[u8]) -> ValidatorResult<String> {
    if signature.len() != 65 {
        return Err(ValidatorError::Decode(format!(
            "Recoverable signature must be 65 bytes, got {}",
            signature.len()
        )));
    }

    let v = match signature[64] {
        27 | 28 => signature[64] - 27,
        0 | 1 => signature[64],
        other => {
            return Err(ValidatorError::Decode(format!(
                "Invalid recovery byte: {}",
                other
            )))
        }
    };

    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| ValidatorError::Decode(format!("Invalid signature: {}", e)))?;
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| ValidatorError::Decode("Invalid recovery id".to_string()))?;

    // High-s signatures recover with the flipped parity
    let (sig, recovery_id) = match sig.normalize_s() {
        Some(normalized) => (
            normalized,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (sig, recovery_id),
    };

    let digest = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| ValidatorError::Decode(format!("Signature recovery failed: {}", e)))?;

    Ok(address_from_verifying_key(&key))
}

#[cfg(test)]
pub use signer::AccountSigner;
