extern crate biscuit_auth as biscuit;

use std::fs::read_to_string;

use biscuit::Algorithm as Alg;
use biscuit::{KeyPair, PrivateKey, PublicKey};

use crate::address::strip_hex_prefix;
use crate::error::TokenError;

/// Takes a public key encoded as a string in the format "ed25519/..." or "secp256r1/..."
/// and returns a PublicKey. A PEM document is accepted as well.
pub fn biscuit_key_from_string(key: &str) -> Result<PublicKey, TokenError> {
    let key = key.trim();
    if key.starts_with("-----BEGIN") {
        return PublicKey::from_pem(key).map_err(|e| TokenError::invalid_key_format(e.to_string()));
    }

    let (algorithm, hex_key) = key.split_once('/').ok_or_else(|| {
        TokenError::invalid_key_format("Key must be in format 'algorithm/hexkey'")
    })?;

    let alg = match algorithm {
        "ed25519" => Alg::Ed25519,
        "secp256r1" => Alg::Secp256r1,
        _ => {
            return Err(TokenError::invalid_key_format(
                "Unsupported algorithm, must be ed25519 or secp256r1",
            ))
        }
    };

    let bytes = hex::decode(hex_key)?;
    PublicKey::from_bytes(&bytes, alg).map_err(|e| TokenError::invalid_key_format(e.to_string()))
}

/// Renders a public key as "ed25519/<hex>", the form the issuer publishes.
pub fn public_key_to_string(key: &PublicKey) -> String {
    key.to_string()
}

pub fn public_key_from_pem_file(path: &str) -> Result<PublicKey, TokenError> {
    let key_string = read_to_string(path)
        .map_err(|e| TokenError::generic(format!("Failed to read file: {}", e)))?;
    PublicKey::from_pem(&key_string)
        .map_err(|e| TokenError::invalid_key_format(format!("Failed to parse PEM: {}", e)))
}

/// Rebuilds an Ed25519 agent key pair from its 32-byte secret in hex.
pub fn keypair_from_hex(private_key: &str) -> Result<KeyPair, TokenError> {
    let bytes = hex::decode(strip_hex_prefix(private_key.trim()))?;
    let private = PrivateKey::from_bytes(&bytes, Alg::Ed25519)
        .map_err(|e| TokenError::invalid_key_format(e.to_string()))?;
    Ok(KeyPair::from(&private))
}
