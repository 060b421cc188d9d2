extern crate biscuit_auth as biscuit;

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use biscuit::{Biscuit, PublicKey};
use tracing::debug;

use crate::error::TokenError;
use crate::profile::{ProtocolProfile, THEORIQ};
use crate::store::FactStore;

/// A verified, immutable capability token.
///
/// Holds the signature-checked biscuit and the protocol profile its facts are
/// read with. Cloning is cheap; attenuating produces a new token.
#[derive(Clone)]
pub struct CapabilityToken {
    biscuit: Arc<Biscuit>,
    profile: ProtocolProfile,
}

impl CapabilityToken {
    pub(crate) fn from_biscuit(biscuit: Biscuit, profile: ProtocolProfile) -> Self {
        Self {
            biscuit: Arc::new(biscuit),
            profile,
        }
    }

    /// Decodes a transport-encoded token and checks its signatures against
    /// `public_key`.
    ///
    /// # Arguments
    ///
    /// * `encoded` - The token in URL-safe or standard base64
    /// * `public_key` - The issuer public key the authority block must be signed with
    ///
    /// # Returns
    ///
    /// The verified token, read with the Theoriq profile
    ///
    /// # Errors
    ///
    /// Every failure is reported as [`TokenError::Parse`]; the underlying
    /// cause is only written to the debug log.
    pub fn from_encoded(encoded: &str, public_key: PublicKey) -> Result<Self, TokenError> {
        Self::from_encoded_with_profile(encoded, public_key, THEORIQ)
    }

    pub fn from_encoded_with_profile(
        encoded: &str,
        public_key: PublicKey,
        profile: ProtocolProfile,
    ) -> Result<Self, TokenError> {
        let bytes = decode_base64(encoded)?;
        Self::from_bytes_with_profile(&bytes, public_key, profile)
    }

    pub fn from_bytes(bytes: &[u8], public_key: PublicKey) -> Result<Self, TokenError> {
        Self::from_bytes_with_profile(bytes, public_key, THEORIQ)
    }

    pub fn from_bytes_with_profile(
        bytes: &[u8],
        public_key: PublicKey,
        profile: ProtocolProfile,
    ) -> Result<Self, TokenError> {
        let biscuit = Biscuit::from(bytes, public_key).map_err(|e| {
            debug!("rejected token: {}", e);
            TokenError::Parse
        })?;
        Ok(Self::from_biscuit(biscuit, profile))
    }

    /// URL-safe base64 of the serialized token.
    pub fn to_encoded(&self) -> Result<String, TokenError> {
        Ok(URL_SAFE.encode(self.to_bytes()?))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TokenError> {
        self.biscuit.to_vec().map_err(TokenError::biscuit_error)
    }

    pub fn biscuit(&self) -> &Biscuit {
        &self.biscuit
    }

    pub fn profile(&self) -> &ProtocolProfile {
        &self.profile
    }

    /// Facts of every block.
    pub fn facts(&self) -> Result<FactStore, TokenError> {
        FactStore::from_token(self)
    }

    pub fn block_count(&self) -> usize {
        self.biscuit.block_count()
    }

    /// Hex revocation identifier of each block, authority first.
    pub fn revocation_ids(&self) -> Vec<String> {
        self.biscuit
            .revocation_identifiers()
            .into_iter()
            .map(hex::encode)
            .collect()
    }

    /// Human readable dump of all blocks.
    pub fn print(&self) -> String {
        self.biscuit.print()
    }
}

impl fmt::Display for CapabilityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.biscuit)
    }
}

impl fmt::Debug for CapabilityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityToken")
            .field("namespace", &self.profile.namespace)
            .field("blocks", &self.block_count())
            .finish()
    }
}

/// Accepts both the URL-safe and the standard base64 alphabets.
fn decode_base64(encoded: &str) -> Result<Vec<u8>, TokenError> {
    let encoded = encoded.trim();
    URL_SAFE
        .decode(encoded)
        .or_else(|_| STANDARD.decode(encoded))
        .map_err(|e| {
            debug!("rejected token encoding: {}", e);
            TokenError::Parse
        })
}
