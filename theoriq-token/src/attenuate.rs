extern crate biscuit_auth as biscuit;

use biscuit::builder::BlockBuilder;
use biscuit::KeyPair;
use tracing::debug;

use crate::error::TokenError;
use crate::facts::Fact;
use crate::token::CapabilityToken;

impl CapabilityToken {
    /// Appends a third-party block holding `facts`, signed by `party_key`.
    ///
    /// Earlier blocks are left untouched and the original token stays valid;
    /// the returned token is a new value.
    ///
    /// # Arguments
    ///
    /// * `facts` - The facts of the new block, written with this token's profile
    /// * `party_key` - The key of the agent appending the block
    ///
    /// # Returns
    ///
    /// A new token with one more block than `self`
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Biscuit`] if a fact cannot be added to the block or
    /// the third-party block cannot be signed and appended.
    pub fn attenuate(
        &self,
        facts: &[Fact],
        party_key: &KeyPair,
    ) -> Result<CapabilityToken, TokenError> {
        let third_party_request = self.biscuit().third_party_request()?;

        let mut block = BlockBuilder::new();
        for fact in facts {
            block = block.fact(fact.to_biscuit_fact(self.profile()))?;
        }

        let third_party_block = third_party_request.create_block(&party_key.private(), block)?;
        let attenuated = self
            .biscuit()
            .append_third_party(party_key.public(), third_party_block)?;

        debug!(
            "attenuated token with {} facts, now {} blocks",
            facts.len(),
            attenuated.block_count()
        );

        Ok(CapabilityToken::from_biscuit(attenuated, *self.profile()))
    }
}
