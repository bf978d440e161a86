//! Purchase confirmation for support tasks
//!
//! A support task is complete once the user's wallet holds a non-zero
//! balance of the post's token. This reads `balanceOf` directly and does not
//! depend on the social API.

use std::sync::Arc;
use tracing::{debug, info};

use crate::chain::abi::{decode_first_uint, encode_balance_of};
use crate::chain::{Address, ChainReader};
use crate::types::Result;

pub struct PurchaseVerifier {
    chain: Arc<dyn ChainReader>,
}

impl PurchaseVerifier {
    pub fn new(chain: Arc<dyn ChainReader>) -> Self {
        Self { chain }
    }

    /// Whether `holder` owns any of `token`.
    ///
    /// Malformed addresses are `Ok(false)` without a chain call; RPC
    /// failures are errors.
    pub async fn has_purchased(&self, token: &str, holder: &str) -> Result<bool> {
        let (Ok(token), Ok(holder)) = (Address::parse(token), Address::parse(holder)) else {
            debug!(token = %token, holder = %holder, "Rejecting malformed address");
            return Ok(false);
        };

        let balance = self.balance_of(&token, &holder).await?;
        info!(token = %token, holder = %holder, balance, "Token balance checked");
        Ok(balance > 0)
    }

    /// Raw token balance (saturating at `u128::MAX`).
    pub async fn balance_of(&self, token: &Address, holder: &Address) -> Result<u128> {
        let output = self.chain.call(token, &encode_balance_of(holder)).await?;
        Ok(decode_first_uint(&output)?)
    }
}
