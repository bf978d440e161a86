//! Minimal ABI encoding for the two read calls the engine makes
//!
//! Only static arguments are needed, so every argument is a single 32-byte
//! word and no offset table is written.

use super::address::Address;
use super::rpc::ChainError;

/// `quoteExactInputSingle((address,address,uint256,uint24,uint160))` on QuoterV2
pub const QUOTE_EXACT_INPUT_SINGLE: [u8; 4] = [0xc6, 0xa5, 0x02, 0x6a];

/// `balanceOf(address)` on ERC-20
pub const BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

const WORD: usize = 32;

fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Calldata for a single-pool exact-input quote with no price limit.
pub fn encode_quote_exact_input_single(
    token_in: &Address,
    token_out: &Address,
    amount_in: u128,
    fee: u32,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 5 * WORD);
    data.extend_from_slice(&QUOTE_EXACT_INPUT_SINGLE);
    data.extend_from_slice(&address_word(token_in));
    data.extend_from_slice(&address_word(token_out));
    data.extend_from_slice(&uint_word(amount_in));
    data.extend_from_slice(&uint_word(u128::from(fee)));
    // sqrtPriceLimitX96 = 0
    data.extend_from_slice(&[0u8; WORD]);
    data
}

/// Calldata for `balanceOf(holder)`.
pub fn encode_balance_of(holder: &Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&BALANCE_OF);
    data.extend_from_slice(&address_word(holder));
    data
}

/// Read the first return word as an unsigned amount.
///
/// Values above `u128::MAX` saturate; callers only care whether an amount is
/// positive and feed it back into another quote.
pub fn decode_first_uint(data: &[u8]) -> Result<u128, ChainError> {
    if data.len() < WORD {
        return Err(ChainError::InvalidResponse(format!(
            "expected at least {WORD} bytes of return data, got {}",
            data.len()
        )));
    }

    let (high, low) = data[..WORD].split_at(16);
    if high.iter().any(|b| *b != 0) {
        return Ok(u128::MAX);
    }

    let mut buf = [0u8; 16];
    buf.copy_from_slice(low);
    Ok(u128::from_be_bytes(buf))
}
