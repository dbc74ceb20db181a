//! Decoding of byte strings typed or pasted by an operator.

use bitcoin::base58;

/// Decode `input` as hex, falling back to base58. Returns `None` when neither
/// encoding applies. The empty string decodes to no bytes.
pub fn parse_hex_or_base58(input: &str) -> Option<Vec<u8>> {
    let input = input.trim();
    if let Ok(bytes) = hex::decode(input) {
        return Some(bytes);
    }
    base58::decode(input).ok()
}
