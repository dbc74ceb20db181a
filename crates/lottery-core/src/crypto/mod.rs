//! Cryptographic primitives for the lottery protocol.
//!
//! This module provides:
//! - Secret and CommitmentHash for the commit-reveal scheme
//! - Decoding of operator-supplied byte strings (hex or base58)

mod commitment;
mod encoding;

pub use commitment::{calc_hash, verify_reveal, CommitmentHash, Secret};
pub use encoding::parse_hex_or_base58;
