//! Secret and CommitmentHash for the commit-reveal scheme.

use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A player's secret. Its length carries the player's contribution to the
/// lottery outcome, so it lies in `[min_length, min_length + no_players)`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Sample a secret of uniformly random length and content
    pub fn sample<R: RngCore + CryptoRng>(rng: &mut R, min_length: usize, no_players: usize) -> Self {
        let extra = rng.gen_range(0..no_players);
        let mut bytes = vec![0u8; min_length + extra];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compute the commitment hash (SHA256 of the secret)
    pub fn commitment(&self) -> CommitmentHash {
        calc_hash(&self.0)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.0.len().min(8);
        write!(f, "Secret({}, len={})", hex::encode(&self.0[..shown]), self.0.len())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// SHA256 commitment to a secret, published before the secret itself
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitmentHash([u8; 32]);

impl CommitmentHash {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, `None` unless it is exactly 32 bytes long
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify that a revealed secret matches this commitment
    pub fn verify(&self, secret: &Secret) -> bool {
        verify_reveal(self, secret.as_bytes())
    }
}

impl fmt::Debug for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentHash({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Commitment hash of arbitrary secret bytes
pub fn calc_hash(secret: &[u8]) -> CommitmentHash {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    CommitmentHash(hasher.finalize().into())
}

/// Check a reveal against a previously published commitment
pub fn verify_reveal(hash: &CommitmentHash, secret: &[u8]) -> bool {
    calc_hash(secret) == *hash
}
