//! ComputeTx: the lottery outcome derived from every revealed secret.

use super::TxError;
use crate::crypto::{CommitmentHash, Secret};

/// Outcome of the lottery.
///
/// Each player contributes `len(secret) - min_length`, a value in
/// `[0, no_players)` fixed by the commitment. The winner is the sum of all
/// contributions modulo `no_players`, which is uniform as long as a single
/// player sampled their secret honestly.
///
/// Built only once every player's secret is known. Routing the pot to the
/// winner is not part of this type.
#[derive(Clone, Debug)]
pub struct ComputeTx {
    secrets: Vec<Secret>,
    winner: usize,
}

impl ComputeTx {
    /// Check every reveal against its commitment and derive the winner
    pub fn new(hashes: &[CommitmentHash], secrets: &[Secret], min_length: usize) -> Result<Self, TxError> {
        let no_players = hashes.len();
        if no_players == 0 || secrets.len() != no_players {
            return Err(TxError::Verification(format!(
                "expected {} revealed secrets, got {}",
                no_players,
                secrets.len()
            )));
        }

        let mut sum = 0usize;
        for (k, (hash, secret)) in hashes.iter().zip(secrets).enumerate() {
            if secret.len() < min_length || secret.len() >= min_length + no_players {
                return Err(TxError::Verification(format!(
                    "secret of player {} has length {} outside the committed range",
                    k,
                    secret.len()
                )));
            }
            if !hash.verify(secret) {
                return Err(TxError::Verification(format!(
                    "secret of player {} does not match the commitment",
                    k
                )));
            }
            sum += secret.len() - min_length;
        }

        Ok(Self { secrets: secrets.to_vec(), winner: sum % no_players })
    }

    /// Position of the winning player
    pub fn winner(&self) -> usize {
        self.winner
    }

    pub fn secrets(&self) -> &[Secret] {
        &self.secrets
    }
}
