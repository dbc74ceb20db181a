//! Secrets: the local one and the reveals of every player.

use super::{Verifier, WrongInput};
use crate::crypto::{parse_hex_or_base58, CommitmentHash, Secret};
use rand::{CryptoRng, RngCore};

fn decode_secret(input: &str) -> Result<Secret, WrongInput> {
    parse_hex_or_base58(input)
        .map(Secret::from_bytes)
        .ok_or_else(|| WrongInput::Format("Wrong format of the secret.".to_string()))
}

fn check_length(secret: &Secret, min_length: usize, no_players: usize) -> Result<(), WrongInput> {
    if secret.len() < min_length {
        return Err(WrongInput::Value(format!(
            "The secret is too short, it should have at least {} bytes.",
            min_length
        )));
    }
    if secret.len() >= min_length + no_players {
        return Err(WrongInput::Value(format!(
            "The secret is too long, it should have less than {} bytes.",
            min_length + no_players
        )));
    }
    Ok(())
}

/// Accepts the local player's secret. An empty line draws a fresh one.
pub struct NewSecretVerifier<'a, R> {
    min_length: usize,
    no_players: usize,
    rng: &'a mut R,
}

impl<'a, R: RngCore + CryptoRng> NewSecretVerifier<'a, R> {
    pub fn new(min_length: usize, no_players: usize, rng: &'a mut R) -> Self {
        Self { min_length, no_players, rng }
    }
}

impl<R: RngCore + CryptoRng> Verifier for NewSecretVerifier<'_, R> {
    type Output = Secret;

    fn verify(&mut self, input: &str) -> Result<Secret, WrongInput> {
        if input.trim().is_empty() {
            return Ok(Secret::sample(self.rng, self.min_length, self.no_players));
        }
        let secret = decode_secret(input)?;
        check_length(&secret, self.min_length, self.no_players)?;
        Ok(secret)
    }
}

/// Accepts the revealed secrets of all players in position order, each
/// checked against that player's commitment hash
#[derive(Clone, Debug)]
pub struct SecretListVerifier {
    hashes: Vec<CommitmentHash>,
    min_length: usize,
    counter: usize,
}

impl SecretListVerifier {
    pub fn new(hashes: Vec<CommitmentHash>, min_length: usize) -> Self {
        Self { hashes, min_length, counter: 0 }
    }

    /// Number of secrets accepted so far
    pub fn accepted(&self) -> usize {
        self.counter
    }

    pub fn is_complete(&self) -> bool {
        self.counter == self.hashes.len()
    }
}

impl Verifier for SecretListVerifier {
    type Output = Secret;

    fn verify(&mut self, input: &str) -> Result<Secret, WrongInput> {
        let hash = self
            .hashes
            .get(self.counter)
            .ok_or_else(|| WrongInput::Sequence("Too many secrets.".to_string()))?;
        let secret = decode_secret(input)?;
        check_length(&secret, self.min_length, self.hashes.len())?;
        if !hash.verify(&secret) {
            return Err(WrongInput::Mismatch(format!(
                "The secret does not match the commitment of player {}.",
                self.counter
            )));
        }
        self.counter += 1;
        Ok(secret)
    }
}
