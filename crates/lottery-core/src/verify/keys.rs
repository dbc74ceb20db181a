//! Keys and addresses.

use super::{Verifier, WrongInput};
use crate::crypto::parse_hex_or_base58;
use crate::protocol::Players;
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network, NetworkKind, PrivateKey, PubkeyHash, PublicKey};
use secp256k1::Secp256k1;
use tracing::debug;

/// Decodes a WIF secret key, optionally requiring it to match a known
/// public key hash
#[derive(Clone, Debug)]
pub struct SkVerifier {
    expected: Option<PubkeyHash>,
    network: Network,
}

impl SkVerifier {
    pub fn new(expected: Option<PubkeyHash>, network: Network) -> Self {
        Self { expected, network }
    }
}

impl Verifier for SkVerifier {
    type Output = PrivateKey;

    fn verify(&mut self, input: &str) -> Result<PrivateKey, WrongInput> {
        let sk = PrivateKey::from_wif(input.trim())
            .map_err(|_| WrongInput::Format("Wrong format of the secret key.".to_string()))?;
        if sk.network != NetworkKind::from(self.network) {
            return Err(WrongInput::Network(
                "Provided key corresponds to a different chain.".to_string(),
            ));
        }
        if let Some(expected) = self.expected {
            if sk.public_key(&Secp256k1::new()).pubkey_hash() != expected {
                return Err(WrongInput::Mismatch(
                    "The secret key does not correspond to expected public key.".to_string(),
                ));
            }
        }
        Ok(sk)
    }
}

/// Decodes an address for the configured network
#[derive(Clone, Debug)]
pub struct AddressVerifier {
    network: Network,
}

impl AddressVerifier {
    pub fn new(network: Network) -> Self {
        Self { network }
    }
}

impl Verifier for AddressVerifier {
    type Output = Address;

    fn verify(&mut self, input: &str) -> Result<Address, WrongInput> {
        let address: Address<NetworkUnchecked> = input
            .trim()
            .parse()
            .map_err(|_| WrongInput::Format("Wrong format of the address.".to_string()))?;
        if !address.is_valid_for_network(self.network) {
            return Err(WrongInput::Network(
                "Provided key corresponds to a different chain.".to_string(),
            ));
        }
        Ok(address.assume_checked())
    }
}

/// Accepts the ordered list of all players' public keys, one per call.
///
/// The key derived from the local secret key must appear exactly once; its
/// index becomes the local position. The last key is rejected if the local
/// key has not appeared by then.
#[derive(Clone, Debug)]
pub struct PkListVerifier {
    expected: PublicKey,
    no_players: usize,
    accepted: Vec<PublicKey>,
    position: Option<usize>,
}

impl PkListVerifier {
    pub fn new(expected: PublicKey, no_players: usize) -> Self {
        Self { expected, no_players, accepted: Vec::with_capacity(no_players), position: None }
    }

    /// Index of the local key, once it has been accepted
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn is_complete(&self) -> bool {
        self.accepted.len() == self.no_players
    }

    /// End the sequence, yielding the agreed player list
    pub fn finish(self) -> Result<Players, WrongInput> {
        if !self.is_complete() {
            return Err(WrongInput::Sequence(format!(
                "Expected {} public keys, got {}.",
                self.no_players,
                self.accepted.len()
            )));
        }
        let position = self.position.ok_or_else(|| {
            WrongInput::Sequence(
                "Public key matching the provided secret key should be present.".to_string(),
            )
        })?;
        Ok(Players::new(self.accepted, position))
    }
}

impl Verifier for PkListVerifier {
    type Output = PublicKey;

    fn verify(&mut self, input: &str) -> Result<PublicKey, WrongInput> {
        if self.is_complete() {
            return Err(WrongInput::Sequence("Too many public keys.".to_string()));
        }
        let pk = parse_hex_or_base58(input)
            .and_then(|bytes| PublicKey::from_slice(&bytes).ok())
            .ok_or_else(|| WrongInput::Format("Wrong format of the public key.".to_string()))?;
        // Compressed and uncompressed encodings of one point are the same key
        if self.accepted.iter().any(|known| known.inner == pk.inner) {
            return Err(WrongInput::Mismatch("This public key is already on the list.".to_string()));
        }
        if pk.inner == self.expected.inner && pk.compressed != self.expected.compressed {
            return Err(WrongInput::Mismatch(
                "The public key should be encoded like the one of the provided secret key.".to_string(),
            ));
        }
        let is_local = pk == self.expected;
        let is_last = self.accepted.len() + 1 == self.no_players;
        if is_last && !is_local && self.position.is_none() {
            return Err(WrongInput::Sequence(
                "Public key matching the provided secret key should be present.".to_string(),
            ));
        }
        if is_local {
            debug!(position = self.accepted.len(), "Local public key found");
            self.position = Some(self.accepted.len());
        }
        self.accepted.push(pk);
        Ok(pk)
    }
}
