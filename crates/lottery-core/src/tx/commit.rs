//! CommitTx: locks a player's deposit under their commitment hash.

use super::script::{
    commit_output_script, p2pkh, push_bytes, pushes, sign_input, verify_input, CommitScript,
};
use super::{decode, TxError};
use crate::crypto::CommitmentHash;
use bitcoin::absolute::LockTime;
use bitcoin::script::Builder;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, OutPoint, PrivateKey, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
};
use secp256k1::Secp256k1;

/// An unspent output owned by the committing player that funds their deposit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundingOutput {
    pub outpoint: OutPoint,
    pub txout: TxOut,
}

/// Terms every CommitTx of one lottery is checked against
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitTerms {
    /// Public keys of all players, in the agreed order
    pub pks: Vec<PublicKey>,
    pub min_length: usize,
    pub stake: Amount,
}

impl CommitTerms {
    pub fn no_players(&self) -> usize {
        self.pks.len()
    }

    /// Total deposit of one player: a stake for every co-player
    pub fn deposit(&self) -> Result<Amount, TxError> {
        let peers = self.no_players().saturating_sub(1) as u64;
        self.stake
            .checked_mul(peers)
            .ok_or_else(|| TxError::Amount("deposit overflows".to_string()))
    }

    /// Index of the commit output reserved for `peer` in `owner`'s CommitTx
    pub fn output_index(&self, owner: usize, peer: usize) -> Option<usize> {
        if peer == owner || peer >= self.no_players() {
            None
        } else if peer < owner {
            Some(peer)
        } else {
            Some(peer - 1)
        }
    }

    fn peers(&self, owner: usize) -> impl Iterator<Item = usize> {
        (0..self.no_players()).filter(move |k| *k != owner)
    }
}

/// Commitment transaction of one player.
///
/// Spends the player's funding output into one output per co-player, each
/// worth one stake and redeemable either by the owner revealing the secret
/// (see [`super::OpenTx`]) or by owner and co-player jointly (see
/// [`super::PayDepositTx`]).
#[derive(Clone, Debug)]
pub struct CommitTx {
    tx: Transaction,
    owner: usize,
    hash: CommitmentHash,
    terms: CommitTerms,
}

impl CommitTx {
    /// Build and sign the local player's CommitTx
    pub fn new(
        funding: &FundingOutput,
        sk: &PrivateKey,
        terms: &CommitTerms,
        position: usize,
        hash: CommitmentHash,
    ) -> Result<Self, TxError> {
        let pk = sk.public_key(&Secp256k1::new());
        if terms.pks.get(position) != Some(&pk) {
            return Err(TxError::Verification(format!(
                "secret key does not belong to player {}",
                position
            )));
        }
        let funding_script = p2pkh(&pk);
        if funding.txout.script_pubkey != funding_script {
            return Err(TxError::Script(
                "funding output is not a pay-to-pubkey-hash output of the committing key".to_string(),
            ));
        }
        let deposit = terms.deposit()?;
        if funding.txout.value != deposit {
            return Err(TxError::Amount(format!(
                "funding output holds {} but the deposit is {}",
                funding.txout.value, deposit
            )));
        }

        let output = terms
            .peers(position)
            .map(|k| {
                Ok(TxOut {
                    value: terms.stake,
                    script_pubkey: commit_output_script(
                        &pk,
                        &terms.pks[k],
                        &hash,
                        terms.min_length,
                        terms.no_players(),
                    )?,
                })
            })
            .collect::<Result<Vec<_>, TxError>>()?;

        let mut tx = Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: funding.outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output,
        };
        let sig = sign_input(&tx, 0, &funding_script, sk)?;
        tx.input[0].script_sig = push_bytes(Builder::new(), &sig.to_vec())?
            .push_key(&pk)
            .into_script();

        let checked = Self::check(&tx, terms, position)?;
        debug_assert_eq!(checked, hash);
        Ok(Self { tx, owner: position, hash, terms: terms.clone() })
    }

    /// Parse a CommitTx received from player `owner`
    pub fn from_raw(raw: &[u8], terms: &CommitTerms, owner: usize) -> Result<Self, TxError> {
        let tx = decode(raw)?;
        let hash = Self::check(&tx, terms, owner)?;
        Ok(Self { tx, owner, hash, terms: terms.clone() })
    }

    /// Validate a CommitTx of player `owner` and return its commitment hash
    fn check(tx: &Transaction, terms: &CommitTerms, owner: usize) -> Result<CommitmentHash, TxError> {
        let pk = terms
            .pks
            .get(owner)
            .ok_or_else(|| TxError::Verification(format!("no player at position {}", owner)))?;
        if tx.input.len() != 1 {
            return Err(TxError::Verification("commit must have exactly one input".to_string()));
        }
        if tx.lock_time != LockTime::ZERO {
            return Err(TxError::Verification("commit must not be time locked".to_string()));
        }

        let items = pushes(&tx.input[0].script_sig)?;
        match items.as_slice() {
            [sig, key] if PublicKey::from_slice(key).ok().as_ref() == Some(pk) => {
                verify_input(tx, 0, &p2pkh(pk), sig, pk)?;
            }
            _ => {
                return Err(TxError::Verification(format!(
                    "commit input is not signed by player {}",
                    owner
                )))
            }
        }

        if tx.output.len() != terms.no_players() - 1 {
            return Err(TxError::Verification(format!(
                "commit must have {} outputs",
                terms.no_players() - 1
            )));
        }
        let hash = CommitScript::parse(&tx.output[0].script_pubkey)?.hash;
        for (out, k) in tx.output.iter().zip(terms.peers(owner)) {
            if out.value != terms.stake {
                return Err(TxError::Amount(format!(
                    "commit output for player {} holds {} instead of {}",
                    k, out.value, terms.stake
                )));
            }
            let expected =
                commit_output_script(pk, &terms.pks[k], &hash, terms.min_length, terms.no_players())?;
            if out.script_pubkey != expected {
                return Err(TxError::Script(format!(
                    "commit output for player {} has an unexpected script",
                    k
                )));
            }
        }
        Ok(hash)
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    /// Position of the committing player
    pub fn owner(&self) -> usize {
        self.owner
    }

    pub fn owner_pk(&self) -> &PublicKey {
        &self.terms.pks[self.owner]
    }

    pub fn hash(&self) -> &CommitmentHash {
        &self.hash
    }

    pub fn terms(&self) -> &CommitTerms {
        &self.terms
    }

    /// Output reserved for `peer`, with its index
    pub(crate) fn output_for(&self, peer: usize) -> Option<(u32, &TxOut)> {
        let vout = self.terms.output_index(self.owner, peer)?;
        Some((vout as u32, &self.tx.output[vout]))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use bitcoin::consensus;

    #[test]
    fn test_commit_layout() {
        let secret = secret(MIN_LENGTH);
        let commit = commit(1, &secret);
        let tx = commit.transaction();

        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.output.len(), 2);
        assert!(tx.output.iter().all(|o| o.value == Amount::from_sat(STAKE_SAT)));
        assert_eq!(commit.hash(), &secret.commitment());
        assert_eq!(commit.owner_pk(), &public_key(2));
    }

    #[test]
    fn test_commit_roundtrip_revalidates() {
        let commit = commit(0, &secret(MIN_LENGTH + 1));
        let raw = consensus::serialize(commit.transaction());

        let parsed = CommitTx::from_raw(&raw, &terms(), 0).unwrap();
        assert_eq!(parsed.transaction(), commit.transaction());
        assert_eq!(parsed.hash(), commit.hash());
        assert_eq!(parsed.txid(), commit.txid());
    }

    #[test]
    fn test_commit_parsed_for_wrong_owner_fails() {
        let commit = commit(0, &secret(MIN_LENGTH));
        let raw = consensus::serialize(commit.transaction());

        assert!(matches!(
            CommitTx::from_raw(&raw, &terms(), 1),
            Err(TxError::Verification(_))
        ));
    }

    #[test]
    fn test_commit_with_other_min_length_fails() {
        let commit = commit(2, &secret(MIN_LENGTH));
        let raw = consensus::serialize(commit.transaction());
        let mut other = terms();
        other.min_length += 1;

        assert!(matches!(CommitTx::from_raw(&raw, &other, 2), Err(TxError::Script(_))));
    }

    #[test]
    fn test_commit_with_other_stake_fails() {
        let commit = commit(2, &secret(MIN_LENGTH));
        let raw = consensus::serialize(commit.transaction());
        let mut other = terms();
        other.stake = Amount::from_sat(STAKE_SAT + 1);

        assert!(matches!(CommitTx::from_raw(&raw, &other, 2), Err(TxError::Amount(_))));
    }

    #[test]
    fn test_tampered_commit_output_fails_signature() {
        let commit = commit(0, &secret(MIN_LENGTH));
        let mut tx = commit.transaction().clone();
        tx.output[1].value = Amount::from_sat(STAKE_SAT - 1);
        tx.output[0].value = Amount::from_sat(STAKE_SAT + 1);
        let raw = consensus::serialize(&tx);

        assert!(CommitTx::from_raw(&raw, &terms(), 0).is_err());
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        assert!(matches!(
            CommitTx::from_raw(&[0xde, 0xad], &terms(), 0),
            Err(TxError::Decode(_))
        ));
    }

    #[test]
    fn test_funding_with_wrong_value_rejected() {
        let terms = terms();
        let funding = funding(&terms.pks[0], Amount::from_sat(STAKE_SAT));
        let result = CommitTx::new(&funding, &private_key(1), &terms, 0, secret(8).commitment());

        assert!(matches!(result, Err(TxError::Amount(_))));
    }

    #[test]
    fn test_funding_of_other_key_is_a_script_error() {
        let terms = terms();
        let funding = funding(&terms.pks[1], terms.deposit().unwrap());
        let result = CommitTx::new(&funding, &private_key(1), &terms, 0, secret(8).commitment());

        assert!(matches!(result, Err(TxError::Script(_))));
    }

    #[test]
    fn test_output_index_skips_owner() {
        let terms = terms();
        assert_eq!(terms.output_index(1, 0), Some(0));
        assert_eq!(terms.output_index(1, 1), None);
        assert_eq!(terms.output_index(1, 2), Some(1));
        assert_eq!(terms.output_index(0, 3), None);
    }

    #[test]
    fn test_deposit_is_stake_per_peer() {
        assert_eq!(terms().deposit().unwrap(), Amount::from_sat(2 * STAKE_SAT));
    }
}
