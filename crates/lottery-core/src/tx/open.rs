//! OpenTx: the owner reclaims their deposit by revealing the secret.

use super::script::{instructions, p2pkh, push_bytes, sign_input, verify_input};
use super::{decode, CommitTx, TxError};
use crate::crypto::Secret;
use bitcoin::absolute::LockTime;
use bitcoin::opcodes::all::OP_PUSHNUM_1;
use bitcoin::script::{Builder, Instruction};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, PrivateKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

/// Transaction spending every output of a CommitTx through the reveal branch.
/// Broadcasting it publishes the owner's secret.
#[derive(Clone, Debug)]
pub struct OpenTx {
    tx: Transaction,
    owner: usize,
    secret: Secret,
}

impl OpenTx {
    /// Build and sign the OpenTx for our own CommitTx
    pub fn new(commit: &CommitTx, sk: &PrivateKey, secret: &Secret, fee: Amount) -> Result<Self, TxError> {
        let value = Self::payout(commit, fee)?;
        let txid = commit.txid();
        let input = (0..commit.transaction().output.len())
            .map(|vout| TxIn {
                previous_output: OutPoint { txid, vout: vout as u32 },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect();
        let mut tx = Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input,
            output: vec![TxOut { value, script_pubkey: p2pkh(commit.owner_pk()) }],
        };

        let sigs = commit
            .transaction()
            .output
            .iter()
            .enumerate()
            .map(|(i, out)| sign_input(&tx, i, &out.script_pubkey, sk))
            .collect::<Result<Vec<_>, _>>()?;
        for (txin, sig) in tx.input.iter_mut().zip(sigs) {
            let builder = push_bytes(Builder::new(), &sig.to_vec())?;
            txin.script_sig = push_bytes(builder, secret.as_bytes())?
                .push_opcode(OP_PUSHNUM_1)
                .into_script();
        }

        Self::check(&tx, commit, fee)?;
        Ok(Self { tx, owner: commit.owner(), secret: secret.clone() })
    }

    /// Parse the OpenTx of `commit`'s owner
    pub fn from_raw(raw: &[u8], commit: &CommitTx, fee: Amount) -> Result<Self, TxError> {
        let tx = decode(raw)?;
        let secret = Self::check(&tx, commit, fee)?;
        Ok(Self { tx, owner: commit.owner(), secret })
    }

    fn payout(commit: &CommitTx, fee: Amount) -> Result<Amount, TxError> {
        commit
            .terms()
            .deposit()?
            .checked_sub(fee)
            .ok_or_else(|| TxError::Amount("fee exceeds the deposit".to_string()))
    }

    /// Validate an OpenTx against its CommitTx and return the revealed secret
    fn check(tx: &Transaction, commit: &CommitTx, fee: Amount) -> Result<Secret, TxError> {
        let outputs = &commit.transaction().output;
        if tx.input.len() != outputs.len() {
            return Err(TxError::Verification(format!(
                "open must spend all {} commit outputs",
                outputs.len()
            )));
        }

        let terms = commit.terms();
        let mut revealed: Option<&[u8]> = None;
        for (i, (txin, out)) in tx.input.iter().zip(outputs).enumerate() {
            let expected = OutPoint { txid: commit.txid(), vout: i as u32 };
            if txin.previous_output != expected {
                return Err(TxError::Verification(format!(
                    "input {} does not spend commit output {}",
                    i, i
                )));
            }
            let items = instructions(&txin.script_sig)?;
            let (sig, secret) = match items.as_slice() {
                [Instruction::PushBytes(sig), Instruction::PushBytes(secret), Instruction::Op(op)]
                    if *op == OP_PUSHNUM_1 =>
                {
                    (sig.as_bytes(), secret.as_bytes())
                }
                _ => {
                    return Err(TxError::Script(format!(
                        "input {} does not take the reveal branch",
                        i
                    )))
                }
            };
            match revealed {
                Some(first) if first != secret => {
                    return Err(TxError::Verification("inputs reveal different secrets".to_string()))
                }
                _ => revealed = Some(secret),
            }
            verify_input(tx, i, &out.script_pubkey, sig, commit.owner_pk())?;
        }

        let secret = Secret::from_bytes(revealed.unwrap_or_default().to_vec());
        let max_length = terms.min_length + terms.no_players();
        if secret.len() < terms.min_length || secret.len() >= max_length {
            return Err(TxError::Verification(format!(
                "revealed secret has length {} outside [{}, {})",
                secret.len(),
                terms.min_length,
                max_length
            )));
        }
        if !commit.hash().verify(&secret) {
            return Err(TxError::Verification("revealed secret does not match the commitment".to_string()));
        }

        let payout = Self::payout(commit, fee)?;
        match tx.output.as_slice() {
            [out] if out.script_pubkey == p2pkh(commit.owner_pk()) && out.value == payout => Ok(secret),
            _ => Err(TxError::Verification(format!(
                "open must pay {} back to player {}",
                payout,
                commit.owner()
            ))),
        }
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn owner(&self) -> usize {
        self.owner
    }

    /// The revealed secret
    pub fn secret(&self) -> &Secret {
        &self.secret
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use bitcoin::consensus;

    fn fee() -> Amount {
        Amount::from_sat(FEE_SAT)
    }

    #[test]
    fn test_open_reveals_secret() {
        let secret = secret(MIN_LENGTH + 2);
        let commit = commit(1, &secret);
        let open = OpenTx::new(&commit, &private_key(2), &secret, fee()).unwrap();

        assert_eq!(open.secret(), &secret);
        assert_eq!(open.transaction().input.len(), 2);
        assert_eq!(
            open.transaction().output[0].value,
            Amount::from_sat(2 * STAKE_SAT - FEE_SAT)
        );
    }

    #[test]
    fn test_open_passes_script_verification() {
        let secret = secret(MIN_LENGTH + 1);
        let commit = commit(2, &secret);
        let open = OpenTx::new(&commit, &private_key(3), &secret, fee()).unwrap();
        let txid = commit.txid();
        let outputs = &commit.transaction().output;

        open.transaction()
            .verify(|outpoint| {
                (outpoint.txid == txid)
                    .then(|| outputs.get(outpoint.vout as usize).cloned())
                    .flatten()
            })
            .unwrap();
    }

    #[test]
    fn test_open_roundtrip() {
        let secret = secret(MIN_LENGTH);
        let commit = commit(0, &secret);
        let open = OpenTx::new(&commit, &private_key(1), &secret, fee()).unwrap();
        let raw = consensus::serialize(open.transaction());

        let parsed = OpenTx::from_raw(&raw, &commit, fee()).unwrap();
        assert_eq!(parsed.secret(), &secret);
        assert_eq!(parsed.owner(), 0);
    }

    #[test]
    fn test_open_with_wrong_secret_fails() {
        let secret = secret(MIN_LENGTH);
        let commit = commit(0, &secret);
        let wrong = Secret::from_bytes(vec![0xff; MIN_LENGTH]);

        assert!(matches!(
            OpenTx::new(&commit, &private_key(1), &wrong, fee()),
            Err(TxError::Verification(_))
        ));
    }

    #[test]
    fn test_open_with_secret_too_long_fails() {
        // Hash matches, but the length is outside the committed range
        let long = secret(MIN_LENGTH + 3);
        let commit = commit(0, &long);

        assert!(OpenTx::new(&commit, &private_key(1), &long, fee()).is_err());
    }

    #[test]
    fn test_open_of_other_commit_fails() {
        let secret_a = secret(MIN_LENGTH);
        let commit_a = commit(0, &secret_a);
        let commit_b = commit(1, &secret(MIN_LENGTH + 1));
        let open = OpenTx::new(&commit_a, &private_key(1), &secret_a, fee()).unwrap();
        let raw = consensus::serialize(open.transaction());

        assert!(OpenTx::from_raw(&raw, &commit_b, fee()).is_err());
    }

    #[test]
    fn test_open_signed_by_other_key_fails() {
        let secret = secret(MIN_LENGTH);
        let commit = commit(0, &secret);

        assert!(matches!(
            OpenTx::new(&commit, &private_key(2), &secret, fee()),
            Err(TxError::Verification(_))
        ));
    }

    #[test]
    fn test_open_with_different_fee_fails() {
        let secret = secret(MIN_LENGTH);
        let commit = commit(0, &secret);
        let open = OpenTx::new(&commit, &private_key(1), &secret, fee()).unwrap();
        let raw = consensus::serialize(open.transaction());

        assert!(OpenTx::from_raw(&raw, &commit, Amount::from_sat(FEE_SAT * 2)).is_err());
    }
}
