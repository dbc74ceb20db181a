//! PayDepositTx: forfeits one stake of a player who does not reveal in time.

use super::script::{p2pkh, push_bytes, pushes, sign_input, verify_input, CommitScript};
use super::{decode, CommitTx, TxError};
use bitcoin::absolute::LockTime;
use bitcoin::script::Builder;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, OutPoint, PrivateKey, PublicKey, Script, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Witness,
};
use secp256k1::Secp256k1;

/// Deposit-penalty transaction.
///
/// Pre-signed by the owner of a CommitTx and handed to the co-player
/// `recipient`. It spends the commit output reserved for the recipient
/// through the two-signature branch and is time locked until the deposit
/// expiry, so the recipient can only complete and broadcast it if the owner
/// never revealed the secret.
#[derive(Clone, Debug)]
pub struct PayDepositTx {
    tx: Transaction,
    owner: usize,
    recipient: usize,
    lock_time: LockTime,
}

/// A deposit-penalty transaction completed by its recipient
#[derive(Clone, Debug)]
pub struct Claim {
    pub tx: Transaction,
    /// Earliest time the transaction can be mined
    pub lock_time: LockTime,
    pub value: Amount,
}

fn expiry(timestamp: i64) -> Result<LockTime, TxError> {
    u32::try_from(timestamp)
        .ok()
        .and_then(|t| LockTime::from_time(t).ok())
        .ok_or_else(|| TxError::Verification(format!("{} is not a valid lock timestamp", timestamp)))
}

/// Input script of the two-signature branch; an empty slot stands for a
/// signature not yet added
fn multisig_script_sig(owner_sig: &[u8], recipient_sig: &[u8]) -> Result<ScriptBuf, TxError> {
    let builder = push_bytes(Builder::new(), &[])?;
    let builder = push_bytes(builder, owner_sig)?;
    let builder = push_bytes(builder, recipient_sig)?;
    Ok(push_bytes(builder, &[])?.into_script())
}

/// Split the input script into (owner signature, recipient signature)
fn multisig_signatures(script_sig: &Script) -> Result<(Vec<u8>, Vec<u8>), TxError> {
    match pushes(script_sig)?.as_slice() {
        [dummy, owner, recipient, branch] if dummy.is_empty() && branch.is_empty() => {
            Ok((owner.to_vec(), recipient.to_vec()))
        }
        _ => Err(TxError::Script("input does not take the deposit branch".to_string())),
    }
}

impl PayDepositTx {
    /// Build the owner's half-signed deposit-penalty transaction for `recipient`
    pub fn new(
        commit: &CommitTx,
        recipient: usize,
        sk: &PrivateKey,
        fee: Amount,
        timestamp: i64,
    ) -> Result<Self, TxError> {
        let (vout, out) = commit.output_for(recipient).ok_or_else(|| {
            TxError::Verification(format!("player {} has no deposit in this commit", recipient))
        })?;
        let lock_time = expiry(timestamp)?;
        let value = Self::payout(commit, fee)?;
        let mut tx = Transaction {
            version: Version::ONE,
            lock_time,
            input: vec![TxIn {
                previous_output: OutPoint { txid: commit.txid(), vout },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_LOCKTIME_NO_RBF,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value,
                script_pubkey: p2pkh(&commit.terms().pks[recipient]),
            }],
        };
        let sig = sign_input(&tx, 0, &out.script_pubkey, sk)?;
        tx.input[0].script_sig = multisig_script_sig(&sig.to_vec(), &[])?;

        Self::check(&tx, commit, recipient, fee, timestamp)?;
        Ok(Self { tx, owner: commit.owner(), recipient, lock_time })
    }

    /// Parse a deposit-penalty transaction spending `commit`'s output for
    /// `recipient`
    pub fn from_raw(
        raw: &[u8],
        commit: &CommitTx,
        recipient: usize,
        fee: Amount,
        timestamp: i64,
    ) -> Result<Self, TxError> {
        let tx = decode(raw)?;
        let lock_time = Self::check(&tx, commit, recipient, fee, timestamp)?;
        Ok(Self { tx, owner: commit.owner(), recipient, lock_time })
    }

    fn payout(commit: &CommitTx, fee: Amount) -> Result<Amount, TxError> {
        commit
            .terms()
            .stake
            .checked_sub(fee)
            .ok_or_else(|| TxError::Amount("fee exceeds the stake".to_string()))
    }

    fn check(
        tx: &Transaction,
        commit: &CommitTx,
        recipient: usize,
        fee: Amount,
        timestamp: i64,
    ) -> Result<LockTime, TxError> {
        let (vout, out) = commit.output_for(recipient).ok_or_else(|| {
            TxError::Verification(format!("player {} has no deposit in this commit", recipient))
        })?;
        let lock_time = expiry(timestamp)?;
        if tx.lock_time != lock_time {
            return Err(TxError::Verification(format!(
                "deposit must be locked until {}",
                timestamp
            )));
        }
        let txin = match tx.input.as_slice() {
            [txin] => txin,
            _ => return Err(TxError::Verification("deposit must have exactly one input".to_string())),
        };
        if txin.previous_output != (OutPoint { txid: commit.txid(), vout }) {
            return Err(TxError::Verification(format!(
                "deposit does not spend the commit output of player {}",
                recipient
            )));
        }
        if txin.sequence == Sequence::MAX {
            return Err(TxError::Verification("deposit input disables the lock time".to_string()));
        }

        let payout = Self::payout(commit, fee)?;
        let recipient_pk = &commit.terms().pks[recipient];
        match tx.output.as_slice() {
            [paid] if paid.script_pubkey == p2pkh(recipient_pk) && paid.value == payout => {}
            _ => {
                return Err(TxError::Verification(format!(
                    "deposit must pay {} to player {}",
                    payout, recipient
                )))
            }
        }

        let (owner_sig, recipient_sig) = multisig_signatures(&txin.script_sig)?;
        verify_input(tx, 0, &out.script_pubkey, &owner_sig, commit.owner_pk())?;
        if !recipient_sig.is_empty() {
            verify_input(tx, 0, &out.script_pubkey, &recipient_sig, recipient_pk)?;
        }
        Ok(lock_time)
    }

    /// Complete a deposit-penalty transaction received from a co-player.
    ///
    /// `commit_tx` is the co-player's CommitTx whose output is spent. The
    /// output script must name the key of `sk` as counterparty and the owner's
    /// signature must be valid before ours is added.
    pub fn claim(raw: &[u8], commit_tx: &Transaction, sk: &PrivateKey) -> Result<Claim, TxError> {
        let mut tx = decode(raw)?;
        let pk = sk.public_key(&Secp256k1::new());
        let previous_output = match tx.input.as_slice() {
            [txin] => txin.previous_output,
            _ => return Err(TxError::Verification("deposit must have exactly one input".to_string())),
        };
        if previous_output.txid != commit_tx.compute_txid() {
            return Err(TxError::Verification("deposit does not spend the given commit".to_string()));
        }
        let out = commit_tx
            .output
            .get(previous_output.vout as usize)
            .ok_or_else(|| TxError::Verification("spent output does not exist".to_string()))?;
        let script = CommitScript::parse(&out.script_pubkey)?;
        if script.peer != pk {
            return Err(TxError::Verification("deposit is not addressed to the given key".to_string()));
        }
        let value = match tx.output.as_slice() {
            [paid] if paid.script_pubkey == p2pkh(&pk) => paid.value,
            _ => return Err(TxError::Verification("deposit does not pay to the given key".to_string())),
        };

        let (owner_sig, _) = multisig_signatures(&tx.input[0].script_sig)?;
        verify_input(&tx, 0, &out.script_pubkey, &owner_sig, &script.owner)?;
        let sig = sign_input(&tx, 0, &out.script_pubkey, sk)?;
        tx.input[0].script_sig = multisig_script_sig(&owner_sig, &sig.to_vec())?;

        Ok(Claim { lock_time: tx.lock_time, value, tx })
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn owner(&self) -> usize {
        self.owner
    }

    pub fn recipient(&self) -> usize {
        self.recipient
    }

    pub fn lock_time(&self) -> LockTime {
        self.lock_time
    }

    pub fn recipient_pk<'a>(&self, commit: &'a CommitTx) -> &'a PublicKey {
        &commit.terms().pks[self.recipient]
    }
}
