//! I/O and storage trait definitions.

use crate::crypto::{CommitmentHash, Secret};
use crate::protocol::{Phase, SessionId};
use crate::tx::{CommitTx, FundingOutput, LotteryTx, OpenTx, PayDepositTx};
use crate::verify::{
    AmountVerifier, NewSecretVerifier, NumberVerifier, OthersCommitsVerifier, OthersPaysVerifier,
    PkListVerifier, SecretListVerifier, SkVerifier, TxOutputVerifier, Verifier,
};
use bitcoin::amount::Denomination;
use bitcoin::{Amount, PrivateKey, PublicKey};
use rand::{CryptoRng, RngCore};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the operator channel. Not recoverable by asking again.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("Input closed while waiting for {0}")]
    Closed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from persisting session artifacts
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A single value asked from the operator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    SecretKey,
    NoPlayers,
    PublicKey { index: usize },
    Stake,
    Fee,
    LockTime,
    MinLength,
    Secret,
    Output { value: Amount },
    StartTime { suggested: i64 },
    Commit { owner: usize },
    PayDeposit { owner: usize },
    Reveal { owner: usize },
}

impl Query {
    /// Value used when the operator enters an empty line
    pub fn default_input(&self) -> Option<String> {
        match self {
            Query::StartTime { suggested } => Some(suggested.to_string()),
            _ => None,
        }
    }

    /// Replace an empty line by the default input, if there is one
    pub fn fill_default(&self, line: String) -> String {
        if line.trim().is_empty() {
            self.default_input().unwrap_or(line)
        } else {
            line
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::SecretKey => write!(f, "your secret key (WIF)"),
            Query::NoPlayers => write!(f, "the number of players"),
            Query::PublicKey { index } => write!(f, "the public key of player {}", index),
            Query::Stake => write!(f, "the stake (BTC)"),
            Query::Fee => write!(f, "the fee (BTC)"),
            Query::LockTime => write!(f, "the lock time (minutes)"),
            Query::MinLength => write!(f, "the minimal secret length (bytes)"),
            Query::Secret => write!(f, "your secret (hex, empty to draw one)"),
            Query::Output { value } => write!(
                f,
                "a transaction with an output of {} to your key",
                value.display_in(Denomination::Bitcoin).show_denomination()
            ),
            Query::StartTime { suggested } => {
                write!(f, "the protocol start time (unix, empty for {})", suggested)
            }
            Query::Commit { owner } => write!(f, "the commit transaction of player {}", owner),
            Query::PayDeposit { owner } => {
                write!(f, "the deposit transaction player {} signed for you", owner)
            }
            Query::Reveal { owner } => write!(f, "the revealed secret of player {}", owner),
        }
    }
}

/// Channel to the operator.
///
/// [`IoHandler::ask`] must keep asking until the verifier accepts; the
/// per-input methods only pick the query and drive the sequential verifiers.
pub trait IoHandler {
    fn ask<V: Verifier>(&mut self, query: &Query, verifier: &mut V) -> Result<V::Output, IoError>;

    fn ask_sk(&mut self, mut verifier: SkVerifier) -> Result<PrivateKey, IoError> {
        self.ask(&Query::SecretKey, &mut verifier)
    }

    fn ask_no_players(&mut self, mut verifier: NumberVerifier) -> Result<i64, IoError> {
        self.ask(&Query::NoPlayers, &mut verifier)
    }

    fn ask_pks(&mut self, verifier: &mut PkListVerifier) -> Result<Vec<PublicKey>, IoError> {
        let mut pks = Vec::new();
        while !verifier.is_complete() {
            pks.push(self.ask(&Query::PublicKey { index: pks.len() }, verifier)?);
        }
        Ok(pks)
    }

    fn ask_stake(&mut self, mut verifier: AmountVerifier) -> Result<Amount, IoError> {
        self.ask(&Query::Stake, &mut verifier)
    }

    fn ask_fee(&mut self, mut verifier: AmountVerifier) -> Result<Amount, IoError> {
        self.ask(&Query::Fee, &mut verifier)
    }

    fn ask_lock_time(&mut self, mut verifier: NumberVerifier) -> Result<i64, IoError> {
        self.ask(&Query::LockTime, &mut verifier)
    }

    fn ask_min_length(&mut self, mut verifier: NumberVerifier) -> Result<i64, IoError> {
        self.ask(&Query::MinLength, &mut verifier)
    }

    fn ask_secret<R: RngCore + CryptoRng>(
        &mut self,
        mut verifier: NewSecretVerifier<'_, R>,
    ) -> Result<Secret, IoError> {
        self.ask(&Query::Secret, &mut verifier)
    }

    fn ask_output(
        &mut self,
        value: Amount,
        verifier: &mut TxOutputVerifier,
    ) -> Result<FundingOutput, IoError> {
        self.ask(&Query::Output { value }, verifier)
    }

    fn ask_start_time(&mut self, suggested: i64, mut verifier: NumberVerifier) -> Result<i64, IoError> {
        self.ask(&Query::StartTime { suggested }, &mut verifier)
    }

    fn ask_others_commits(
        &mut self,
        verifier: &mut OthersCommitsVerifier,
    ) -> Result<Vec<CommitTx>, IoError> {
        let mut commits = Vec::new();
        while let Some(owner) = verifier.next_owner() {
            commits.push(self.ask(&Query::Commit { owner }, verifier)?);
        }
        Ok(commits)
    }

    fn ask_others_pay_deposits(
        &mut self,
        verifier: &mut OthersPaysVerifier<'_>,
    ) -> Result<Vec<PayDepositTx>, IoError> {
        let mut pays = Vec::new();
        while let Some(owner) = verifier.next_owner() {
            pays.push(self.ask(&Query::PayDeposit { owner }, verifier)?);
        }
        Ok(pays)
    }

    fn ask_secrets(&mut self, verifier: &mut SecretListVerifier) -> Result<Vec<Secret>, IoError> {
        let mut secrets = Vec::new();
        while !verifier.is_complete() {
            secrets.push(self.ask(&Query::Reveal { owner: verifier.accepted() }, verifier)?);
        }
        Ok(secrets)
    }

    fn show_phase(&mut self, phase: Phase) -> Result<(), IoError>;

    fn show_secret(&mut self, secret: &Secret, path: &Path) -> Result<(), IoError>;

    fn show_hash(&mut self, hash: &CommitmentHash) -> Result<(), IoError>;

    fn show_funding_output(&mut self, funding: &FundingOutput) -> Result<(), IoError>;

    /// Present the transactions the operator has to hand to the co-players
    fn show_commitment_scheme(
        &mut self,
        commit: &CommitTx,
        open: &OpenTx,
        pays: &[PayDepositTx],
        path: &Path,
    ) -> Result<(), IoError>;

    /// `expiry` is the unix time from which unrevealed deposits can be claimed
    fn show_end_of_commitment_phase(&mut self, expiry: i64, path: &Path) -> Result<(), IoError>;

    fn show_winner(&mut self, winner: usize, position: usize) -> Result<(), IoError>;
}

/// Persistence of session artifacts. Every method returns where the data went.
pub trait Storage {
    fn save_secret(&mut self, session: SessionId, secret: &Secret) -> Result<PathBuf, StorageError>;

    fn save_transaction(&mut self, session: SessionId, tx: &LotteryTx) -> Result<PathBuf, StorageError>;

    /// Save a named collection of transactions indexed by player position.
    /// An absent slot is written as an empty line.
    fn save_transactions(
        &mut self,
        session: SessionId,
        name: &str,
        txs: &[Option<LotteryTx>],
    ) -> Result<PathBuf, StorageError>;

    fn save_secrets(&mut self, session: SessionId, secrets: &[Secret]) -> Result<PathBuf, StorageError>;
}
