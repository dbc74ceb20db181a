//! Protocol transactions received from co-players.

use super::{Verifier, WrongInput};
use crate::crypto::{parse_hex_or_base58, CommitmentHash};
use crate::tx::{CommitTerms, CommitTx, LotteryTx, OpenTx, PayDepositTx, TxError};
use bitcoin::Amount;
use tracing::debug;

fn decode_raw(input: &str) -> Result<Vec<u8>, WrongInput> {
    parse_hex_or_base58(input)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| WrongInput::Format("Wrong format of the transaction.".to_string()))
}

/// Peer positions in ascending order, skipping `position`
fn nth_peer(no_players: usize, position: usize, n: usize) -> Option<usize> {
    (0..no_players).filter(|k| *k != position).nth(n)
}

/// What a raw transaction is expected to be, with everything needed to check it
#[derive(Clone, Copy, Debug)]
pub enum TxTemplate<'a> {
    Commit { terms: &'a CommitTerms, owner: usize },
    Open { commit: &'a CommitTx, fee: Amount },
    PayDeposit { commit: &'a CommitTx, recipient: usize, fee: Amount, timestamp: i64 },
}

impl TxTemplate<'_> {
    pub fn parse(&self, raw: &[u8]) -> Result<LotteryTx, TxError> {
        match *self {
            TxTemplate::Commit { terms, owner } => {
                CommitTx::from_raw(raw, terms, owner).map(LotteryTx::from)
            }
            TxTemplate::Open { commit, fee } => OpenTx::from_raw(raw, commit, fee).map(LotteryTx::from),
            TxTemplate::PayDeposit { commit, recipient, fee, timestamp } => {
                PayDepositTx::from_raw(raw, commit, recipient, fee, timestamp).map(LotteryTx::from)
            }
        }
    }
}

/// Decodes one transaction of the kind given by its template
#[derive(Clone, Debug)]
pub struct TxVerifier<'a> {
    template: TxTemplate<'a>,
}

impl<'a> TxVerifier<'a> {
    pub fn new(template: TxTemplate<'a>) -> Self {
        Self { template }
    }
}

impl Verifier for TxVerifier<'_> {
    type Output = LotteryTx;

    fn verify(&mut self, input: &str) -> Result<LotteryTx, WrongInput> {
        let raw = decode_raw(input)?;
        Ok(self.template.parse(&raw)?)
    }
}

/// Accepts the CommitTx of every co-player, in ascending position order.
/// Every player must commit to a hash nobody else committed to.
#[derive(Clone, Debug)]
pub struct OthersCommitsVerifier {
    terms: CommitTerms,
    position: usize,
    local: CommitmentHash,
    hashes: Vec<CommitmentHash>,
}

impl OthersCommitsVerifier {
    /// `local` is the commitment hash of the player at `position`
    pub fn new(terms: CommitTerms, position: usize, local: CommitmentHash) -> Self {
        Self { terms, position, local, hashes: Vec::new() }
    }

    /// Position of the player whose CommitTx is expected next
    pub fn next_owner(&self) -> Option<usize> {
        nth_peer(self.terms.no_players(), self.position, self.hashes.len())
    }

    pub fn is_complete(&self) -> bool {
        self.next_owner().is_none()
    }

    /// Commitment hashes of all players, the local one at the local position
    pub fn finish(self) -> Result<Vec<CommitmentHash>, WrongInput> {
        if !self.is_complete() {
            return Err(WrongInput::Sequence(format!(
                "Expected {} commit transactions, got {}.",
                self.terms.no_players() - 1,
                self.hashes.len()
            )));
        }
        let mut hashes = self.hashes;
        hashes.insert(self.position, self.local);
        Ok(hashes)
    }
}

impl Verifier for OthersCommitsVerifier {
    type Output = CommitTx;

    fn verify(&mut self, input: &str) -> Result<CommitTx, WrongInput> {
        let owner = self
            .next_owner()
            .ok_or_else(|| WrongInput::Sequence("Too many commit transactions.".to_string()))?;
        let raw = decode_raw(input)?;
        let commit = CommitTx::from_raw(&raw, &self.terms, owner)?;
        let hash = commit.hash();
        if *hash == self.local || self.hashes.contains(hash) {
            return Err(WrongInput::Mismatch(
                "The commitment hash is already used by another player.".to_string(),
            ));
        }
        debug!(owner, hash = %commit.hash(), "Commit accepted");
        self.hashes.push(*commit.hash());
        Ok(commit)
    }
}

/// Accepts the PayDepositTx every co-player pre-signed for the local player
#[derive(Clone, Debug)]
pub struct OthersPaysVerifier<'a> {
    commits: &'a [Option<CommitTx>],
    position: usize,
    fee: Amount,
    timestamp: i64,
    accepted: usize,
}

impl<'a> OthersPaysVerifier<'a> {
    /// `commits` holds every player's CommitTx except the local one, which is
    /// `None`
    pub fn new(commits: &'a [Option<CommitTx>], position: usize, fee: Amount, timestamp: i64) -> Self {
        Self { commits, position, fee, timestamp, accepted: 0 }
    }

    /// Position of the player whose PayDepositTx is expected next
    pub fn next_owner(&self) -> Option<usize> {
        nth_peer(self.commits.len(), self.position, self.accepted)
    }

    pub fn is_complete(&self) -> bool {
        self.next_owner().is_none()
    }
}

impl Verifier for OthersPaysVerifier<'_> {
    type Output = PayDepositTx;

    fn verify(&mut self, input: &str) -> Result<PayDepositTx, WrongInput> {
        let owner = self
            .next_owner()
            .ok_or_else(|| WrongInput::Sequence("Too many deposit transactions.".to_string()))?;
        let commit = self.commits[owner].as_ref().ok_or_else(|| {
            WrongInput::Sequence(format!("Commit transaction of player {} is missing.", owner))
        })?;
        let raw = decode_raw(input)?;
        let pay = PayDepositTx::from_raw(&raw, commit, self.position, self.fee, self.timestamp)?;
        debug!(owner, "Deposit transaction accepted");
        self.accepted += 1;
        Ok(pay)
    }
}
