//! In-memory doubles for the operator channel and storage.

use super::layout;
use super::traits::{IoError, IoHandler, Query, Storage, StorageError};
use crate::crypto::{CommitmentHash, Secret};
use crate::protocol::{Phase, SessionId};
use crate::tx::{CommitTx, FundingOutput, LotteryTx, OpenTx, PayDepositTx};
use crate::verify::{Verifier, WrongInput};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Replays prepared input lines and records everything shown or rejected
#[derive(Clone, Debug, Default)]
pub struct ScriptedIo {
    lines: VecDeque<String>,
    rejections: Vec<(Query, WrongInput)>,
    phases: Vec<Phase>,
    shown: Vec<String>,
    winner: Option<usize>,
}

impl ScriptedIo {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { lines: lines.into_iter().map(Into::into).collect(), ..Default::default() }
    }

    /// Queue more input
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
    }

    /// Lines not consumed yet
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }

    /// Every rejected input, with the query it answered
    pub fn rejections(&self) -> &[(Query, WrongInput)] {
        &self.rejections
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Messages passed to the display methods, in order
    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }
}

impl IoHandler for ScriptedIo {
    fn ask<V: Verifier>(&mut self, query: &Query, verifier: &mut V) -> Result<V::Output, IoError> {
        loop {
            let line = self
                .lines
                .pop_front()
                .ok_or_else(|| IoError::Closed(query.to_string()))?;
            match verifier.verify(&query.fill_default(line)) {
                Ok(value) => return Ok(value),
                Err(rejection) => {
                    debug!(%query, %rejection, "Scripted input rejected");
                    self.rejections.push((query.clone(), rejection));
                }
            }
        }
    }

    fn show_phase(&mut self, phase: Phase) -> Result<(), IoError> {
        self.phases.push(phase);
        Ok(())
    }

    fn show_secret(&mut self, secret: &Secret, path: &Path) -> Result<(), IoError> {
        self.shown.push(format!("secret {} saved to {}", secret, path.display()));
        Ok(())
    }

    fn show_hash(&mut self, hash: &CommitmentHash) -> Result<(), IoError> {
        self.shown.push(format!("hash {}", hash));
        Ok(())
    }

    fn show_funding_output(&mut self, funding: &FundingOutput) -> Result<(), IoError> {
        self.shown.push(format!("funding {}", funding.outpoint));
        Ok(())
    }

    fn show_commitment_scheme(
        &mut self,
        commit: &CommitTx,
        _open: &OpenTx,
        pays: &[PayDepositTx],
        path: &Path,
    ) -> Result<(), IoError> {
        self.shown.push(format!(
            "commit {} with {} deposits saved to {}",
            commit.txid(),
            pays.len(),
            path.display()
        ));
        Ok(())
    }

    fn show_end_of_commitment_phase(&mut self, expiry: i64, path: &Path) -> Result<(), IoError> {
        self.shown.push(format!("deposits expire at {}, saved to {}", expiry, path.display()));
        Ok(())
    }

    fn show_winner(&mut self, winner: usize, position: usize) -> Result<(), IoError> {
        self.shown.push(format!("winner {} (we are {})", winner, position));
        self.winner = Some(winner);
        Ok(())
    }
}

/// Keeps the would-be file contents in memory, keyed by their path
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content saved for `file` in `session`
    pub fn get(&self, session: SessionId, file: &str) -> Option<&str> {
        self.files.get(&Self::path(session, file)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn path(session: SessionId, file: &str) -> PathBuf {
        Path::new(&session.to_string()).join(file)
    }

    fn put(&mut self, session: SessionId, file: &str, content: String) -> PathBuf {
        let path = Self::path(session, file);
        self.files.insert(path.clone(), content);
        path
    }
}

impl Storage for MemoryStorage {
    fn save_secret(&mut self, session: SessionId, secret: &Secret) -> Result<PathBuf, StorageError> {
        Ok(self.put(session, layout::SECRET, secret.to_string()))
    }

    fn save_transaction(&mut self, session: SessionId, tx: &LotteryTx) -> Result<PathBuf, StorageError> {
        Ok(self.put(session, &layout::transaction(tx), tx.to_hex()))
    }

    fn save_transactions(
        &mut self,
        session: SessionId,
        name: &str,
        txs: &[Option<LotteryTx>],
    ) -> Result<PathBuf, StorageError> {
        let content = super::hex_lines(txs.iter().map(super::slot_hex));
        Ok(self.put(session, &layout::collection(name), content))
    }

    fn save_secrets(&mut self, session: SessionId, secrets: &[Secret]) -> Result<PathBuf, StorageError> {
        let content = super::hex_lines(secrets.iter().map(Secret::to_string));
        Ok(self.put(session, layout::REVEALED_SECRETS, content))
    }
}
