//! Session identifiers, players and phases.

use super::constants::START_TIME_GRANULARITY_SECS;
use bitcoin::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of one lottery run; persisted artifacts are grouped by it
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The agreed, ordered list of players and the local player's place in it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Players {
    pks: Vec<PublicKey>,
    position: usize,
}

impl Players {
    pub fn new(pks: Vec<PublicKey>, position: usize) -> Self {
        Self { pks, position }
    }

    pub fn pks(&self) -> &[PublicKey] {
        &self.pks
    }

    /// Index of the local player
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn no_players(&self) -> usize {
        self.pks.len()
    }

    pub fn local_pk(&self) -> &PublicKey {
        &self.pks[self.position]
    }

    /// Positions of all co-players, ascending
    pub fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.pks.len()).filter(move |k| *k != self.position)
    }
}

/// Protocol phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Initialization,
    DepositAndCommitmentExchange,
    Execution,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initialization => "Initialization",
            Phase::DepositAndCommitmentExchange => "Deposit and commitment exchange",
            Phase::Execution => "Execution",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Round a unix timestamp down to the start-time granularity
pub fn round_start_time(timestamp: i64) -> i64 {
    timestamp - timestamp.rem_euclid(START_TIME_GRANULARITY_SECS)
}

/// Time from which unrevealed deposits can be claimed
pub fn deposit_expiry(start_time: i64, lock_time_minutes: i64) -> i64 {
    start_time + lock_time_minutes * 60
}
