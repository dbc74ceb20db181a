//! Bounded integers: player count, lock time, secret length, start time.

use super::{Verifier, WrongInput};
use crate::protocol::constants::{
    LOCK_TIME_THRESHOLD, MAX_LOCK_TIME_MINUTES, MAX_MIN_LENGTH, MAX_PLAYERS, MIN_LOCK_TIME_MINUTES,
    MIN_PLAYERS,
};

/// Parses an integer and checks it lies in `[min, max]`
#[derive(Clone, Debug)]
pub struct NumberVerifier {
    label: &'static str,
    min: i64,
    max: i64,
}

impl NumberVerifier {
    pub fn new(label: &'static str, min: i64, max: i64) -> Self {
        Self { label, min, max }
    }

    /// Minutes between the protocol start and the deposit expiry
    pub fn lock_time() -> Self {
        Self::new("lock time", MIN_LOCK_TIME_MINUTES, MAX_LOCK_TIME_MINUTES)
    }

    /// Unix time of the protocol start; must be read as a timestamp, not a
    /// block height, when used as a lock time
    pub fn start_time() -> Self {
        Self::new(
            "start time",
            LOCK_TIME_THRESHOLD,
            i64::from(u32::MAX) - MAX_LOCK_TIME_MINUTES * 60,
        )
    }

    pub fn min_length() -> Self {
        Self::new("min length", 0, MAX_MIN_LENGTH)
    }

    pub fn no_players() -> Self {
        Self::new("number of players", MIN_PLAYERS, MAX_PLAYERS)
    }
}

impl Verifier for NumberVerifier {
    type Output = i64;

    fn verify(&mut self, input: &str) -> Result<i64, WrongInput> {
        let value: i64 = input
            .trim()
            .parse()
            .map_err(|_| WrongInput::Format(format!("Wrong format of the {}.", self.label)))?;
        if value < self.min {
            return Err(WrongInput::Value(format!(
                "The {} has to be not smaller than {}.",
                self.label, self.min
            )));
        }
        if value > self.max {
            return Err(WrongInput::Value(format!(
                "The {} has to be not greater than {}.",
                self.label, self.max
            )));
        }
        Ok(value)
    }
}
