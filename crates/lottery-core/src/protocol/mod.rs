//! Protocol phases and session types.

pub mod constants;
mod lottery;
mod types;

pub use lottery::{Committed, Exchange, Initialized, Lottery, LotteryError, Outcome, Setup};
pub use types::{deposit_expiry, round_start_time, Phase, Players, SessionId};
