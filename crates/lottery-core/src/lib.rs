//! Lottery Core Library
//!
//! Protocol engine for an N-party Bitcoin lottery in which no player has to
//! trust another:
//! - Commit-reveal primitives (Secret, CommitmentHash)
//! - Verifiers for every untrusted input
//! - Protocol transactions (CommitTx, OpenTx, PayDepositTx, ComputeTx)
//! - The phase state machine, driven through the IoHandler and Storage traits

pub mod crypto;
pub mod io;
pub mod protocol;
pub mod tx;
pub mod verify;

pub use crypto::{calc_hash, verify_reveal, CommitmentHash, Secret};
pub use io::{FileStorage, IoError, IoHandler, MemoryStorage, Query, ScriptedIo, Storage, StorageError};
pub use protocol::{Lottery, LotteryError, Outcome, Phase, Players, SessionId};
pub use tx::{Claim, CommitTerms, CommitTx, ComputeTx, FundingOutput, LotteryTx, OpenTx, PayDepositTx, TxError};
pub use verify::{Verifier, WrongInput};
