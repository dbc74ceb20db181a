//! Protocol transactions.
//!
//! Every transaction type can be built from its predecessor and parsed back
//! from raw bytes. Both paths run the same checks, since parsed transactions
//! come from untrusted peers.

mod commit;
mod compute;
mod open;
mod pay_deposit;
mod script;

pub use commit::{CommitTerms, CommitTx, FundingOutput};
pub use compute::ComputeTx;
pub use open::OpenTx;
pub use pay_deposit::{Claim, PayDepositTx};

use bitcoin::consensus;
use bitcoin::{Transaction, Txid};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from building or validating protocol transactions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("Wrong format of the transaction: {0}")]
    Decode(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Wrong amount: {0}")]
    Amount(String),
}

/// Decode a consensus-encoded transaction
pub(crate) fn decode(raw: &[u8]) -> Result<Transaction, TxError> {
    consensus::deserialize(raw).map_err(|e| TxError::Decode(e.to_string()))
}

/// Kind of protocol transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Commit,
    Open,
    PayDeposit,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::Commit => write!(f, "commit"),
            TxKind::Open => write!(f, "open"),
            TxKind::PayDeposit => write!(f, "pay_deposit"),
        }
    }
}

/// Any signed protocol transaction
#[derive(Clone, Debug)]
pub enum LotteryTx {
    Commit(CommitTx),
    Open(OpenTx),
    PayDeposit(PayDepositTx),
}

impl LotteryTx {
    pub fn kind(&self) -> TxKind {
        match self {
            LotteryTx::Commit(_) => TxKind::Commit,
            LotteryTx::Open(_) => TxKind::Open,
            LotteryTx::PayDeposit(_) => TxKind::PayDeposit,
        }
    }

    /// Get the underlying transaction
    pub fn transaction(&self) -> &Transaction {
        match self {
            LotteryTx::Commit(tx) => tx.transaction(),
            LotteryTx::Open(tx) => tx.transaction(),
            LotteryTx::PayDeposit(tx) => tx.transaction(),
        }
    }

    pub fn txid(&self) -> Txid {
        self.transaction().compute_txid()
    }

    /// Consensus encoding, ready for broadcasting
    pub fn to_raw(&self) -> Vec<u8> {
        consensus::serialize(self.transaction())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_raw())
    }

    /// Short name identifying the transaction within a session
    pub fn name(&self) -> String {
        match self {
            LotteryTx::Commit(tx) => format!("commit_{}", tx.owner()),
            LotteryTx::Open(tx) => format!("open_{}", tx.owner()),
            LotteryTx::PayDeposit(tx) => {
                format!("pay_deposit_{}_to_{}", tx.owner(), tx.recipient())
            }
        }
    }
}

impl From<CommitTx> for LotteryTx {
    fn from(tx: CommitTx) -> Self {
        LotteryTx::Commit(tx)
    }
}

impl From<OpenTx> for LotteryTx {
    fn from(tx: OpenTx) -> Self {
        LotteryTx::Open(tx)
    }
}

impl From<PayDepositTx> for LotteryTx {
    fn from(tx: PayDepositTx) -> Self {
        LotteryTx::PayDeposit(tx)
    }
}
