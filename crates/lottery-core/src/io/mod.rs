//! Operator interaction and persistence.

mod file;
mod mock;
mod traits;

pub use file::FileStorage;
pub use mock::{MemoryStorage, ScriptedIo};
pub use traits::{IoError, IoHandler, Query, Storage, StorageError};

use crate::tx::LotteryTx;

/// File names shared by every [`Storage`] implementation
pub mod layout {
    use super::LotteryTx;

    pub const SECRET: &str = "secret.hex";
    pub const REVEALED_SECRETS: &str = "revealed_secrets.txt";
    pub const MANIFEST: &str = "manifest.json";

    /// Deposit transactions the local player signed for co-players
    pub const OWN_PAY_DEPOSITS: &str = "own_pay_deposits";
    pub const OTHERS_COMMITS: &str = "others_commits";
    /// Deposit transactions co-players signed for the local player
    pub const OTHERS_PAY_DEPOSITS: &str = "others_pay_deposits";

    pub fn transaction(tx: &LotteryTx) -> String {
        format!("{}.hex", tx.name())
    }

    pub fn collection(name: &str) -> String {
        format!("{}.txt", name)
    }
}

/// One hex-encoded transaction per line
pub(crate) fn slot_hex(tx: &Option<LotteryTx>) -> String {
    tx.as_ref().map(LotteryTx::to_hex).unwrap_or_default()
}

pub(crate) fn hex_lines(items: impl IntoIterator<Item = String>) -> String {
    let mut out = String::new();
    for item in items {
        out.push_str(&item);
        out.push('\n');
    }
    out
}
