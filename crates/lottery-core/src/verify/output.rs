//! Funding output lookup in a previous transaction.

use super::{Verifier, WrongInput};
use crate::crypto::parse_hex_or_base58;
use crate::tx::FundingOutput;
use bitcoin::{consensus, Amount, OutPoint, PubkeyHash, ScriptBuf, Transaction};
use tracing::debug;

/// Finds, in a raw previous transaction, the first P2PKH output of exactly
/// `value` paying to the local key
#[derive(Clone, Debug)]
pub struct TxOutputVerifier {
    pubkey_hash: PubkeyHash,
    value: Amount,
    out_nr: Option<u32>,
}

impl TxOutputVerifier {
    pub fn new(pubkey_hash: PubkeyHash, value: Amount) -> Self {
        Self { pubkey_hash, value, out_nr: None }
    }

    /// Index of the output found by the last accepted input
    pub fn out_nr(&self) -> Option<u32> {
        self.out_nr
    }
}

impl Verifier for TxOutputVerifier {
    type Output = FundingOutput;

    fn verify(&mut self, input: &str) -> Result<FundingOutput, WrongInput> {
        let tx: Transaction = parse_hex_or_base58(input)
            .and_then(|raw| consensus::deserialize(&raw).ok())
            .ok_or_else(|| WrongInput::Format("Wrong format of the transaction.".to_string()))?;
        let script = ScriptBuf::new_p2pkh(&self.pubkey_hash);
        let (vout, txout) = tx
            .output
            .iter()
            .enumerate()
            .find(|(_, out)| out.value == self.value && out.script_pubkey == script)
            .ok_or_else(|| {
                WrongInput::Mismatch(
                    "No output available of the expected value for the given secret key."
                        .to_string(),
                )
            })?;
        let vout = vout as u32;
        debug!(txid = %tx.compute_txid(), vout, "Funding output found");
        self.out_nr = Some(vout);
        Ok(FundingOutput {
            outpoint: OutPoint { txid: tx.compute_txid(), vout },
            txout: txout.clone(),
        })
    }
}
