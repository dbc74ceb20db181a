//! The one-shot commands: key generation and deposit claims.

use crate::console::format_time;
use bitcoin::absolute::LockTime;
use bitcoin::amount::Denomination;
use bitcoin::{consensus, Address, Network, PrivateKey, PublicKey, Transaction};
use lottery_core::crypto::parse_hex_or_base58;
use lottery_core::io::{IoError, IoHandler};
use lottery_core::verify::{SkVerifier, WrongInput};
use lottery_core::{Claim, LotteryError, PayDepositTx, TxError};
use rand::{CryptoRng, RngCore};
use secp256k1::{Secp256k1, SecretKey};
use std::fmt;
use thiserror::Error;

/// Errors that end a command
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Lottery(#[from] LotteryError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TxError),

    #[error("{0}")]
    Input(#[from] WrongInput),
}

/// A fresh key with everything needed to fund it and share it
pub struct KeyBundle {
    pub sk: PrivateKey,
    pub pk: PublicKey,
    pub address: Address,
}

impl fmt::Display for KeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Secret key (WIF): {}", self.sk.to_wif())?;
        writeln!(f, "Public key:       {}", self.pk)?;
        write!(f, "Address:          {}", self.address)
    }
}

pub fn generate_keys<R: RngCore + CryptoRng>(rng: &mut R, network: Network) -> KeyBundle {
    let sk = PrivateKey::new(SecretKey::new(rng), network);
    let pk = sk.public_key(&Secp256k1::new());
    let address = Address::p2pkh(pk.pubkey_hash(), network);
    KeyBundle { sk, pk, address }
}

fn decode_raw(input: &str) -> Result<Vec<u8>, WrongInput> {
    parse_hex_or_base58(input)
        .ok_or_else(|| WrongInput::Format("Wrong format of the transaction.".to_string()))
}

/// Complete a deposit transaction a co-player signed for us. The secret key
/// is asked through `io`.
pub fn claim_money<IO: IoHandler>(
    io: &mut IO,
    pay_deposit: &str,
    commit: &str,
    network: Network,
) -> Result<Claim, CliError> {
    let raw_pay = decode_raw(pay_deposit)?;
    let commit_tx: Transaction = consensus::deserialize(&decode_raw(commit)?)
        .map_err(|e| TxError::Decode(e.to_string()))?;
    let sk = io.ask_sk(SkVerifier::new(None, network))?;
    Ok(PayDepositTx::claim(&raw_pay, &commit_tx, &sk)?)
}

/// Human-readable summary of a completed claim
pub fn describe_claim(claim: &Claim) -> String {
    let valid_from = match claim.lock_time {
        LockTime::Seconds(time) => format_time(i64::from(time.to_consensus_u32())),
        LockTime::Blocks(height) => format!("block {}", height),
    };
    format!(
        "Claim of {} valid from {}:\n{}",
        claim.value.display_in(Denomination::Bitcoin).show_denomination(),
        valid_from,
        hex::encode(consensus::serialize(&claim.tx))
    )
}
