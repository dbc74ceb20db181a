//! Script templates and legacy signature helpers shared by the protocol
//! transactions.

use super::TxError;
use crate::crypto::CommitmentHash;
use bitcoin::ecdsa;
use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::{
    OP_CHECKMULTISIG, OP_CHECKSIG, OP_ELSE, OP_ENDIF, OP_EQUALVERIFY, OP_IF, OP_PUSHNUM_2,
    OP_SHA256, OP_SIZE, OP_VERIFY, OP_WITHIN,
};
use bitcoin::script::{Builder, Instruction, PushBytesBuf};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{PrivateKey, PublicKey, Script, ScriptBuf, Transaction};
use secp256k1::{Message, Secp256k1};

/// Position of the commitment hash push inside a commit output script
const HASH_ITEM: usize = 7;
/// Position of the owner's key in the reveal branch
const OWNER_ITEM: usize = 9;
/// Position of the counterparty's key in the multisig branch
const PEER_ITEM: usize = 14;
/// Number of instructions in a commit output script
const COMMIT_SCRIPT_ITEMS: usize = 18;

/// Push arbitrary bytes, failing only for pushes above the consensus limit
pub(crate) fn push_bytes(builder: Builder, bytes: &[u8]) -> Result<Builder, TxError> {
    let buf = PushBytesBuf::try_from(bytes.to_vec()).map_err(|e| TxError::Script(e.to_string()))?;
    Ok(builder.push_slice(buf))
}

/// Pay-to-pubkey-hash script for a key
pub(crate) fn p2pkh(pk: &PublicKey) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&pk.pubkey_hash())
}

/// Locking script of one commit output.
///
/// The first branch is taken by the owner's OpenTx: it demands a secret whose
/// length lies in `[min_length, min_length + no_players)` and whose SHA256 is
/// `hash`, plus the owner's signature. The second branch is the deposit
/// forfeiture path and needs both the owner's and the peer's signature.
pub(crate) fn commit_output_script(
    owner: &PublicKey,
    peer: &PublicKey,
    hash: &CommitmentHash,
    min_length: usize,
    no_players: usize,
) -> Result<ScriptBuf, TxError> {
    let builder = Builder::new()
        .push_opcode(OP_IF)
        .push_opcode(OP_SIZE)
        .push_int(min_length as i64)
        .push_int((min_length + no_players) as i64)
        .push_opcode(OP_WITHIN)
        .push_opcode(OP_VERIFY)
        .push_opcode(OP_SHA256);
    let builder = push_bytes(builder, hash.as_bytes())?;
    Ok(builder
        .push_opcode(OP_EQUALVERIFY)
        .push_key(owner)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_opcode(OP_PUSHNUM_2)
        .push_key(owner)
        .push_key(peer)
        .push_opcode(OP_PUSHNUM_2)
        .push_opcode(OP_CHECKMULTISIG)
        .push_opcode(OP_ENDIF)
        .into_script())
}

/// Keys and hash read back from a commit output script
#[derive(Clone, Debug)]
pub(crate) struct CommitScript {
    pub hash: CommitmentHash,
    pub owner: PublicKey,
    pub peer: PublicKey,
}

impl CommitScript {
    /// Extract the variable parts of a commit output script. This only reads
    /// the template; callers that know the lottery terms must still compare
    /// the script against [`commit_output_script`].
    pub fn parse(script: &Script) -> Result<Self, TxError> {
        let items = instructions(script)?;
        if items.len() != COMMIT_SCRIPT_ITEMS {
            return Err(TxError::Script("not a commit output script".to_string()));
        }
        let hash = push_at(&items, HASH_ITEM)
            .and_then(CommitmentHash::from_slice)
            .ok_or_else(|| TxError::Script("missing commitment hash".to_string()))?;
        let owner = key_at(&items, OWNER_ITEM)?;
        let peer = key_at(&items, PEER_ITEM)?;
        Ok(Self { hash, owner, peer })
    }
}

fn push_at<'a>(items: &[Instruction<'a>], index: usize) -> Option<&'a [u8]> {
    match items.get(index) {
        Some(Instruction::PushBytes(bytes)) => Some(bytes.as_bytes()),
        _ => None,
    }
}

fn key_at(items: &[Instruction<'_>], index: usize) -> Result<PublicKey, TxError> {
    push_at(items, index)
        .and_then(|bytes| PublicKey::from_slice(bytes).ok())
        .ok_or_else(|| TxError::Script("missing public key".to_string()))
}

/// Decode every instruction of a script
pub(crate) fn instructions(script: &Script) -> Result<Vec<Instruction<'_>>, TxError> {
    script
        .instructions()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TxError::Script(e.to_string()))
}

/// Decode a script consisting of data pushes only
pub(crate) fn pushes(script: &Script) -> Result<Vec<&[u8]>, TxError> {
    instructions(script)?
        .into_iter()
        .map(|item| match item {
            Instruction::PushBytes(bytes) => Ok(bytes.as_bytes()),
            Instruction::Op(op) => Err(TxError::Script(format!("unexpected {} in input script", op))),
        })
        .collect()
}

fn sighash_message(tx: &Transaction, input: usize, script_code: &Script) -> Result<Message, TxError> {
    let cache = SighashCache::new(tx);
    let sighash = cache
        .legacy_signature_hash(input, script_code, EcdsaSighashType::All.to_u32())
        .map_err(|e| TxError::Script(e.to_string()))?;
    Ok(Message::from_digest(sighash.to_byte_array()))
}

/// Sign input `input` of `tx` against `script_code` with SIGHASH_ALL
pub(crate) fn sign_input(
    tx: &Transaction,
    input: usize,
    script_code: &Script,
    sk: &PrivateKey,
) -> Result<ecdsa::Signature, TxError> {
    let secp = Secp256k1::new();
    let msg = sighash_message(tx, input, script_code)?;
    Ok(ecdsa::Signature {
        signature: secp.sign_ecdsa(&msg, &sk.inner),
        sighash_type: EcdsaSighashType::All,
    })
}

/// Check a serialized SIGHASH_ALL signature on input `input` of `tx`
pub(crate) fn verify_input(
    tx: &Transaction,
    input: usize,
    script_code: &Script,
    sig: &[u8],
    pk: &PublicKey,
) -> Result<(), TxError> {
    let sig = ecdsa::Signature::from_slice(sig)
        .map_err(|e| TxError::Verification(format!("malformed signature on input {}: {}", input, e)))?;
    if sig.sighash_type != EcdsaSighashType::All {
        return Err(TxError::Verification(format!(
            "input {} is not signed with SIGHASH_ALL",
            input
        )));
    }
    let secp = Secp256k1::verification_only();
    let msg = sighash_message(tx, input, script_code)?;
    secp.verify_ecdsa(&msg, &sig.signature, &pk.inner)
        .map_err(|_| TxError::Verification(format!("invalid signature on input {}", input)))
}
