//! The lottery run as a sequence of phase values.
//!
//! Each phase consumes the previous one, so a run can only move forward:
//! [`Lottery::initialize`] yields [`Initialized`], whose
//! [`Initialized::exchange_commitments`] yields [`Committed`], whose
//! [`Committed::execute`] yields the [`Outcome`].

use super::types::{deposit_expiry, round_start_time, Phase, Players, SessionId};
use crate::crypto::{CommitmentHash, Secret};
use crate::io::{layout, IoError, IoHandler, Storage, StorageError};
use crate::tx::{CommitTerms, CommitTx, ComputeTx, LotteryTx, OpenTx, PayDepositTx, TxError};
use crate::verify::{
    AmountVerifier, NewSecretVerifier, NumberVerifier, OthersCommitsVerifier, OthersPaysVerifier,
    PkListVerifier, SecretListVerifier, SkVerifier, TxOutputVerifier, WrongInput,
};
use bitcoin::{Amount, Network, PrivateKey};
use chrono::Utc;
use rand::{CryptoRng, RngCore};
use secp256k1::Secp256k1;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors that abort a lottery run
#[derive(Debug, Error)]
pub enum LotteryError {
    #[error("Input error: {0}")]
    Io(#[from] IoError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TxError),

    #[error("Rejected input: {0}")]
    Input(#[from] WrongInput),
}

/// Everything agreed on during initialization
#[derive(Clone, Debug)]
pub struct Setup {
    pub sk: PrivateKey,
    pub players: Players,
    pub stake: Amount,
    pub fee: Amount,
    /// Minutes from the protocol start until deposits can be claimed
    pub lock_time: i64,
    pub min_length: usize,
    pub secret: Secret,
}

/// Transactions built and received during the commitment exchange
#[derive(Clone, Debug)]
pub struct Exchange {
    pub commit: CommitTx,
    pub open: OpenTx,
    /// Our deposit transactions, one per co-player in position order
    pub pays: Vec<PayDepositTx>,
    /// Every player's CommitTx, `None` at the local position
    pub others_commits: Vec<Option<CommitTx>>,
    pub others_pays: Vec<PayDepositTx>,
    /// Commitment hashes of all players, in position order
    pub hashes: Vec<CommitmentHash>,
    pub start_time: i64,
    pub expiry: i64,
}

/// Result of a completed run
#[derive(Clone, Debug)]
pub struct Outcome {
    pub session: SessionId,
    pub position: usize,
    pub winner: usize,
    pub compute: ComputeTx,
}

impl Outcome {
    pub fn is_winner(&self) -> bool {
        self.winner == self.position
    }
}

/// A lottery run before initialization
pub struct Lottery<'a, IO, S, R> {
    io: &'a mut IO,
    storage: &'a mut S,
    rng: &'a mut R,
    network: Network,
    session: SessionId,
}

/// After initialization
pub struct Initialized<'a, IO, S, R> {
    ctx: Lottery<'a, IO, S, R>,
    setup: Setup,
}

/// After the deposit and commitment exchange
pub struct Committed<'a, IO, S, R> {
    ctx: Lottery<'a, IO, S, R>,
    setup: Setup,
    exchange: Exchange,
}

/// One slot per player, with the local slot left empty
fn by_position<T: Clone + Into<LotteryTx>>(peers: &[T], position: usize) -> Vec<Option<LotteryTx>> {
    let mut slots: Vec<Option<LotteryTx>> = peers.iter().cloned().map(|tx| Some(tx.into())).collect();
    slots.insert(position, None);
    slots
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or(path)
}

impl<'a, IO, S, R> Lottery<'a, IO, S, R>
where
    IO: IoHandler,
    S: Storage,
    R: RngCore + CryptoRng,
{
    pub fn new(io: &'a mut IO, storage: &'a mut S, rng: &'a mut R, network: Network) -> Self {
        Self { io, storage, rng, network, session: SessionId::new() }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Run all phases
    pub fn run(self) -> Result<Outcome, LotteryError> {
        self.initialize()?.exchange_commitments()?.execute()
    }

    /// Agree on keys and parameters, then fix and persist the local secret
    pub fn initialize(self) -> Result<Initialized<'a, IO, S, R>, LotteryError> {
        info!(session = %self.session, network = %self.network, "Initialization");
        self.io.show_phase(Phase::Initialization)?;

        let sk = self.io.ask_sk(SkVerifier::new(None, self.network))?;
        let no_players = self.io.ask_no_players(NumberVerifier::no_players())? as usize;
        let mut pk_list = PkListVerifier::new(sk.public_key(&Secp256k1::new()), no_players);
        self.io.ask_pks(&mut pk_list)?;
        let players = pk_list.finish()?;
        info!(no_players, position = players.position(), "Players agreed");

        let stake = self.io.ask_stake(AmountVerifier::stake(None))?;
        let fee = self.io.ask_fee(AmountVerifier::fee(Some(stake / 2)))?;
        let lock_time = self.io.ask_lock_time(NumberVerifier::lock_time())?;
        let min_length = self.io.ask_min_length(NumberVerifier::min_length())? as usize;
        let secret = self
            .io
            .ask_secret(NewSecretVerifier::new(min_length, no_players, &mut *self.rng))?;

        let path = self.storage.save_secret(self.session, &secret)?;
        self.io.show_secret(&secret, &path)?;
        info!(%stake, %fee, lock_time, min_length, "Initialization complete");

        let setup = Setup { sk, players, stake, fee, lock_time, min_length, secret };
        Ok(Initialized { ctx: self, setup })
    }
}

impl<'a, IO, S, R> Initialized<'a, IO, S, R>
where
    IO: IoHandler,
    S: Storage,
    R: RngCore + CryptoRng,
{
    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    /// Lock the deposit under our commitment, hand out the deposit
    /// transactions and collect everybody else's
    pub fn exchange_commitments(self) -> Result<Committed<'a, IO, S, R>, LotteryError> {
        let Initialized { ctx, setup } = self;
        let session = ctx.session;
        let position = setup.players.position();
        info!(%session, "Deposit and commitment exchange");
        ctx.io.show_phase(Phase::DepositAndCommitmentExchange)?;

        let hash = setup.secret.commitment();
        ctx.io.show_hash(&hash)?;

        let terms = CommitTerms {
            pks: setup.players.pks().to_vec(),
            min_length: setup.min_length,
            stake: setup.stake,
        };
        let deposit = terms.deposit()?;
        let mut output = TxOutputVerifier::new(setup.players.local_pk().pubkey_hash(), deposit);
        let funding = ctx.io.ask_output(deposit, &mut output)?;
        ctx.io.show_funding_output(&funding)?;

        let commit = CommitTx::new(&funding, &setup.sk, &terms, position, hash)?;
        let open = OpenTx::new(&commit, &setup.sk, &setup.secret, setup.fee)?;
        ctx.storage.save_transaction(session, &commit.clone().into())?;
        ctx.storage.save_transaction(session, &open.clone().into())?;
        info!(txid = %commit.txid(), %deposit, "Commit built");

        let suggested = round_start_time(Utc::now().timestamp());
        let start_time = ctx.io.ask_start_time(suggested, NumberVerifier::start_time())?;
        let expiry = deposit_expiry(start_time, setup.lock_time);

        let pays = setup
            .players
            .peers()
            .map(|peer| PayDepositTx::new(&commit, peer, &setup.sk, setup.fee, expiry))
            .collect::<Result<Vec<_>, _>>()?;
        for pay in &pays {
            ctx.storage.save_transaction(session, &pay.clone().into())?;
        }
        let path = ctx.storage.save_transactions(session, layout::OWN_PAY_DEPOSITS, &by_position(&pays, position))?;
        ctx.io.show_commitment_scheme(&commit, &open, &pays, parent_dir(&path))?;

        let mut commits_verifier = OthersCommitsVerifier::new(terms, position, hash);
        let received = ctx.io.ask_others_commits(&mut commits_verifier)?;
        let hashes = commits_verifier.finish()?;
        ctx.storage.save_transactions(session, layout::OTHERS_COMMITS, &by_position(&received, position))?;

        let mut others_commits: Vec<Option<CommitTx>> = received.into_iter().map(Some).collect();
        others_commits.insert(position, None);
        let mut pays_verifier = OthersPaysVerifier::new(&others_commits, position, setup.fee, expiry);
        let others_pays = ctx.io.ask_others_pay_deposits(&mut pays_verifier)?;
        let path = ctx.storage.save_transactions(
            session,
            layout::OTHERS_PAY_DEPOSITS,
            &by_position(&others_pays, position),
        )?;
        ctx.io.show_end_of_commitment_phase(expiry, parent_dir(&path))?;
        info!(start_time, expiry, "Commitment exchange complete");

        let exchange =
            Exchange { commit, open, pays, others_commits, others_pays, hashes, start_time, expiry };
        Ok(Committed { ctx, setup, exchange })
    }
}

impl<'a, IO, S, R> Committed<'a, IO, S, R>
where
    IO: IoHandler,
    S: Storage,
    R: RngCore + CryptoRng,
{
    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    /// Collect every player's revealed secret and determine the winner
    pub fn execute(self) -> Result<Outcome, LotteryError> {
        let Committed { ctx, setup, exchange } = self;
        info!(session = %ctx.session, "Execution");
        ctx.io.show_phase(Phase::Execution)?;

        let mut reveals = SecretListVerifier::new(exchange.hashes.clone(), setup.min_length);
        let secrets = ctx.io.ask_secrets(&mut reveals)?;
        let compute = ComputeTx::new(&exchange.hashes, &secrets, setup.min_length)?;
        ctx.storage.save_secrets(ctx.session, compute.secrets())?;

        let position = setup.players.position();
        let winner = compute.winner();
        info!(winner, position, "Winner determined");
        ctx.io.show_winner(winner, position)?;

        Ok(Outcome { session: ctx.session, position, winner, compute })
    }
}
