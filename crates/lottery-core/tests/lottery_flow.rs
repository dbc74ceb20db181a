//! End-to-end runs of the lottery phases against scripted co-players.
//!
//! The co-players are simulated with the transaction API; the local player
//! is driven through `Lottery` with a `ScriptedIo`.

use bitcoin::absolute::LockTime;
use bitcoin::consensus;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, Network, OutPoint, PrivateKey, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Witness,
};
use lottery_core::io::layout;
use lottery_core::protocol::Phase;
use lottery_core::verify::WrongInput;
use lottery_core::{
    CommitTerms, CommitTx, FundingOutput, IoError, Lottery, LotteryError, LotteryTx, MemoryStorage,
    PayDepositTx, Query, ScriptedIo, Secret,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use secp256k1::{Secp256k1, SecretKey};

const STAKE_SAT: u64 = 5_000_000;
const FEE_SAT: u64 = 10_000;
const LOCK_TIME: i64 = 60;
const MIN_LENGTH: usize = 8;
const START_TIME: i64 = 1_700_000_000;
const EXPIRY: i64 = 1_700_003_600;

struct Player {
    sk: PrivateKey,
    pk: PublicKey,
    secret: Secret,
    funding_tx: Transaction,
}

impl Player {
    fn new(seed: u8, extra_length: usize) -> Self {
        let sk = PrivateKey::new(SecretKey::from_slice(&[seed; 32]).unwrap(), Network::Testnet);
        let pk = sk.public_key(&Secp256k1::new());
        let funding_tx = Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![
                TxOut { value: Amount::from_sat(99_000), script_pubkey: ScriptBuf::new_p2pkh(&pk.pubkey_hash()) },
                TxOut {
                    value: Amount::from_sat(STAKE_SAT * 2),
                    script_pubkey: ScriptBuf::new_p2pkh(&pk.pubkey_hash()),
                },
            ],
        };
        let secret = Secret::from_bytes(vec![seed; MIN_LENGTH + extra_length]);
        Self { sk, pk, secret, funding_tx }
    }

    fn funding(&self) -> FundingOutput {
        FundingOutput {
            outpoint: OutPoint { txid: self.funding_tx.compute_txid(), vout: 1 },
            txout: self.funding_tx.output[1].clone(),
        }
    }
}

/// Three players whose secrets contribute 1, 2 and 1: player 1 wins
struct Table {
    players: Vec<Player>,
    terms: CommitTerms,
    commits: Vec<CommitTx>,
}

impl Table {
    fn new() -> Self {
        let players = vec![Player::new(11, 1), Player::new(12, 2), Player::new(13, 1)];
        let terms = CommitTerms {
            pks: players.iter().map(|p| p.pk).collect(),
            min_length: MIN_LENGTH,
            stake: Amount::from_sat(STAKE_SAT),
        };
        let commits = players
            .iter()
            .enumerate()
            .map(|(k, p)| CommitTx::new(&p.funding(), &p.sk, &terms, k, p.secret.commitment()).unwrap())
            .collect();
        Self { players, terms, commits }
    }

    fn pay_hex(&self, owner: usize, recipient: usize) -> String {
        let pay = PayDepositTx::new(
            &self.commits[owner],
            recipient,
            &self.players[owner].sk,
            Amount::from_sat(FEE_SAT),
            EXPIRY,
        )
        .unwrap();
        LotteryTx::from(pay).to_hex()
    }

    fn commit_hex(&self, owner: usize) -> String {
        LotteryTx::from(self.commits[owner].clone()).to_hex()
    }

    /// A commit of `owner` that reuses the commitment hash of `victim`
    fn copied_commit_hex(&self, owner: usize, victim: usize) -> String {
        let player = &self.players[owner];
        let hash = self.players[victim].secret.commitment();
        let commit = CommitTx::new(&player.funding(), &player.sk, &self.terms, owner, hash).unwrap();
        LotteryTx::from(commit).to_hex()
    }

    /// Input lines of the local player at `me`, up to and including the
    /// start time
    fn setup_lines(&self, me: usize) -> Vec<String> {
        let local = &self.players[me];
        let mut lines = vec![local.sk.to_wif(), "3".to_string()];
        lines.extend(self.players.iter().map(|p| p.pk.to_string()));
        lines.extend(
            ["0.05", "0.0001", &LOCK_TIME.to_string(), &MIN_LENGTH.to_string()]
                .iter()
                .map(|s| s.to_string()),
        );
        lines.push(local.secret.to_string());
        lines.push(hex::encode(consensus::serialize(&local.funding_tx)));
        lines.push(START_TIME.to_string());
        lines
    }

    /// Every input line of a full run of the player at `me`
    fn script(&self, me: usize) -> Vec<String> {
        let mut lines = self.setup_lines(me);
        let peers: Vec<usize> = (0..3).filter(|k| *k != me).collect();
        lines.extend(peers.iter().map(|k| self.commit_hex(*k)));
        lines.extend(peers.iter().map(|k| self.pay_hex(*k, me)));
        lines.extend(self.players.iter().map(|p| p.secret.to_string()));
        lines
    }
}

#[test]
fn test_full_run_for_every_position() {
    let table = Table::new();

    for me in 0..3 {
        let mut io = ScriptedIo::new(table.script(me));
        let mut storage = MemoryStorage::new();
        let mut rng = StdRng::seed_from_u64(me as u64);

        let outcome = Lottery::new(&mut io, &mut storage, &mut rng, Network::Testnet).run().unwrap();

        assert_eq!(outcome.winner, 1);
        assert_eq!(outcome.position, me);
        assert_eq!(outcome.is_winner(), me == 1);
        assert!(io.rejections().is_empty(), "{:?}", io.rejections());
        assert_eq!(io.remaining(), 0);
        assert_eq!(io.winner(), Some(1));
        assert_eq!(
            io.phases(),
            &[Phase::Initialization, Phase::DepositAndCommitmentExchange, Phase::Execution]
        );
    }
}

#[test]
fn test_phases_step_by_step() {
    let table = Table::new();
    let me = 2;
    let mut io = ScriptedIo::new(table.script(me));
    let mut storage = MemoryStorage::new();
    let mut rng = StdRng::seed_from_u64(1);

    let lottery = Lottery::new(&mut io, &mut storage, &mut rng, Network::Testnet);
    let session = lottery.session();

    let initialized = lottery.initialize().unwrap();
    assert_eq!(initialized.setup().players.position(), me);
    assert_eq!(initialized.setup().fee, Amount::from_sat(FEE_SAT));
    assert_eq!(initialized.setup().secret, table.players[me].secret);

    let committed = initialized.exchange_commitments().unwrap();
    let exchange = committed.exchange();
    assert_eq!(exchange.start_time, START_TIME);
    assert_eq!(exchange.expiry, EXPIRY);
    // Signing is deterministic, so our commit equals the one simulated
    assert_eq!(exchange.commit.txid(), table.commits[me].txid());
    assert_eq!(exchange.pays.len(), 2);
    assert!(exchange.pays.iter().all(|pay| pay.lock_time() == LockTime::from_time(EXPIRY as u32).unwrap()));
    assert_eq!(exchange.others_pays.len(), 2);
    assert!(exchange.others_commits[me].is_none());
    let expected_hashes: Vec<_> = table.commits.iter().map(|c| *c.hash()).collect();
    assert_eq!(exchange.hashes, expected_hashes);

    let outcome = committed.execute().unwrap();
    assert_eq!(outcome.winner, 1);

    assert_eq!(storage.get(session, layout::SECRET), Some(table.players[me].secret.to_string().as_str()));
    assert_eq!(storage.get(session, "commit_2.hex"), Some(table.commit_hex(me).as_str()));
    assert!(storage.get(session, "open_2.hex").is_some());
    assert!(storage.get(session, "pay_deposit_2_to_0.hex").is_some());
    assert!(storage.get(session, "pay_deposit_2_to_1.hex").is_some());
    // Collections have one line per position; the local one is empty
    let own = storage.get(session, &layout::collection(layout::OWN_PAY_DEPOSITS)).unwrap();
    assert_eq!(own.lines().collect::<Vec<_>>(), vec![table.pay_hex(2, 0), table.pay_hex(2, 1), String::new()]);
    let others = storage.get(session, &layout::collection(layout::OTHERS_PAY_DEPOSITS)).unwrap();
    assert_eq!(others.lines().collect::<Vec<_>>(), vec![table.pay_hex(0, 2), table.pay_hex(1, 2), String::new()]);
    let commits = storage.get(session, &layout::collection(layout::OTHERS_COMMITS)).unwrap();
    assert_eq!(commits.lines().collect::<Vec<_>>(), vec![table.commit_hex(0), table.commit_hex(1), String::new()]);
    assert_eq!(storage.get(session, layout::REVEALED_SECRETS).unwrap().lines().count(), 3);
}

#[test]
fn test_rejected_inputs_are_asked_again() {
    let table = Table::new();
    let me = 0;
    let local = &table.players[me];
    let peer_pks: Vec<String> = table.players.iter().map(|p| p.pk.to_string()).collect();

    let mut lines: Vec<String> = vec![
        "not a key".into(),
        local.sk.to_wif(),
        "1".into(),
        "3".into(),
        peer_pks[0].clone(),
        peer_pks[0].clone(),
        peer_pks[1].clone(),
        peer_pks[2].clone(),
        "0.05".into(),
        "0.03".into(),
        "0.0001".into(),
        "0".into(),
        LOCK_TIME.to_string(),
        MIN_LENGTH.to_string(),
        "abcd".into(),
        local.secret.to_string(),
        hex::encode(consensus::serialize(&table.players[1].funding_tx)),
        hex::encode(consensus::serialize(&local.funding_tx)),
        "12345".into(),
        START_TIME.to_string(),
        table.commit_hex(2),
        table.commit_hex(1),
        table.commit_hex(2),
        table.pay_hex(2, 1),
        table.pay_hex(1, 0),
        table.pay_hex(2, 0),
        table.players[1].secret.to_string(),
    ];
    lines.extend(table.players.iter().map(|p| p.secret.to_string()));

    let mut io = ScriptedIo::new(lines);
    let mut storage = MemoryStorage::new();
    let mut rng = StdRng::seed_from_u64(3);
    let outcome = Lottery::new(&mut io, &mut storage, &mut rng, Network::Testnet).run().unwrap();
    assert_eq!(outcome.winner, 1);

    let rejected: Vec<&Query> = io.rejections().iter().map(|(query, _)| query).collect();
    assert_eq!(
        rejected,
        vec![
            &Query::SecretKey,
            &Query::NoPlayers,
            &Query::PublicKey { index: 1 },
            &Query::Fee,
            &Query::LockTime,
            &Query::Secret,
            &Query::Output { value: Amount::from_sat(STAKE_SAT * 2) },
            &Query::StartTime { suggested: io_suggested(&io) },
            &Query::Commit { owner: 1 },
            &Query::PayDeposit { owner: 1 },
            &Query::Reveal { owner: 0 },
        ]
    );
    let reasons: Vec<&WrongInput> = io.rejections().iter().map(|(_, reason)| reason).collect();
    assert!(matches!(reasons[0], WrongInput::Format(_)));
    assert!(matches!(reasons[2], WrongInput::Mismatch(_)));
    assert!(matches!(reasons[3], WrongInput::Value(reason) if reason.starts_with("The fee has to be not greater")));
    assert!(matches!(reasons[6], WrongInput::Mismatch(_)));
    assert!(matches!(reasons[8], WrongInput::Construction(_)));
    assert!(matches!(reasons[10], WrongInput::Mismatch(_)));
}

#[test]
fn test_commit_reusing_a_hash_is_rejected() {
    let table = Table::new();
    let me = 1;
    let mut lines = table.setup_lines(me);
    lines.extend([
        table.copied_commit_hex(0, me),
        table.commit_hex(0),
        table.copied_commit_hex(2, 0),
        table.commit_hex(2),
        table.pay_hex(0, me),
        table.pay_hex(2, me),
    ]);
    lines.extend(table.players.iter().map(|p| p.secret.to_string()));

    let mut io = ScriptedIo::new(lines);
    let mut storage = MemoryStorage::new();
    let mut rng = StdRng::seed_from_u64(7);
    let outcome = Lottery::new(&mut io, &mut storage, &mut rng, Network::Testnet).run().unwrap();

    assert_eq!(outcome.winner, 1);
    let rejected: Vec<_> = io.rejections().iter().collect();
    assert_eq!(rejected.len(), 2);
    assert_eq!(rejected[0].0, Query::Commit { owner: 0 });
    assert!(matches!(rejected[0].1, WrongInput::Mismatch(_)));
    assert_eq!(rejected[1].0, Query::Commit { owner: 2 });
    assert!(matches!(rejected[1].1, WrongInput::Mismatch(_)));
}

/// The suggested start time depends on the clock; take it from the recorded query
fn io_suggested(io: &ScriptedIo) -> i64 {
    io.rejections()
        .iter()
        .find_map(|(query, _)| match query {
            Query::StartTime { suggested } => Some(*suggested),
            _ => None,
        })
        .unwrap()
}

#[test]
fn test_closed_input_aborts_after_persisting_secret() {
    let table = Table::new();
    let me = 1;
    let mut io = ScriptedIo::new(table.setup_lines(me));
    let mut storage = MemoryStorage::new();
    let mut rng = StdRng::seed_from_u64(4);

    let lottery = Lottery::new(&mut io, &mut storage, &mut rng, Network::Testnet);
    let session = lottery.session();
    let result = lottery.initialize().and_then(|initialized| initialized.exchange_commitments());

    assert!(matches!(result, Err(LotteryError::Io(IoError::Closed(_)))));
    assert!(storage.get(session, layout::SECRET).is_some());
    assert!(storage.get(session, "commit_1.hex").is_some());
    assert!(storage.get(session, &layout::collection(layout::OTHERS_COMMITS)).is_none());
}

#[test]
fn test_empty_secret_is_sampled() {
    let table = Table::new();
    let me = 0;
    let mut lines = table.setup_lines(me);
    lines.truncate(lines.len() - 2);
    lines.pop();
    lines.push(String::new());

    let mut io = ScriptedIo::new(lines);
    let mut storage = MemoryStorage::new();
    let mut rng = StdRng::seed_from_u64(5);
    let initialized = Lottery::new(&mut io, &mut storage, &mut rng, Network::Testnet).initialize().unwrap();

    let secret = &initialized.setup().secret;
    assert!((MIN_LENGTH..MIN_LENGTH + 3).contains(&secret.len()));
    assert_ne!(secret, &table.players[me].secret);
}

#[test]
fn test_wrong_network_key_is_rejected() {
    let table = Table::new();
    let mainnet = PrivateKey::new(table.players[0].sk.inner, Network::Bitcoin);
    let mut lines = vec![mainnet.to_wif()];
    lines.extend(table.setup_lines(0));

    let mut io = ScriptedIo::new(lines);
    let mut storage = MemoryStorage::new();
    let mut rng = StdRng::seed_from_u64(6);
    Lottery::new(&mut io, &mut storage, &mut rng, Network::Testnet).initialize().unwrap();

    assert!(matches!(io.rejections()[0].1, WrongInput::Network(_)));
}
