//! Bitcoin Lottery Console
//!
//! Commands:
//! - `lottery`       - take part in a lottery run, interactively
//! - `generate-keys` - create a key pair and its P2PKH address
//! - `claim-money`   - complete a deposit transaction received from a player
//!                     who did not reveal their secret in time

mod commands;
mod console;

use bitcoin::Network;
use clap::{Parser, Subcommand};
use console::ConsoleIo;
use lottery_core::{FileStorage, Lottery};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lottery", version, about = "Trustless N-party Bitcoin lottery")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Directory the session files are written to
    #[arg(short, long, global = true, default_value = "./lottery-data")]
    dir: PathBuf,

    /// Use testnet keys and addresses
    #[arg(long, global = true)]
    testnet: bool,
}

impl Args {
    fn network(&self) -> Network {
        if self.testnet {
            Network::Testnet
        } else {
            Network::Bitcoin
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Take part in a lottery
    Lottery,
    /// Generate a fresh key pair
    GenerateKeys,
    /// Claim the deposit of a player who did not open their commitment
    ClaimMoney {
        /// Deposit transaction received from the player (hex or base58)
        #[arg(long)]
        pay_deposit: String,
        /// The player's commit transaction it spends (hex or base58)
        #[arg(long)]
        commit: String,
    },
}

fn run(args: Args) -> Result<(), commands::CliError> {
    let network = args.network();
    match args.command {
        Command::Lottery => {
            let mut io = ConsoleIo::stdio();
            let mut storage = FileStorage::new(&args.dir);
            let mut rng = rand::thread_rng();
            let lottery = Lottery::new(&mut io, &mut storage, &mut rng, network);
            info!(session = %lottery.session(), dir = %args.dir.display(), %network, "Starting lottery");
            let outcome = lottery.run()?;
            info!(winner = outcome.winner, session = %outcome.session, "Lottery finished");
        }
        Command::GenerateKeys => {
            println!("{}", commands::generate_keys(&mut rand::thread_rng(), network));
        }
        Command::ClaimMoney { pay_deposit, commit } => {
            let mut io = ConsoleIo::stdio();
            let claim = commands::claim_money(&mut io, &pay_deposit, &commit, network)?;
            println!("{}", commands::describe_claim(&claim));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
