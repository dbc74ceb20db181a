//! Interactive operator channel on stdin/stdout.

use bitcoin::amount::Denomination;
use chrono::DateTime;
use lottery_core::io::{IoError, IoHandler, Query};
use lottery_core::protocol::Phase;
use lottery_core::tx::{CommitTx, FundingOutput, LotteryTx, OpenTx, PayDepositTx};
use lottery_core::verify::Verifier;
use lottery_core::{CommitmentHash, Secret};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::debug;

/// Prompts on `output`, reads answers line by line from `input` and asks
/// again on every rejection
pub struct ConsoleIo<I, O> {
    input: I,
    output: O,
}

impl ConsoleIo<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<I: BufRead, O: Write> ConsoleIo<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Self { input, output }
    }

    #[cfg(test)]
    fn into_output(self) -> O {
        self.output
    }

    fn read_line(&mut self, query: &Query) -> Result<String, IoError> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(IoError::Closed(query.to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

pub(crate) fn format_time(timestamp: i64) -> String {
    match DateTime::from_timestamp(timestamp, 0) {
        Some(time) => format!("{} ({})", time.format("%Y-%m-%d %H:%M:%S UTC"), timestamp),
        None => timestamp.to_string(),
    }
}

impl<I: BufRead, O: Write> IoHandler for ConsoleIo<I, O> {
    fn ask<V: Verifier>(&mut self, query: &Query, verifier: &mut V) -> Result<V::Output, IoError> {
        loop {
            write!(self.output, "Enter {}: ", query)?;
            self.output.flush()?;
            let line = self.read_line(query)?;
            match verifier.verify(&query.fill_default(line)) {
                Ok(value) => return Ok(value),
                Err(rejection) => {
                    debug!(%query, %rejection, "Input rejected");
                    writeln!(self.output, "{} Try again.", rejection)?;
                }
            }
        }
    }

    fn show_phase(&mut self, phase: Phase) -> Result<(), IoError> {
        writeln!(self.output, "\n=== {} ===", phase)?;
        Ok(())
    }

    fn show_secret(&mut self, secret: &Secret, path: &Path) -> Result<(), IoError> {
        writeln!(self.output, "Your secret: {}", secret)?;
        writeln!(self.output, "It was saved to {}. Do not reveal it before the execution phase.", path.display())?;
        Ok(())
    }

    fn show_hash(&mut self, hash: &CommitmentHash) -> Result<(), IoError> {
        writeln!(self.output, "Your commitment hash: {}", hash)?;
        Ok(())
    }

    fn show_funding_output(&mut self, funding: &FundingOutput) -> Result<(), IoError> {
        writeln!(
            self.output,
            "Using output {} of {} worth {}.",
            funding.outpoint.vout,
            funding.outpoint.txid,
            funding.txout.value.display_in(Denomination::Bitcoin).show_denomination()
        )?;
        Ok(())
    }

    fn show_commitment_scheme(
        &mut self,
        commit: &CommitTx,
        open: &OpenTx,
        pays: &[PayDepositTx],
        path: &Path,
    ) -> Result<(), IoError> {
        writeln!(self.output, "Broadcast your commit transaction:")?;
        writeln!(self.output, "{}", LotteryTx::from(commit.clone()).to_hex())?;
        writeln!(self.output, "Send every player their deposit transaction:")?;
        for pay in pays {
            writeln!(self.output, "  player {}: {}", pay.recipient(), LotteryTx::from(pay.clone()).to_hex())?;
        }
        writeln!(self.output, "Keep your open transaction until the execution phase:")?;
        writeln!(self.output, "{}", LotteryTx::from(open.clone()).to_hex())?;
        writeln!(self.output, "All transactions were saved in {}.", path.display())?;
        Ok(())
    }

    fn show_end_of_commitment_phase(&mut self, expiry: i64, path: &Path) -> Result<(), IoError> {
        writeln!(self.output, "Commitment phase finished; everything was saved in {}.", path.display())?;
        writeln!(
            self.output,
            "Broadcast your open transaction before {}. From then on the deposit transactions of players who did not open can be claimed.",
            format_time(expiry)
        )?;
        Ok(())
    }

    fn show_winner(&mut self, winner: usize, position: usize) -> Result<(), IoError> {
        if winner == position {
            writeln!(self.output, "You won! (player {})", winner)?;
        } else {
            writeln!(self.output, "Player {} won.", winner)?;
        }
        Ok(())
    }
}
