//! Input verifiers.
//!
//! Every value that enters the protocol from an operator or a co-player goes
//! through a [`Verifier`]. A verifier either returns the typed value or a
//! [`WrongInput`] explaining why the input was rejected; the caller may then
//! ask again. A rejection never changes what a verifier already accepted.

mod amount;
mod keys;
mod number;
mod output;
mod secret;
mod transaction;

pub use amount::AmountVerifier;
pub use keys::{AddressVerifier, PkListVerifier, SkVerifier};
pub use number::NumberVerifier;
pub use output::TxOutputVerifier;
pub use secret::{NewSecretVerifier, SecretListVerifier};
pub use transaction::{OthersCommitsVerifier, OthersPaysVerifier, TxTemplate, TxVerifier};

use crate::tx::TxError;
use thiserror::Error;

/// Rejection of an untrusted input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WrongInput {
    /// The input cannot be decoded
    #[error("{0}")]
    Format(String),

    /// Decoded, but outside the allowed bounds
    #[error("{0}")]
    Value(String),

    /// Decoded, but does not correspond to an expected key, hash or position
    #[error("{0}")]
    Mismatch(String),

    /// Too many items, or a required item never appeared
    #[error("{0}")]
    Sequence(String),

    /// Valid, but for a different chain
    #[error("{0}")]
    Network(String),

    /// A transaction that fails protocol validation
    #[error("{0}")]
    Construction(String),
}

impl WrongInput {
    /// Human-readable reason for the rejection
    pub fn reason(&self) -> &str {
        match self {
            WrongInput::Format(r)
            | WrongInput::Value(r)
            | WrongInput::Mismatch(r)
            | WrongInput::Sequence(r)
            | WrongInput::Network(r)
            | WrongInput::Construction(r) => r,
        }
    }
}

impl From<TxError> for WrongInput {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Decode(_) => WrongInput::Format("Wrong format of the transaction.".to_string()),
            other => WrongInput::Construction(other.to_string()),
        }
    }
}

/// Turns an untrusted string into a validated value
pub trait Verifier {
    type Output;

    fn verify(&mut self, input: &str) -> Result<Self::Output, WrongInput>;
}
