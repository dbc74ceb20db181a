//! Monetary amounts.

use super::{Verifier, WrongInput};
use bitcoin::amount::{Denomination, ParseAmountError};
use bitcoin::Amount;

/// Parses an amount given in BTC and checks it against optional bounds
#[derive(Clone, Debug)]
pub struct AmountVerifier {
    label: &'static str,
    min: Option<Amount>,
    max: Option<Amount>,
}

impl AmountVerifier {
    pub fn new(label: &'static str, min: Option<Amount>, max: Option<Amount>) -> Self {
        Self { label, min, max }
    }

    /// Stake of every player
    pub fn stake(min: Option<Amount>) -> Self {
        Self::new("stake", min, None)
    }

    /// Fee of every protocol transaction
    pub fn fee(max: Option<Amount>) -> Self {
        Self::new("fee", None, max)
    }
}

impl Verifier for AmountVerifier {
    type Output = Amount;

    fn verify(&mut self, input: &str) -> Result<Amount, WrongInput> {
        let value = Amount::from_str_in(input.trim(), Denomination::Bitcoin).map_err(|e| match e {
            ParseAmountError::OutOfRange(_) | ParseAmountError::TooPrecise(_) => {
                WrongInput::Value(format!("Wrong value of the {}.", self.label))
            }
            _ => WrongInput::Format(format!("Wrong format of the {}.", self.label)),
        })?;
        if let Some(min) = self.min {
            if value < min {
                return Err(WrongInput::Value(format!(
                    "The {} has to be not smaller than {}.",
                    self.label,
                    min.display_in(Denomination::Bitcoin).show_denomination()
                )));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Err(WrongInput::Value(format!(
                    "The {} has to be not greater than {}.",
                    self.label,
                    max.display_in(Denomination::Bitcoin).show_denomination()
                )));
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_minimum_is_a_value_error() {
        let mut verifier = AmountVerifier::stake(Some(Amount::from_sat(1_000_000)));
        assert!(matches!(verifier.verify("0.009"), Err(WrongInput::Value(_))));
    }

    #[test]
    fn test_garbage_is_a_format_error() {
        let mut verifier = AmountVerifier::stake(None);
        assert_eq!(
            verifier.verify("abc"),
            Err(WrongInput::Format("Wrong format of the stake.".to_string()))
        );
    }

    #[test]
    fn test_unbounded_amount_in_smallest_units() {
        let mut verifier = AmountVerifier::new("amount", None, None);
        assert_eq!(verifier.verify("1.0"), Ok(Amount::from_sat(100_000_000)));
    }

    #[test]
    fn test_sub_satoshi_precision_is_a_value_error() {
        let mut verifier = AmountVerifier::fee(None);
        assert!(matches!(verifier.verify("0.000000001"), Err(WrongInput::Value(_))));
    }

    #[test]
    fn test_fee_bound_is_half_the_stake() {
        let stake = AmountVerifier::stake(None).verify("0.05").unwrap();
        let mut fee = AmountVerifier::fee(Some(stake / 2));

        assert!(matches!(fee.verify("0.03"), Err(WrongInput::Value(_))));
        assert_eq!(fee.verify("0.02"), Ok(Amount::from_sat(2_000_000)));
        assert_eq!(fee.verify("0.025"), Ok(Amount::from_sat(2_500_000)));
    }

    #[test]
    fn test_bound_message_names_label() {
        let mut verifier = AmountVerifier::fee(Some(Amount::from_sat(100)));
        let err = verifier.verify("1").unwrap_err();
        assert!(err.reason().starts_with("The fee has to be not greater than"));
    }
}
