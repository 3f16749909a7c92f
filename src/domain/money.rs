use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TopupError};

/// Upper-case currency code ("USD", "USDC", "BTC")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TopupError::Validation(format!(
                "invalid currency code '{}'",
                code
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Currency {
    type Err = TopupError;

    fn from_str(raw: &str) -> Result<Self> {
        Self::new(raw)
    }
}

impl TryFrom<String> for Currency {
    type Error = TopupError;

    fn try_from(raw: String) -> Result<Self> {
        Self::new(&raw)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

/// Exact decimal amount in a currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount.normalize(), self.currency)
    }
}

/// Parse a decimal string coming off the wire or out of configuration.
pub fn parse_decimal(field: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str_exact(raw.trim()).map_err(|_| TopupError::InvalidDecimal {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

/// Balance of one account at query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub currency: Currency,
    pub balance: Decimal,
    pub available: Decimal,
}

impl AccountSnapshot {
    /// Build a snapshot from the raw decimal strings returned by the exchange.
    ///
    /// `available <= balance` is not checked; both must parse.
    pub fn parse(account_id: &str, currency: &str, balance: &str, available: &str) -> Result<Self> {
        Ok(Self {
            account_id: account_id.to_string(),
            currency: Currency::new(currency)?,
            balance: parse_decimal("balance", balance)?,
            available: parse_decimal("available", available)?,
        })
    }
}

/// Amount the available balance has to stay above
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub minimum: Money,
    /// Multiplier applied before comparison (1.05 = 5% headroom)
    pub fuzz: Decimal,
}

impl Threshold {
    pub fn new(minimum: Money, fuzz: Decimal) -> Result<Self> {
        if fuzz <= Decimal::ZERO {
            return Err(TopupError::InvalidConfig(format!(
                "fuzz factor must be positive, got {}",
                fuzz
            )));
        }
        if minimum.amount.checked_mul(fuzz).is_none() {
            return Err(TopupError::InvalidConfig(format!(
                "threshold {} times fuzz {} overflows",
                minimum, fuzz
            )));
        }
        Ok(Self { minimum, fuzz })
    }

    pub fn without_fuzz(minimum: Money) -> Self {
        Self {
            minimum,
            fuzz: Decimal::ONE,
        }
    }

    pub fn effective(&self) -> Decimal {
        self.minimum.amount.saturating_mul(self.fuzz)
    }

    /// Strictly greater than; sitting exactly on the threshold is not enough.
    pub fn is_satisfied_by(&self, available: Decimal) -> bool {
        available > self.effective()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::new("usd").unwrap())
    }

    #[test]
    fn currency_codes_are_normalized() {
        assert_eq!(Currency::new(" usdc ").unwrap().as_str(), "USDC");
        assert!(Currency::new("").is_err());
        assert!(Currency::new("US-D").is_err());
    }

    #[test]
    fn overflowing_fuzz_is_a_config_error() {
        let err = Threshold::new(usd(Decimal::MAX), dec!(2)).unwrap_err();
        assert!(matches!(err, TopupError::InvalidConfig(ref msg) if msg.contains("overflows")));
        assert!(Threshold::new(usd(Decimal::MAX), Decimal::ONE).is_ok());
    }

    #[test]
    fn threshold_equality_is_not_sufficient() {
        let threshold = Threshold::without_fuzz(usd(dec!(100)));
        assert!(!threshold.is_satisfied_by(dec!(100)));
        assert!(threshold.is_satisfied_by(dec!(100.01)));
    }

    #[test]
    fn fuzz_is_applied_before_comparison() {
        let threshold = Threshold::new(usd(dec!(100)), dec!(1.05)).unwrap();
        assert_eq!(threshold.effective(), dec!(105));
        assert!(!threshold.is_satisfied_by(dec!(104.99)));
        assert!(!threshold.is_satisfied_by(dec!(105)));
        assert!(threshold.is_satisfied_by(dec!(105.000001)));
    }

    #[test]
    fn zero_fuzz_is_rejected() {
        assert!(Threshold::new(usd(dec!(100)), Decimal::ZERO).is_err());
    }

    #[test]
    fn snapshot_rejects_garbage_decimals() {
        let err = AccountSnapshot::parse("acc", "USD", "12.5", "abc").unwrap_err();
        assert!(matches!(err, TopupError::InvalidDecimal { ref field, .. } if field == "available"));

        let ok = AccountSnapshot::parse("acc", "USD", "12.5000000000", "10.25").unwrap();
        assert_eq!(ok.balance, dec!(12.5));
        assert_eq!(ok.available, dec!(10.25));
    }
}
