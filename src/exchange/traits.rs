use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::{AccountSnapshot, BookTop, Currency, Money, OrderRequest, OrderSide};
use crate::error::{Result, TopupError};

/// Where top-up money comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum FundingSource {
    /// Bank account or card linked as a payment method
    PaymentMethod(String),
    /// Another wallet/account on the same exchange
    LinkedAccount(String),
}

impl FundingSource {
    pub fn id(&self) -> &str {
        match self {
            Self::PaymentMethod(id) | Self::LinkedAccount(id) => id,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::PaymentMethod(_) => "payment_method",
            Self::LinkedAccount(_) => "linked_account",
        }
    }
}

impl std::fmt::Display for FundingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind_str(), self.id())
    }
}

/// Source kind as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingSourceKind {
    PaymentMethod,
    LinkedAccount,
}

impl FundingSourceKind {
    pub fn with_id(self, id: impl Into<String>) -> FundingSource {
        match self {
            Self::PaymentMethod => FundingSource::PaymentMethod(id.into()),
            Self::LinkedAccount => FundingSource::LinkedAccount(id.into()),
        }
    }
}

impl FromStr for FundingSourceKind {
    type Err = TopupError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "payment_method" | "payment-method" | "bank" => Ok(Self::PaymentMethod),
            "linked_account" | "linked-account" | "coinbase_account" => Ok(Self::LinkedAccount),
            _ => Err(TopupError::InvalidConfig(format!(
                "invalid funding source '{}'; expected payment_method|linked_account",
                raw
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub amount: Money,
    pub source: FundingSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub id: String,
    pub amount: Decimal,
    pub currency: String,
    pub payout_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub amount: Decimal,
    pub from: Currency,
    pub to: Currency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReceipt {
    pub id: String,
    pub amount: Decimal,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub id: String,
    pub product_id: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
    pub status: String,
}

/// Everything the saga needs from an exchange.
///
/// Implementations parse wire payloads into domain types, so callers never see
/// raw decimal strings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn is_dry_run(&self) -> bool;

    async fn get_account(&self, account_id: &str) -> Result<AccountSnapshot>;

    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt>;

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionReceipt>;

    async fn get_best_bid(&self, product_id: &str) -> Result<BookTop>;

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funding_source_kind_accepts_aliases() {
        assert_eq!(
            "payment-method".parse::<FundingSourceKind>().unwrap(),
            FundingSourceKind::PaymentMethod
        );
        assert_eq!(
            "coinbase_account".parse::<FundingSourceKind>().unwrap(),
            FundingSourceKind::LinkedAccount
        );
        assert!("wire".parse::<FundingSourceKind>().is_err());
    }

    #[test]
    fn funding_source_display_names_kind_and_id() {
        let source = FundingSourceKind::PaymentMethod.with_id("pm-1");
        assert_eq!(source.to_string(), "payment_method:pm-1");
        assert_eq!(source.id(), "pm-1");
    }
}
