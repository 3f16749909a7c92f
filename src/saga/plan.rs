use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::AppConfig;
use crate::domain::{Currency, Money, ProductId, Threshold};
use crate::error::{Result, TopupError};
use crate::exchange::{ConversionRequest, FundingSource, FundingSourceKind, TransferRequest};

/// One product to buy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLeg {
    pub product: ProductId,
    /// Quote-currency amount to spend
    pub buy_amount: Decimal,
    pub base_increment: String,
    /// Added to the best bid to get the limit price
    pub price_margin: Decimal,
}

/// Typed, validated description of one saga run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaPlan {
    pub account_id: String,
    pub threshold: Threshold,
    pub funding: Option<TransferRequest>,
    pub conversion: Option<ConversionRequest>,
    pub legs: Vec<OrderLeg>,
}

impl SagaPlan {
    /// Validate `config` and convert it into domain values.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|errors| TopupError::InvalidConfig(errors.join("; ")))?;

        let account_currency = Currency::new(&config.account.currency)?;
        let threshold = Threshold::new(
            Money::new(config.threshold.amount, account_currency.clone()),
            config.threshold.fuzz,
        )?;

        let legs = config
            .orders
            .iter()
            .map(|leg| {
                Ok(OrderLeg {
                    product: ProductId::new(&leg.product)?,
                    buy_amount: leg.buy_amount,
                    base_increment: leg.base_increment.trim().to_string(),
                    price_margin: leg.price_margin,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let total_buy = config.total_buy_amount();

        let funding = match &config.funding {
            Some(funding) => {
                let source: FundingSource = FundingSourceKind::from_str(&funding.source)?
                    .with_id(funding.source_id.trim());
                Some(TransferRequest {
                    amount: Money::new(
                        funding.amount.unwrap_or(total_buy),
                        account_currency.clone(),
                    ),
                    source,
                })
            }
            None => None,
        };

        let conversion = match &config.conversion {
            Some(conversion) => Some(ConversionRequest {
                amount: total_buy,
                from: Currency::new(&conversion.from)?,
                to: Currency::new(&conversion.to)?,
            }),
            None => None,
        };

        Ok(Self {
            account_id: config.account.id.trim().to_string(),
            threshold,
            funding,
            conversion,
            legs,
        })
    }

    pub fn is_fund_only(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn total_buy_amount(&self) -> Decimal {
        self.legs.iter().map(|leg| leg.buy_amount).sum()
    }
}
