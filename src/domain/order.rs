use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TopupError};

use super::Currency;

/// Order side; the workflow only buys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
}

/// Trading pair such as `BTC-USD`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId {
    id: String,
    base: Currency,
    quote: Currency,
}

impl ProductId {
    pub fn new(raw: &str) -> Result<Self> {
        let (base, quote) = raw.trim().split_once('-').ok_or_else(|| {
            TopupError::Validation(format!("product id '{}' must look like BASE-QUOTE", raw))
        })?;
        let base = Currency::new(base)?;
        let quote = Currency::new(quote)?;
        Ok(Self {
            id: format!("{}-{}", base, quote),
            base,
            quote,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn base(&self) -> &Currency {
        &self.base
    }

    pub fn quote(&self) -> &Currency {
        &self.quote
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

impl TryFrom<String> for ProductId {
    type Error = TopupError;

    fn try_from(raw: String) -> Result<Self> {
        Self::new(&raw)
    }
}

impl From<ProductId> for String {
    fn from(product: ProductId) -> Self {
        product.id
    }
}

/// Best bid at query time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookTop {
    pub price: Decimal,
    pub size: Decimal,
}

/// Order request (what we want the exchange to do)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_oid: String,
    pub product: ProductId,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub limit_price: Decimal,
    pub size: Decimal,
}

impl OrderRequest {
    pub fn buy_limit(product: ProductId, size: Decimal, price: Decimal) -> Self {
        Self {
            client_oid: Uuid::new_v4().to_string(),
            product,
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            limit_price: price,
            size,
        }
    }

    /// Quote-currency value if the order fills at its limit
    pub fn notional(&self) -> Decimal {
        self.limit_price * self.size
    }
}
