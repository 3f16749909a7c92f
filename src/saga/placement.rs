use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::rounding::{div_round, round_to_increment, SIZE_DIVISION_DP};
use crate::domain::{BookTop, OrderRequest};
use crate::error::{Result, TopupError};
use crate::exchange::{ExchangeClient, OrderReceipt};
use crate::services::MetricsPublisher;

use super::plan::OrderLeg;

/// Smallest base size the exchange accepts
pub const MIN_ORDER_SIZE: Decimal = dec!(0.001);

/// Base size for `buy_amount` at `best_bid`, truncated to the leg's increment.
pub fn compute_order_size(buy_amount: Decimal, best_bid: Decimal, increment: &str) -> Result<Decimal> {
    let raw = div_round(buy_amount, best_bid, SIZE_DIVISION_DP)?;
    let size = round_to_increment(raw, increment)?;
    debug!(%raw, %size, increment, "sized order");

    if size < MIN_ORDER_SIZE {
        return Err(TopupError::OrderTooSmall {
            size,
            minimum: MIN_ORDER_SIZE,
        });
    }
    Ok(size)
}

/// Prices, sizes and submits one limit buy per leg.
pub struct OrderPlacement {
    exchange: Arc<dyn ExchangeClient>,
    metrics: MetricsPublisher,
}

impl OrderPlacement {
    pub fn new(exchange: Arc<dyn ExchangeClient>, metrics: MetricsPublisher) -> Self {
        Self { exchange, metrics }
    }

    pub async fn fetch_top(&self, leg: &OrderLeg) -> Result<BookTop> {
        let top = self.exchange.get_best_bid(leg.product.as_str()).await?;
        if top.price <= Decimal::ZERO {
            return Err(TopupError::InvalidMarketData(format!(
                "best bid for {} is {}",
                leg.product, top.price
            )));
        }
        debug!(product = %leg.product, bid = %top.price, bid_size = %top.size, "top of book");
        Ok(top)
    }

    /// Limit buy at best bid plus the leg margin.
    pub fn build_order(&self, leg: &OrderLeg, top: &BookTop) -> Result<OrderRequest> {
        let size = compute_order_size(leg.buy_amount, top.price, &leg.base_increment)?;
        let price = top.price + leg.price_margin;
        Ok(OrderRequest::buy_limit(leg.product.clone(), size, price))
    }

    /// One submission, no retry. `top` is the book the request was sized from.
    pub async fn submit(&self, request: &OrderRequest, top: &BookTop) -> Result<OrderReceipt> {
        info!(
            product = %request.product,
            side = %request.side,
            price = %request.limit_price,
            size = %request.size,
            client_oid = %request.client_oid,
            "placing order"
        );
        let receipt = self.exchange.submit_order(request).await?;

        let label = request.product.as_str();
        self.metrics.gauge_labeled("last_price", label, top.price);
        self.metrics.gauge_labeled("order_size", label, request.size);

        info!(order_id = %receipt.id, status = %receipt.status, "order accepted");
        Ok(receipt)
    }

    pub async fn place_order(&self, leg: &OrderLeg) -> Result<OrderReceipt> {
        let top = self.fetch_top(leg).await?;
        let request = self.build_order(leg, &top)?;
        self.submit(&request, &top).await
    }
}
