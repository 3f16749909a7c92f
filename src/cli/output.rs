//! Output formatting for `topup` commands.
//!
//! Human-readable tables by default, JSON with `--json`.

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::domain::{AccountSnapshot, BookTop, OrderRequest};
use crate::saga::SagaReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(items)?);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
pub struct BalanceRow {
    pub account: String,
    pub currency: String,
    pub balance: String,
    pub available: String,
}

impl From<&AccountSnapshot> for BalanceRow {
    fn from(snapshot: &AccountSnapshot) -> Self {
        Self {
            account: snapshot.account_id.clone(),
            currency: snapshot.currency.to_string(),
            balance: snapshot.balance.normalize().to_string(),
            available: snapshot.available.normalize().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct BookRow {
    pub product: String,
    pub best_bid: String,
    pub size: String,
}

impl BookRow {
    pub fn new(product: &str, top: &BookTop) -> Self {
        Self {
            product: product.to_string(),
            best_bid: top.price.normalize().to_string(),
            size: top.size.normalize().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct OrderRow {
    pub product: String,
    pub side: String,
    pub size: String,
    pub limit_price: String,
    pub notional: String,
}

impl From<&OrderRequest> for OrderRow {
    fn from(order: &OrderRequest) -> Self {
        Self {
            product: order.product.to_string(),
            side: order.side.to_string(),
            size: order.size.normalize().to_string(),
            limit_price: order.limit_price.normalize().to_string(),
            notional: order.notional().normalize().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct TransitionRow {
    pub at: String,
    pub from: String,
    pub to: String,
    pub reason: String,
}

/// State history of a finished run.
pub fn print_report(report: &SagaReport, mode: OutputMode) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    let rows: Vec<TransitionRow> = report
        .transitions
        .iter()
        .map(|t| TransitionRow {
            at: t.timestamp.format("%H:%M:%S%.3f").to_string(),
            from: t.from.to_string(),
            to: t.to.to_string(),
            reason: t.reason.clone(),
        })
        .collect();
    print_items(&rows, mode)
}
