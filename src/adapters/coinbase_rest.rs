//! Coinbase Pro style REST adapter (native Rust, no external SDK dependency).
//!
//! Every private call is signed with HMAC-SHA256 over
//! `timestamp + METHOD + path + body` using the base64-decoded API secret.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::DEFAULT_REST_URL;
use crate::domain::{parse_decimal, AccountSnapshot, BookTop, OrderRequest, OrderSide, OrderType};
use crate::error::{Result, TopupError};
use crate::exchange::{
    ConversionReceipt, ConversionRequest, ExchangeClient, FundingSource, OrderReceipt,
    TransferReceipt, TransferRequest,
};

type HmacSha256 = Hmac<Sha256>;

/// API key material. Secret and passphrase are wiped on drop.
pub struct Credentials {
    key: String,
    secret: Zeroizing<String>,
    passphrase: Zeroizing<String>,
}

impl Credentials {
    pub fn new(key: String, secret: String, passphrase: String) -> Self {
        Self {
            key,
            secret: Zeroizing::new(secret),
            passphrase: Zeroizing::new(passphrase),
        }
    }

    /// Read `COINBASE_PRO_KEY`, `COINBASE_PRO_SECRET` and `COINBASE_PRO_PASSPHRASE`.
    ///
    /// Returns `None` unless all three are set.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("COINBASE_PRO_KEY").ok()?;
        let secret = Zeroizing::new(std::env::var("COINBASE_PRO_SECRET").ok()?);
        let passphrase = Zeroizing::new(std::env::var("COINBASE_PRO_PASSPHRASE").ok()?);
        Some(Self {
            key,
            secret,
            passphrase,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

// Wire types. Decimals travel as strings in both directions.

#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub id: String,
    pub currency: String,
    pub balance: String,
    pub available: String,
    #[serde(default)]
    pub hold: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookResponse {
    #[serde(default)]
    pub sequence: Option<u64>,
    /// `[price, size, num_orders]` at level 1
    #[serde(default)]
    pub bids: Vec<Vec<Value>>,
    #[serde(default)]
    pub asks: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct PaymentMethodDeposit<'a> {
    amount: String,
    currency: &'a str,
    payment_method_id: &'a str,
}

#[derive(Debug, Serialize)]
struct LinkedAccountDeposit<'a> {
    amount: String,
    currency: &'a str,
    coinbase_account_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct DepositResponse {
    pub id: String,
    pub amount: String,
    pub currency: String,
    #[serde(default)]
    pub payout_at: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConversionBody<'a> {
    from: &'a str,
    to: &'a str,
    amount: String,
}

#[derive(Debug, Deserialize)]
pub struct ConversionResponse {
    pub id: String,
    pub amount: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
    client_oid: &'a str,
    product_id: &'a str,
    side: OrderSide,
    #[serde(rename = "type")]
    order_type: OrderType,
    price: String,
    size: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub product_id: String,
    pub side: OrderSide,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn wire_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

fn level_decimal(level: &[Value], idx: usize, field: &str) -> Result<Decimal> {
    match level.get(idx) {
        Some(Value::String(s)) => parse_decimal(field, s),
        Some(Value::Number(n)) => parse_decimal(field, &n.to_string()),
        other => Err(TopupError::InvalidMarketData(format!(
            "book level missing {}: {:?}",
            field, other
        ))),
    }
}

impl AccountResponse {
    pub fn into_snapshot(self) -> Result<AccountSnapshot> {
        AccountSnapshot::parse(&self.id, &self.currency, &self.balance, &self.available)
    }
}

impl BookResponse {
    pub fn best_bid(&self, product_id: &str) -> Result<BookTop> {
        let level = self.bids.first().ok_or_else(|| {
            TopupError::InvalidMarketData(format!("order book for {} has no bids", product_id))
        })?;
        Ok(BookTop {
            price: level_decimal(level, 0, "bid price")?,
            size: level_decimal(level, 1, "bid size")?,
        })
    }
}

impl OrderResponse {
    fn into_receipt(self, request: &OrderRequest) -> Result<OrderReceipt> {
        let price = match self.price.as_deref() {
            Some(raw) => parse_decimal("order price", raw)?,
            None => request.limit_price,
        };
        let size = match self.size.as_deref() {
            Some(raw) => parse_decimal("order size", raw)?,
            None => request.size,
        };
        Ok(OrderReceipt {
            id: self.id,
            product_id: self.product_id,
            side: self.side,
            price,
            size,
            status: self.status.unwrap_or_else(|| "pending".to_string()),
        })
    }
}

/// Build the `CB-ACCESS-SIGN` value.
pub fn sign_request(
    secret_b64: &str,
    timestamp: &str,
    method: &Method,
    path: &str,
    body: &str,
) -> Result<String> {
    let key = Zeroizing::new(
        BASE64_STANDARD
            .decode(secret_b64.trim())
            .map_err(|e| TopupError::Auth(format!("API secret is not valid base64: {}", e)))?,
    );
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| TopupError::Auth(format!("invalid API secret: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.as_str().to_uppercase().as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

pub struct CoinbaseClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
    dry_run: bool,
}

impl CoinbaseClient {
    pub fn new(base_url: Option<&str>, credentials: Option<Credentials>, dry_run: bool) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_REST_URL)
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder()
            .user_agent("topup-coinbase-adapter/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| TopupError::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            credentials,
            dry_run,
        })
    }

    pub fn from_env(base_url: Option<&str>, dry_run: bool) -> Result<Self> {
        let credentials = Credentials::from_env();
        if credentials.is_none() {
            warn!("COINBASE_PRO_KEY/SECRET/PASSPHRASE not fully set; private calls will fail");
        }
        Self::new(base_url, credentials, dry_run)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_headers(&self, method: &Method, path: &str, body: &str) -> Result<HeaderMap> {
        let creds = self.credentials.as_ref().ok_or_else(|| {
            TopupError::Auth(
                "COINBASE_PRO_KEY, COINBASE_PRO_SECRET and COINBASE_PRO_PASSPHRASE are required"
                    .to_string(),
            )
        })?;

        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_request(&creds.secret, &timestamp, method, path, body)?;

        let header = |value: &str, what: &str| {
            HeaderValue::from_str(value)
                .map_err(|e| TopupError::Auth(format!("invalid {} header: {}", what, e)))
        };

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("cb-access-key"), header(&creds.key, "key")?);
        headers.insert(
            HeaderName::from_static("cb-access-sign"),
            header(&signature, "signature")?,
        );
        headers.insert(
            HeaderName::from_static("cb-access-timestamp"),
            header(&timestamp, "timestamp")?,
        );
        headers.insert(
            HeaderName::from_static("cb-access-passphrase"),
            header(&creds.passphrase, "passphrase")?,
        );
        Ok(headers)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        require_auth: bool,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let body_text = body.unwrap_or_default();

        // Headers are built first so a credential problem never reaches the wire.
        let headers = if require_auth {
            Some(self.auth_headers(&method, path, &body_text)?)
        } else {
            None
        };

        let mut req = self.http.request(method.clone(), &url);
        if let Some(headers) = headers {
            req = req.headers(headers);
        }
        if !body_text.is_empty() {
            req = req.header(CONTENT_TYPE, "application/json").body(body_text);
        }

        debug!(%method, path, "coinbase request");
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TopupError::RateLimited(format!(
                "Coinbase API rate limited for {} {}",
                method, path
            )));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TopupError::Auth(format!(
                "Coinbase API {} {} rejected credentials: status={} body={}",
                method, path, status, text
            )));
        }

        if !status.is_success() {
            return Err(TopupError::Exchange {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    pub async fn get_account(&self, account_id: &str) -> Result<AccountSnapshot> {
        let path = format!("/accounts/{}", account_id);
        let account: AccountResponse = self.request_json(Method::GET, &path, None, true).await?;
        debug!(
            account_id,
            balance = %account.balance,
            available = %account.available,
            hold = account.hold.as_deref().unwrap_or("-"),
            "account fetched"
        );
        account.into_snapshot()
    }

    pub async fn get_best_bid(&self, product_id: &str) -> Result<BookTop> {
        let path = format!("/products/{}/book?level=1", product_id);
        let book: BookResponse = self.request_json(Method::GET, &path, None, false).await?;
        book.best_bid(product_id)
    }

    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        if self.dry_run {
            info!(amount = %request.amount, source = %request.source, "dry run: skipping transfer");
            return Ok(TransferReceipt {
                id: format!("dry-run-{}", Uuid::new_v4()),
                amount: request.amount.amount,
                currency: request.amount.currency.to_string(),
                payout_at: None,
            });
        }

        let amount = wire_decimal(request.amount.amount);
        let currency = request.amount.currency.as_str();
        let (path, body) = match &request.source {
            FundingSource::PaymentMethod(id) => (
                "/deposits/payment-method",
                serde_json::to_string(&PaymentMethodDeposit {
                    amount,
                    currency,
                    payment_method_id: id,
                })?,
            ),
            FundingSource::LinkedAccount(id) => (
                "/deposits/coinbase-account",
                serde_json::to_string(&LinkedAccountDeposit {
                    amount,
                    currency,
                    coinbase_account_id: id,
                })?,
            ),
        };

        let deposit: DepositResponse = self
            .request_json(Method::POST, path, Some(body), true)
            .await?;
        Ok(TransferReceipt {
            amount: parse_decimal("deposit amount", &deposit.amount)?,
            id: deposit.id,
            currency: deposit.currency,
            payout_at: deposit.payout_at,
        })
    }

    pub async fn convert(&self, request: &ConversionRequest) -> Result<ConversionReceipt> {
        if self.dry_run {
            info!(amount = %request.amount, from = %request.from, to = %request.to, "dry run: skipping conversion");
            return Ok(ConversionReceipt {
                id: format!("dry-run-{}", Uuid::new_v4()),
                amount: request.amount,
                from: request.from.to_string(),
                to: request.to.to_string(),
            });
        }

        let body = serde_json::to_string(&ConversionBody {
            from: request.from.as_str(),
            to: request.to.as_str(),
            amount: wire_decimal(request.amount),
        })?;
        let conversion: ConversionResponse = self
            .request_json(Method::POST, "/conversions", Some(body), true)
            .await?;
        Ok(ConversionReceipt {
            amount: parse_decimal("conversion amount", &conversion.amount)?,
            id: conversion.id,
            from: conversion.from.unwrap_or_else(|| request.from.to_string()),
            to: conversion.to.unwrap_or_else(|| request.to.to_string()),
        })
    }

    pub async fn submit_order(&self, request: &OrderRequest) -> Result<OrderReceipt> {
        if self.dry_run {
            info!(
                product = %request.product,
                price = %request.limit_price,
                size = %request.size,
                "dry run: skipping order"
            );
            return Ok(OrderReceipt {
                id: request.client_oid.clone(),
                product_id: request.product.to_string(),
                side: request.side,
                price: request.limit_price,
                size: request.size,
                status: "dry_run".to_string(),
            });
        }

        let body = serde_json::to_string(&OrderBody {
            client_oid: &request.client_oid,
            product_id: request.product.as_str(),
            side: request.side,
            order_type: request.order_type,
            price: wire_decimal(request.limit_price),
            size: wire_decimal(request.size),
        })?;
        let order: OrderResponse = self
            .request_json(Method::POST, "/orders", Some(body), true)
            .await?;
        order.into_receipt(request)
    }
}

#[async_trait]
impl ExchangeClient for CoinbaseClient {
    fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn get_account(&self, account_id: &str) -> Result<AccountSnapshot> {
        CoinbaseClient::get_account(self, account_id).await
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        CoinbaseClient::transfer(self, request).await
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionReceipt> {
        CoinbaseClient::convert(self, request).await
    }

    async fn get_best_bid(&self, product_id: &str) -> Result<BookTop> {
        CoinbaseClient::get_best_bid(self, product_id).await
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderReceipt> {
        CoinbaseClient::submit_order(self, request).await
    }
}
