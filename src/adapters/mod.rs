pub mod coinbase_rest;

pub use coinbase_rest::{CoinbaseClient, Credentials};
