//! Wallet balances across EVM chains from The Graph token API.
//!
//! [`BalanceClient`] is the typed entry point. The free functions below wrap
//! it for agent tooling: they never fail, and report problems in the
//! `error` field of the returned record instead.

mod api;
mod chain;
mod client;
mod config;
mod error;
mod fetcher;
mod format;
mod pagination;
mod symbol;
mod types;

pub use api::{BalanceQuery, HttpTokenApi, RawNativeBalance, RawTokenBalance, TokenApi};
pub use chain::{resolve as resolve_chain, supported_networks, ChainInfo, SUPPORTED_CHAINS};
pub use client::BalanceClient;
pub use config::{ClientConfig, API_KEY_ENV, API_URL_ENV, DEFAULT_BASE_URL};
pub use error::{BalanceError, Result};
pub use fetcher::{BalanceFetcher, DEFAULT_DECIMALS};
pub use format::{divisor_for, format_amount, format_usd, usd_value};
pub use pagination::{
    BackoffPolicy, ExponentialBackoff, FixedBackoff, PageEvent, PageObserver, PaginationConfig,
    Paginator, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE,
};
pub use symbol::{find_by_symbol, SymbolFilter};
pub use types::{
    NativeBalance, NativeBalanceRecord, PagedResult, TokenBalance, TokenBalanceRecord,
    TokenListRecord, NATIVE_DECIMALS,
};

/// Native coin balance of `address` on `network`.
///
/// `api_key` falls back to `THEGRAPH_API_KEY`.
pub async fn get_native_balance(address: &str, network: &str, api_key: Option<&str>) -> NativeBalanceRecord {
    match BalanceClient::new(api_key.map(str::to_string)) {
        Ok(client) => {
            let record = client.native_balance_record(address, network).await;
            client.close();
            record
        }
        Err(err) => {
            let chain = chain::resolve(network);
            let symbol = chain.map_or("ETH", |c| c.native_symbol);
            NativeBalanceRecord::failure(symbol, chain, &err)
        }
    }
}

/// Balance of the token called `token_symbol` (any case).
pub async fn get_token_balance(
    address: &str,
    token_symbol: &str,
    network: &str,
    api_key: Option<&str>,
) -> TokenBalanceRecord {
    match BalanceClient::new(api_key.map(str::to_string)) {
        Ok(client) => {
            let record = client.token_balance_record(address, token_symbol, network).await;
            client.close();
            record
        }
        Err(err) => TokenBalanceRecord::failure(token_symbol, chain::resolve(network), &err),
    }
}

/// Every token held, or only those in `token_symbols` when given.
pub async fn get_multiple_token_balances<S: AsRef<str>>(
    address: &str,
    network: &str,
    token_symbols: Option<&[S]>,
    api_key: Option<&str>,
) -> TokenListRecord {
    match BalanceClient::new(api_key.map(str::to_string)) {
        Ok(client) => {
            let record = client.token_list_record(address, network, token_symbols).await;
            client.close();
            record
        }
        Err(err) => TokenListRecord {
            tokens: Vec::new(),
            error: Some(err.to_string()),
        },
    }
}
