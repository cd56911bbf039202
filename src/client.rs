use tracing::debug;

use crate::api::{HttpTokenApi, TokenApi};
use crate::chain::{self, ChainInfo};
use crate::config::ClientConfig;
use crate::error::{BalanceError, Result};
use crate::fetcher::BalanceFetcher;
use crate::pagination::{PageEvent, PaginationConfig, Paginator};
use crate::symbol::{find_by_symbol, SymbolFilter};
use crate::types::{
    NativeBalance, NativeBalanceRecord, PagedResult, TokenBalance, TokenBalanceRecord,
    TokenListRecord,
};

/// Balance lookups across every supported chain with one API key.
///
/// The client owns a single HTTP session. [`BalanceClient::close`] ends it
/// explicitly; dropping the client (on error, panic, or a cancelled timeout)
/// releases it as well.
#[derive(Debug)]
pub struct BalanceClient<A = HttpTokenApi> {
    fetcher: BalanceFetcher<A>,
    paginator: Paginator,
}

impl BalanceClient<HttpTokenApi> {
    /// Uses `api_key` when given, otherwise `THEGRAPH_API_KEY`.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::from_config(ClientConfig::from_env().with_api_key(api_key))
    }

    /// Fails before any network access when the config has no key.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let api_key = config.require_api_key()?;
        let api = HttpTokenApi::new(api_key, &config.base_url, config.request_timeout())?;
        debug!(base_url = %config.base_url, "balance client opened");
        Ok(Self::with_api(api, config.pagination))
    }
}

impl<A: TokenApi> BalanceClient<A> {
    pub fn with_api(api: A, pagination: PaginationConfig) -> Self {
        Self {
            fetcher: BalanceFetcher::new(api),
            paginator: Paginator::new(pagination),
        }
    }

    pub fn with_paginator(mut self, paginator: Paginator) -> Self {
        self.paginator = paginator;
        self
    }

    /// Report multi-page progress to `observer`.
    pub fn on_progress(mut self, observer: impl Fn(&PageEvent) + Send + Sync + 'static) -> Self {
        self.paginator = self.paginator.with_observer(observer);
        self
    }

    pub fn close(self) {
        debug!("balance client closed");
    }

    fn chain(network: &str) -> Result<&'static ChainInfo> {
        chain::resolve(network).ok_or_else(|| BalanceError::UnsupportedNetwork(network.to_string()))
    }

    pub async fn get_native_balance(&self, address: &str, network: &str) -> Result<Option<NativeBalance>> {
        let chain = Self::chain(network)?;
        self.fetcher.fetch_native(address, chain).await
    }

    /// One page of token balances; no retries.
    pub async fn get_token_balances(
        &self,
        address: &str,
        network: &str,
        limit: u32,
        page: u32,
    ) -> Result<Vec<TokenBalance>> {
        let chain = Self::chain(network)?;
        self.fetcher.fetch_tokens_page(address, chain, limit, page).await
    }

    /// Every token balance, paginated to exhaustion or the page ceiling.
    pub async fn get_all_token_balances(
        &self,
        address: &str,
        network: &str,
        filter: Option<&SymbolFilter>,
    ) -> PagedResult<TokenBalance> {
        match Self::chain(network) {
            Ok(chain) => {
                self.paginator
                    .fetch_all_tokens(&self.fetcher, address, chain, filter)
                    .await
            }
            Err(err) => PagedResult::partial(Vec::new(), err),
        }
    }

    /// Looks the symbol up in a single full pagination run.
    ///
    /// A match among the tokens fetched before a failure still counts.
    pub async fn get_token_balance_by_symbol(
        &self,
        address: &str,
        symbol: &str,
        network: &str,
    ) -> Result<Option<TokenBalance>> {
        let filter = SymbolFilter::new([symbol]);
        let result = self.get_all_token_balances(address, network, Some(&filter)).await;

        match (find_by_symbol(&result.items, symbol), result.error) {
            (Some(token), _) => Ok(Some(token.clone())),
            (None, Some(err)) => Err(err),
            (None, None) => Ok(None),
        }
    }

    pub async fn native_balance_record(&self, address: &str, network: &str) -> NativeBalanceRecord {
        let chain = match Self::chain(network) {
            Ok(chain) => chain,
            Err(err) => return NativeBalanceRecord::failure("ETH", None, &err),
        };

        match self.fetcher.fetch_native(address, chain).await {
            Ok(Some(native)) => NativeBalanceRecord::from_balance(&native),
            Ok(None) => NativeBalanceRecord::zero(chain),
            Err(err) => NativeBalanceRecord::failure(chain.native_symbol, Some(chain), &err),
        }
    }

    pub async fn token_balance_record(&self, address: &str, symbol: &str, network: &str) -> TokenBalanceRecord {
        match self.get_token_balance_by_symbol(address, symbol, network).await {
            Ok(Some(token)) => TokenBalanceRecord::from_balance(&token),
            Ok(None) => match chain::resolve(network) {
                Some(chain) => TokenBalanceRecord::not_held(symbol, chain),
                None => TokenBalanceRecord::failure(
                    symbol,
                    None,
                    &BalanceError::UnsupportedNetwork(network.to_string()),
                ),
            },
            Err(err) => TokenBalanceRecord::failure(symbol, chain::resolve(network), &err),
        }
    }

    pub async fn token_list_record<S: AsRef<str>>(
        &self,
        address: &str,
        network: &str,
        symbols: Option<&[S]>,
    ) -> TokenListRecord {
        let filter = symbols.map(SymbolFilter::new);
        self.get_all_token_balances(address, network, filter.as_ref())
            .await
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{full_page, raw_token, ScriptedApi};
    use crate::api::RawNativeBalance;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    const ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb0";

    fn client(api: &Arc<ScriptedApi>) -> BalanceClient<Arc<ScriptedApi>> {
        BalanceClient::with_api(
            api.clone(),
            PaginationConfig {
                request_delay_ms: 0,
                rate_limit_cooldown_ms: 0,
                ..PaginationConfig::default()
            },
        )
    }

    fn native(amount: &str) -> RawNativeBalance {
        RawNativeBalance {
            amount: Some(amount.to_string()),
            ..RawNativeBalance::default()
        }
    }

    #[test]
    fn test_missing_key_fails_at_construction() {
        let err = assert_err!(BalanceClient::from_config(ClientConfig::default()));
        assert!(matches!(err, BalanceError::Configuration(_)));
    }

    #[test]
    fn test_explicit_key_opens_and_closes() {
        let config = ClientConfig::default().with_api_key(Some("jwt".to_string()));
        let client = assert_ok!(BalanceClient::from_config(config));
        client.close();
    }

    #[tokio::test]
    async fn test_unsupported_network_is_an_error() {
        let api = Arc::new(ScriptedApi::new());
        let client = client(&api);

        let err = client.get_native_balance(ADDRESS, "notachain").await.unwrap_err();
        assert_eq!(err, BalanceError::UnsupportedNetwork("notachain".to_string()));

        let err = client.get_token_balances(ADDRESS, "solana", 10, 1).await.unwrap_err();
        assert!(matches!(err, BalanceError::UnsupportedNetwork(_)));

        let all = client.get_all_token_balances(ADDRESS, "notachain", None).await;
        assert!(all.items.is_empty());
        assert!(matches!(all.error, Some(BalanceError::UnsupportedNetwork(_))));

        assert!(api.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_native_balance_by_chain_id() {
        let api = Arc::new(ScriptedApi::new().native(Ok(vec![native("1500000000000000000")])));
        let native = client(&api)
            .get_native_balance(ADDRESS, "8453")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(native.chain_name, "Base");
        assert_eq!(native.formatted().unwrap(), "1.5");
    }

    #[tokio::test]
    async fn test_single_page_passes_limit_and_page() {
        let api = Arc::new(ScriptedApi::new().page(Ok(full_page(4, 5))));
        let tokens = client(&api)
            .get_token_balances(ADDRESS, "optimism", 5, 4)
            .await
            .unwrap();
        assert_eq!(tokens.len(), 5);

        let requests = api.requests.lock().unwrap();
        assert_eq!((requests[0].limit, requests[0].page), (5, 4));
        assert_eq!(requests[0].network, "optimism");
    }

    #[tokio::test]
    async fn test_symbol_lookup_fetches_once_and_ignores_case() {
        let mut second_page = full_page(2, 3);
        second_page.push(raw_token("USDC", "2500000", 6));
        let api = Arc::new(ScriptedApi::new().page(Ok(full_page(1, 10))).page(Ok(second_page)));

        let token = client(&api)
            .get_token_balance_by_symbol(ADDRESS, "usdc", "ethereum")
            .await
            .unwrap()
            .expect("USDC is on page two");
        assert_eq!(token.token_symbol, "USDC");
        assert_eq!(token.formatted().unwrap(), "2.5");
        assert_eq!(api.pages_requested(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_symbol_not_held_is_not_an_error() {
        let api = Arc::new(ScriptedApi::new().page(Ok(full_page(1, 3))));
        let found = client(&api)
            .get_token_balance_by_symbol(ADDRESS, "WETH", "polygon")
            .await;
        assert_eq!(found, Ok(None));
    }

    #[tokio::test]
    async fn test_symbol_lookup_surfaces_failure_without_match() {
        let api = Arc::new(ScriptedApi::new().page(Err(BalanceError::Authentication)));
        let found = client(&api)
            .get_token_balance_by_symbol(ADDRESS, "WETH", "polygon")
            .await;
        assert_eq!(found, Err(BalanceError::Authentication));
    }

    #[tokio::test]
    async fn test_symbol_match_before_failure_is_kept() {
        let mut first = full_page(1, 9);
        first.push(raw_token("DAI", "1000000000000000000", 18));
        let api = Arc::new(
            ScriptedApi::new()
                .page(Ok(first))
                .page(Err(BalanceError::Timeout)),
        );
        let found = client(&api)
            .get_token_balance_by_symbol(ADDRESS, "dai", "1")
            .await
            .unwrap();
        assert_eq!(found.unwrap().token_symbol, "DAI");
    }

    #[tokio::test]
    async fn test_native_records() {
        let api = Arc::new(
            ScriptedApi::new()
                .native(Ok(vec![native("0")]))
                .native(Err(BalanceError::Authentication))
                .native(Ok(vec![native("42000000000000000000")])),
        );
        let client = client(&api);

        let zero = client.native_balance_record(ADDRESS, "polygon").await;
        assert_eq!(zero.balance, "0");
        assert_eq!(zero.token_symbol, "MATIC");
        assert!(zero.error.is_none());

        let failed = client.native_balance_record(ADDRESS, "polygon").await;
        assert_eq!(failed.balance, "0");
        assert!(failed.error.unwrap().contains("authentication failed"));

        let funded = client.native_balance_record(ADDRESS, "avalanche").await;
        assert_eq!(funded.balance, "42");
        assert_eq!(funded.balance_raw, "42000000000000000000");
        assert_eq!(funded.chain_id.as_deref(), Some("43114"));

        let unsupported = client.native_balance_record(ADDRESS, "dogechain").await;
        assert_eq!(unsupported.error.as_deref(), Some("Unsupported network: dogechain"));
    }

    #[tokio::test]
    async fn test_token_records() {
        let mut usdc = raw_token("USDC", "1000000000", 6);
        usdc.value = Some(1.0);
        let api = Arc::new(ScriptedApi::new().page(Ok(vec![usdc])).page(Ok(vec![])));
        let client = client(&api);

        let found = client.token_balance_record(ADDRESS, "usdc", "ethereum").await;
        assert_eq!(found.balance, "1000");
        assert_eq!(found.usd_value.as_deref(), Some("1000.00"));
        assert!(found.error.is_none());

        let missing = client.token_balance_record(ADDRESS, "weth", "ethereum").await;
        assert_eq!(missing.token_symbol, "WETH");
        assert_eq!(missing.balance, "0");
        assert!(missing.error.is_none());
    }

    #[tokio::test]
    async fn test_token_record_failure_keeps_chain() {
        let api = Arc::new(ScriptedApi::new().page(Err(BalanceError::Authorization)));
        let client = client(&api);

        let record = client.token_balance_record(ADDRESS, "usdc", "base").await;
        assert_eq!(record.token_symbol, "USDC");
        assert_eq!(record.chain_name.as_deref(), Some("Base"));
        assert_eq!(record.chain_id.as_deref(), Some("8453"));
        assert!(record.error.is_some());

        let unsupported = client.token_balance_record(ADDRESS, "usdc", "dogechain").await;
        assert_eq!(unsupported.chain_id, None);
        assert_eq!(unsupported.error.as_deref(), Some("Unsupported network: dogechain"));
    }

    #[tokio::test]
    async fn test_token_list_record_with_filter_and_partial_failure() {
        let api = Arc::new(
            ScriptedApi::new()
                .page(Ok({
                    let mut page = full_page(1, 9);
                    page.push(raw_token("LINK", "3000000000000000000", 18));
                    page
                }))
                .page(Err(BalanceError::UpstreamStatus(502))),
        );

        let record = client(&api)
            .token_list_record(ADDRESS, "ethereum", Some(["link"].as_slice()))
            .await;
        assert_eq!(record.tokens.len(), 1);
        assert_eq!(record.tokens[0].balance, "3");
        assert_eq!(record.error.as_deref(), Some("HTTP error! status: 502"));
    }

    #[tokio::test]
    #[ignore] // Requires network access and THEGRAPH_API_KEY
    async fn test_live_native_balance() {
        let client = BalanceClient::new(None).unwrap();
        let result = client
            .get_native_balance("0x1fA33c1CA2d733C895BeFf7a3d468Cee317Be253", "ethereum")
            .await;
        assert!(result.is_ok());
        client.close();
    }
}
