use tracing::debug;

use crate::api::{BalanceQuery, RawNativeBalance, RawTokenBalance, TokenApi};
use crate::chain::ChainInfo;
use crate::error::{BalanceError, Result};
use crate::format::divisor_for;
use crate::types::{NativeBalance, TokenBalance};

/// Decimals assumed when the API omits them.
pub const DEFAULT_DECIMALS: u32 = 18;

const NATIVE_QUERY_LIMIT: u32 = 10;
// ERC-20 decimals are a uint8
const MAX_DECIMALS: u32 = 255;

/// Single-request balance lookups for any supported chain.
#[derive(Debug, Clone)]
pub struct BalanceFetcher<A> {
    api: A,
}

impl<A: TokenApi> BalanceFetcher<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Native coin balance, `None` when the API has no entry for the address.
    pub async fn fetch_native(&self, address: &str, chain: &ChainInfo) -> Result<Option<NativeBalance>> {
        let query = BalanceQuery {
            network: chain.network_param.to_string(),
            address: address.to_string(),
            limit: NATIVE_QUERY_LIMIT,
            page: 1,
            include_null_balances: true,
        };

        let entries = self.api.native_balances(&query).await?;
        let Some(entry) = entries.first() else {
            debug!(address, chain = chain.name, "no native balance entry");
            return Ok(None);
        };

        Ok(Some(NativeBalance {
            chain_id: chain.chain_id.to_string(),
            chain_name: chain.display_name.to_string(),
            raw_amount: native_amount(entry)?,
            symbol: entry
                .symbol
                .as_deref()
                .map(str::trim)
                .filter(|symbol| !symbol.is_empty())
                .unwrap_or(chain.native_symbol)
                .to_string(),
            price_usd: entry.value.map(|price| price.to_string()),
        }))
    }

    /// One page of ERC-20 balances, in upstream order.
    pub async fn fetch_tokens_page(
        &self,
        address: &str,
        chain: &ChainInfo,
        limit: u32,
        page: u32,
    ) -> Result<Vec<TokenBalance>> {
        let query = BalanceQuery {
            network: chain.network_param.to_string(),
            address: address.to_string(),
            limit,
            page,
            include_null_balances: false,
        };

        let entries = self.api.token_balances(&query).await?;
        debug!(address, chain = chain.name, page, count = entries.len(), "token page received");
        entries.iter().map(|entry| token_balance(entry, chain)).collect()
    }
}

fn native_amount(entry: &RawNativeBalance) -> Result<String> {
    let amount = [entry.amount.as_deref(), entry.balance.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|amount| !amount.is_empty())
        .unwrap_or("0");
    integer_string(amount)
}

fn token_balance(entry: &RawTokenBalance, chain: &ChainInfo) -> Result<TokenBalance> {
    let decimals = entry.decimals.unwrap_or(DEFAULT_DECIMALS);
    if decimals > MAX_DECIMALS {
        return Err(BalanceError::InvalidResponse(format!(
            "token decimals {decimals} out of range"
        )));
    }
    let raw_quantity = integer_string(entry.amount.as_deref().map(str::trim).unwrap_or("0"))?;

    Ok(TokenBalance {
        token_address: entry.contract.clone().unwrap_or_default(),
        token_name: entry.name.clone().unwrap_or_else(|| "Unknown".to_string()),
        token_symbol: entry.symbol.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
        raw_quantity,
        divisor: divisor_for(decimals),
        price_usd: entry.value.map(|price| price.to_string()),
        chain_id: chain.chain_id.to_string(),
        chain_name: chain.display_name.to_string(),
    })
}

fn integer_string(value: &str) -> Result<String> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BalanceError::InvalidResponse(format!(
            "amount '{value}' is not a non-negative integer"
        )));
    }
    Ok(value.to_string())
}
