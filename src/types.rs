use serde::{Deserialize, Serialize};

use crate::chain::{self, ChainInfo};
use crate::error::{BalanceError, Result};
use crate::format::{divisor_for, format_amount, usd_value};

/// Native coins on every supported chain use 18 decimals.
pub const NATIVE_DECIMALS: u32 = 18;

/// A wallet's holding of the chain's base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeBalance {
    pub chain_id: String,
    pub chain_name: String,
    /// Smallest-unit integer, base 10. `"0"` is a real zero balance.
    pub raw_amount: String,
    pub symbol: String,
    pub price_usd: Option<String>,
}

impl NativeBalance {
    pub fn formatted(&self) -> Result<String> {
        format_amount(&self.raw_amount, &divisor_for(NATIVE_DECIMALS))
    }
}

/// A wallet's holding of one ERC-20 token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub raw_quantity: String,
    /// `10^decimals` as a string
    pub divisor: String,
    /// Per-unit price as reported upstream
    pub price_usd: Option<String>,
    pub chain_id: String,
    pub chain_name: String,
}

impl TokenBalance {
    pub fn decimals(&self) -> u32 {
        self.divisor.len().saturating_sub(1) as u32
    }

    pub fn formatted(&self) -> Result<String> {
        format_amount(&self.raw_quantity, &self.divisor)
    }

    /// Balance times unit price, `0.0` when there is no usable price.
    pub fn usd_value(&self) -> f64 {
        match (&self.price_usd, self.formatted()) {
            (Some(price), Ok(balance)) => usd_value(&balance, price),
            _ => 0.0,
        }
    }
}

/// Items gathered by a multi-page fetch, plus the error that stopped it.
///
/// Items fetched before a failure are always kept.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub error: Option<BalanceError>,
}

impl<T> PagedResult<T> {
    pub fn complete(items: Vec<T>) -> Self {
        Self { items, error: None }
    }

    pub fn partial(items: Vec<T>, error: BalanceError) -> Self {
        Self {
            items,
            error: Some(error),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Flat native-balance shape handed to agent tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeBalanceRecord {
    pub token_type: String,
    pub token_symbol: String,
    pub token_address: String,
    pub balance: String,
    pub balance_raw: String,
    pub decimals: u32,
    pub chain_name: Option<String>,
    pub chain_id: Option<String>,
    pub error: Option<String>,
}

impl NativeBalanceRecord {
    pub fn from_balance(native: &NativeBalance) -> Self {
        let balance = match native.formatted() {
            Ok(balance) => balance,
            Err(err) => return Self::failure(&native.symbol, chain::resolve(&native.chain_id), &err),
        };
        Self {
            token_type: "native".to_string(),
            token_symbol: native.symbol.clone(),
            token_address: "0x0".to_string(),
            balance,
            balance_raw: native.raw_amount.clone(),
            decimals: NATIVE_DECIMALS,
            chain_name: Some(native.chain_name.clone()),
            chain_id: Some(native.chain_id.clone()),
            error: None,
        }
    }

    /// Zero balance on a known chain; not an error.
    pub fn zero(chain: &ChainInfo) -> Self {
        Self {
            token_type: "native".to_string(),
            token_symbol: chain.native_symbol.to_string(),
            token_address: "0x0".to_string(),
            balance: "0".to_string(),
            balance_raw: "0".to_string(),
            decimals: NATIVE_DECIMALS,
            chain_name: Some(chain.display_name.to_string()),
            chain_id: Some(chain.chain_id.to_string()),
            error: None,
        }
    }

    pub fn failure(symbol: &str, chain: Option<&ChainInfo>, error: &BalanceError) -> Self {
        Self {
            token_type: "native".to_string(),
            token_symbol: symbol.to_string(),
            token_address: "0x0".to_string(),
            balance: "0".to_string(),
            balance_raw: "0".to_string(),
            decimals: NATIVE_DECIMALS,
            chain_name: chain.map(|c| c.display_name.to_string()),
            chain_id: chain.map(|c| c.chain_id.to_string()),
            error: Some(error.to_string()),
        }
    }
}

/// Flat ERC-20 shape handed to agent tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalanceRecord {
    pub token_type: String,
    pub token_symbol: String,
    pub token_address: String,
    pub token_name: Option<String>,
    pub balance: String,
    pub balance_raw: String,
    pub decimals: u32,
    /// Two-decimal USD value, e.g. `"1000.00"`
    pub usd_value: Option<String>,
    pub chain_name: Option<String>,
    pub chain_id: Option<String>,
    pub error: Option<String>,
}

impl TokenBalanceRecord {
    pub fn from_balance(token: &TokenBalance) -> Self {
        let balance = match token.formatted() {
            Ok(balance) => balance,
            Err(err) => return Self::failure(&token.token_symbol, chain::resolve(&token.chain_id), &err),
        };
        Self {
            token_type: "ERC20".to_string(),
            token_symbol: token.token_symbol.clone(),
            token_address: token.token_address.clone(),
            token_name: Some(token.token_name.clone()),
            balance,
            balance_raw: token.raw_quantity.clone(),
            decimals: token.decimals(),
            usd_value: Some(format!("{:.2}", token.usd_value())),
            chain_name: Some(token.chain_name.clone()),
            chain_id: Some(token.chain_id.clone()),
            error: None,
        }
    }

    /// The wallet holds none of `symbol` on `chain`; not an error.
    pub fn not_held(symbol: &str, chain: &ChainInfo) -> Self {
        Self {
            token_type: "ERC20".to_string(),
            token_symbol: symbol.to_uppercase(),
            token_address: String::new(),
            token_name: None,
            balance: "0".to_string(),
            balance_raw: "0".to_string(),
            decimals: NATIVE_DECIMALS,
            usd_value: None,
            chain_name: Some(chain.display_name.to_string()),
            chain_id: Some(chain.chain_id.to_string()),
            error: None,
        }
    }

    pub fn failure(symbol: &str, chain: Option<&ChainInfo>, error: &BalanceError) -> Self {
        Self {
            token_type: "ERC20".to_string(),
            token_symbol: symbol.to_uppercase(),
            token_address: String::new(),
            token_name: None,
            balance: "0".to_string(),
            balance_raw: "0".to_string(),
            decimals: NATIVE_DECIMALS,
            usd_value: None,
            chain_name: chain.map(|c| c.display_name.to_string()),
            chain_id: chain.map(|c| c.chain_id.to_string()),
            error: Some(error.to_string()),
        }
    }
}

/// Every token of a wallet, with the error that cut the listing short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenListRecord {
    pub tokens: Vec<TokenBalanceRecord>,
    pub error: Option<String>,
}

impl From<PagedResult<TokenBalance>> for TokenListRecord {
    fn from(result: PagedResult<TokenBalance>) -> Self {
        Self {
            tokens: result.items.iter().map(TokenBalanceRecord::from_balance).collect(),
            error: result.error.map(|err| err.to_string()),
        }
    }
}
