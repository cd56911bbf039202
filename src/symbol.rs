use std::collections::HashSet;

use crate::types::TokenBalance;

/// Set of uppercase token symbols to keep while paginating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolFilter {
    symbols: HashSet<String>,
}

impl SymbolFilter {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, token: &TokenBalance) -> bool {
        self.symbols.contains(&token.token_symbol.to_uppercase())
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// First token whose symbol equals `symbol`, ignoring case.
pub fn find_by_symbol<'a>(tokens: &'a [TokenBalance], symbol: &str) -> Option<&'a TokenBalance> {
    let wanted = symbol.trim().to_uppercase();
    tokens
        .iter()
        .find(|token| token.token_symbol.to_uppercase() == wanted)
}
