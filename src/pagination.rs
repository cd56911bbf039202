//! Walks the token-balance endpoint page by page.
//!
//! Pages are requested strictly in order starting at 1. Every request is
//! preceded by a fixed pause, a rate-limited page is retried in place after
//! the backoff policy's cooldown, and a hard page ceiling bounds the walk.
//! Whatever happens, tokens gathered so far are returned with the error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::TokenApi;
use crate::chain::ChainInfo;
use crate::error::BalanceError;
use crate::fetcher::BalanceFetcher;
use crate::symbol::SymbolFilter;
use crate::types::{PagedResult, TokenBalance};

/// Largest page the token API serves.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_MAX_PAGES: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: u32,
    /// Pause before every page request
    pub request_delay_ms: u64,
    /// Pause before retrying a rate-limited page
    pub rate_limit_cooldown_ms: u64,
    pub max_pages: u32,
    /// `None` retries a rate-limited page for as long as it takes
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            request_delay_ms: 200,
            rate_limit_cooldown_ms: 5_000,
            max_pages: DEFAULT_MAX_PAGES,
            max_rate_limit_retries: None,
        }
    }
}

impl PaginationConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }
}

/// Decides how long to wait before retrying a rate-limited page.
pub trait BackoffPolicy: Send + Sync + fmt::Debug {
    /// Delay before retry `attempt` (1-based), or `None` to give up.
    fn delay(&self, attempt: u32) -> Option<Duration>;
}

/// Same cooldown every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedBackoff {
    pub cooldown: Duration,
    pub max_retries: Option<u32>,
}

impl FixedBackoff {
    pub fn from_config(config: &PaginationConfig) -> Self {
        Self {
            cooldown: config.rate_limit_cooldown(),
            max_retries: config.max_rate_limit_retries,
        }
    }
}

impl BackoffPolicy for FixedBackoff {
    fn delay(&self, attempt: u32) -> Option<Duration> {
        match self.max_retries {
            Some(max) if attempt > max => None,
            _ => Some(self.cooldown),
        }
    }
}

/// Doubling cooldown, capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub cap: Duration,
    pub max_retries: Option<u32>,
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Option<Duration> {
        if matches!(self.max_retries, Some(max) if attempt > max) {
            return None;
        }
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        Some(self.initial.saturating_mul(factor).min(self.cap))
    }
}

/// Progress of a multi-page fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    PageRequested {
        page: u32,
    },
    PageFetched {
        page: u32,
        received: usize,
        total: usize,
    },
    RateLimited {
        page: u32,
        attempt: u32,
        retry_in: Duration,
    },
    Finished {
        total: usize,
        error: Option<BalanceError>,
    },
}

pub type PageObserver = Arc<dyn Fn(&PageEvent) + Send + Sync>;

#[derive(Clone)]
pub struct Paginator {
    config: PaginationConfig,
    backoff: Arc<dyn BackoffPolicy>,
    observer: Option<PageObserver>,
}

impl fmt::Debug for Paginator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("config", &self.config)
            .field("backoff", &self.backoff)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Paginator {
    pub fn new(config: PaginationConfig) -> Self {
        let backoff = Arc::new(FixedBackoff::from_config(&config));
        Self {
            config,
            backoff,
            observer: None,
        }
    }

    pub fn with_backoff(mut self, backoff: impl BackoffPolicy + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    pub fn with_observer(mut self, observer: impl Fn(&PageEvent) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    fn emit(&self, event: PageEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    /// Every ERC-20 balance of `address` on `chain`, optionally narrowed to
    /// the symbols in `filter`. An empty filter keeps everything.
    pub async fn fetch_all_tokens<A: TokenApi>(
        &self,
        fetcher: &BalanceFetcher<A>,
        address: &str,
        chain: &ChainInfo,
        filter: Option<&SymbolFilter>,
    ) -> PagedResult<TokenBalance> {
        let filter = filter.filter(|f| !f.is_empty());
        let page_size = self.config.page_size;
        let mut tokens = Vec::new();
        let mut page: u32 = 1;
        let mut attempt: u32 = 0;

        let error = loop {
            if page > self.config.max_pages {
                warn!(address, chain = chain.name, max_pages = self.config.max_pages, "page ceiling reached");
                break Some(BalanceError::PageLimitReached {
                    max_pages: self.config.max_pages,
                });
            }

            tokio::time::sleep(self.config.request_delay()).await;
            self.emit(PageEvent::PageRequested { page });

            match fetcher.fetch_tokens_page(address, chain, page_size, page).await {
                Ok(batch) => {
                    attempt = 0;
                    let received = batch.len();
                    if received == 0 {
                        break None;
                    }

                    tokens.extend(
                        batch
                            .into_iter()
                            .filter(|token| filter.map_or(true, |f| f.matches(token))),
                    );
                    self.emit(PageEvent::PageFetched {
                        page,
                        received,
                        total: tokens.len(),
                    });

                    if received < page_size as usize {
                        break None;
                    }
                    page += 1;
                }
                Err(err) if err.is_retryable() => {
                    attempt += 1;
                    match self.backoff.delay(attempt) {
                        Some(retry_in) => {
                            warn!(page, attempt, ?retry_in, "rate limited, retrying page");
                            self.emit(PageEvent::RateLimited {
                                page,
                                attempt,
                                retry_in,
                            });
                            tokio::time::sleep(retry_in).await;
                        }
                        None => {
                            warn!(page, attempt, "rate limited, giving up");
                            break Some(err);
                        }
                    }
                }
                Err(err) => {
                    warn!(page, error = %err, "pagination stopped");
                    break Some(err);
                }
            }
        };

        info!(
            address,
            chain = chain.name,
            tokens = tokens.len(),
            complete = error.is_none(),
            "token pagination finished"
        );
        self.emit(PageEvent::Finished {
            total: tokens.len(),
            error: error.clone(),
        });

        match error {
            Some(err) => PagedResult::partial(tokens, err),
            None => PagedResult::complete(tokens),
        }
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PaginationConfig::default())
    }
}
