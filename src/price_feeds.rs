// src/price_feeds.rs

use crate::contracts::{self, erc20};
use crate::multicall::{BatchCaller, Call, CallOutcome};
use crate::token_catalog::TokenCatalog;
use crate::types::to_real;
use anyhow::{anyhow, Result};
use dashmap::DashMap;
use ethers::prelude::Address;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// USD unit prices by token address. "Absent" excludes the token from any computation.
pub trait PriceService: Send + Sync {
    fn price_of(&self, token: &Address) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    CoinGecko,
    /// Derived from native/token balances of a pair.
    PairDerived,
    Manual,
}

#[derive(Debug, Clone)]
pub struct PriceEntry {
    pub price: f64,
    pub updated_at: Instant,
    pub source: PriceSource,
}

/// Lock-free price map shared by the updaters and the readers.
#[derive(Clone, Default)]
pub struct SharedPriceCache {
    prices: Arc<DashMap<Address, PriceEntry>>,
}

impl SharedPriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_price(&self, token: &Address) -> Option<f64> {
        self.prices.get(token).map(|entry| entry.price)
    }

    pub fn get_price_with_metadata(&self, token: &Address) -> Option<(f64, Duration, PriceSource)> {
        self.prices
            .get(token)
            .map(|entry| (entry.price, entry.updated_at.elapsed(), entry.source))
    }

    pub fn update_batch(&self, prices: HashMap<Address, f64>, source: PriceSource) {
        let now = Instant::now();
        for (token, price) in prices {
            self.prices.insert(
                token,
                PriceEntry {
                    price,
                    updated_at: now,
                    source,
                },
            );
        }
    }

    pub fn set_price(&self, token: Address, price: f64) {
        self.prices.insert(
            token,
            PriceEntry {
                price,
                updated_at: Instant::now(),
                source: PriceSource::Manual,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl PriceService for SharedPriceCache {
    fn price_of(&self, token: &Address) -> Option<f64> {
        self.get_price(token).filter(|p| p.is_finite() && *p > 0.0)
    }
}

/// Prices catalog tokens that have no CoinGecko listing from their pair against the
/// wrapped native token: `price = native_balance * native_price / token_balance`.
pub struct PairPriceResolver {
    caller: Arc<dyn BatchCaller>,
    cache: SharedPriceCache,
    catalog: Arc<TokenCatalog>,
    native_token: String,
}

/// One token priced through its pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairTarget {
    pub token: Address,
    pub decimals: u32,
    pub pair: Address,
}

impl PairPriceResolver {
    pub fn new(
        caller: Arc<dyn BatchCaller>,
        cache: SharedPriceCache,
        catalog: Arc<TokenCatalog>,
        native_token: impl Into<String>,
    ) -> Self {
        Self {
            caller,
            cache,
            catalog,
            native_token: native_token.into(),
        }
    }

    pub fn targets(&self) -> Vec<PairTarget> {
        self.catalog
            .tokens()
            .iter()
            .filter(|t| t.coingecko_id.is_none())
            .filter_map(|t| {
                t.eth_pair.map(|pair| PairTarget {
                    token: t.address,
                    decimals: t.decimals,
                    pair,
                })
            })
            .collect()
    }

    /// One batch: every native balance first, then every token balance.
    pub async fn refresh(&self) -> Result<usize> {
        let native = self.catalog.require(&self.native_token)?;
        let native_price = self
            .cache
            .price_of(&native.address)
            .ok_or_else(|| anyhow!("no price for native token {}", native.name))?;

        let targets = self.targets();
        if targets.is_empty() {
            return Ok(0);
        }

        let calls = build_balance_calls(native.address, &targets);
        let outcomes = self.caller.execute(calls).await?;
        let prices = derive_pair_prices(native_price, native.decimals, &targets, &outcomes)?;

        let count = prices.len();
        if count < targets.len() {
            warn!("Pair pricing resolved {} of {} tokens", count, targets.len());
        }
        self.cache.update_batch(prices, PriceSource::PairDerived);
        info!("Pair pricing updated {} tokens", count);
        Ok(count)
    }
}

pub fn build_balance_calls(native: Address, targets: &[PairTarget]) -> Vec<Call> {
    let native_calls = targets
        .iter()
        .map(|t| Call::new(native, erc20::balance_of(t.pair)));
    let token_calls = targets
        .iter()
        .map(|t| Call::new(t.token, erc20::balance_of(t.pair)));
    native_calls.chain(token_calls).collect()
}

/// Splits the flat balance list in half and prices each token. Tokens whose balance
/// is zero or unreadable are left out.
pub fn derive_pair_prices(
    native_price: f64,
    native_decimals: u32,
    targets: &[PairTarget],
    outcomes: &[CallOutcome],
) -> Result<HashMap<Address, f64>> {
    if outcomes.len() != targets.len() * 2 {
        return Err(anyhow!(
            "expected {} balances, got {}",
            targets.len() * 2,
            outcomes.len()
        ));
    }
    let (native_balances, token_balances) = outcomes.split_at(targets.len());

    let mut prices = HashMap::with_capacity(targets.len());
    for ((target, native_out), token_out) in targets.iter().zip(native_balances).zip(token_balances) {
        let balances = native_out
            .data()
            .and_then(contracts::decode_uint)
            .zip(token_out.data().and_then(contracts::decode_uint));
        let Some((native_raw, token_raw)) = balances else {
            debug!("Unreadable pair balances for {:?}", target.token);
            continue;
        };
        let token_amount = to_real(token_raw, target.decimals);
        if token_amount <= 0.0 {
            continue;
        }
        let price = to_real(native_raw, native_decimals) * native_price / token_amount;
        if price.is_finite() && price > 0.0 {
            prices.insert(target.token, price);
        }
    }
    Ok(prices)
}
