// src/coingecko_price_updater.rs

use crate::price_feeds::{PriceSource, SharedPriceCache};
use crate::token_catalog::TokenCatalog;
use anyhow::{anyhow, Result};
use ethers::prelude::Address;
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::time::Instant;

// Prices outside this band are treated as API garbage.
const MIN_SANE_PRICE: f64 = 0.000_000_1;
const MAX_SANE_PRICE: f64 = 10_000_000.0;

/// One-shot CoinGecko `simple/price` fetch for every catalog token with a CoinGecko id.
pub struct CoinGeckoPriceUpdater {
    cache: SharedPriceCache,
    token_map: HashMap<Address, String>, // Address -> CoinGecko ID
    base_url: String,
    client: reqwest::Client,
}

// simple/price answers { "<id>": { "usd": 1.23 }, ... }
type CoinGeckoPriceResponse = HashMap<String, CoinGeckoTokenPrice>;

#[derive(Debug, Deserialize)]
struct CoinGeckoTokenPrice {
    usd: Option<f64>,
}

impl CoinGeckoPriceUpdater {
    pub fn new(
        cache: SharedPriceCache,
        catalog: &TokenCatalog,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let token_map = catalog
            .tokens()
            .iter()
            .filter_map(|t| t.coingecko_id.clone().map(|id| (t.address, id)))
            .collect();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            cache,
            token_map,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn request_url(&self) -> Option<String> {
        // Several addresses may share one id; ask for each id once, in a stable order.
        let ids: BTreeSet<&str> = self.token_map.values().map(String::as_str).collect();
        if ids.is_empty() {
            return None;
        }
        Some(format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url,
            ids.into_iter().collect::<Vec<_>>().join(",")
        ))
    }

    /// Fetches and stores every price once. Returns how many tokens got a price.
    pub async fn refresh(&self) -> Result<usize> {
        let start = Instant::now();
        let Some(url) = self.request_url() else {
            return Ok(0);
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            if response.status() == 429 {
                return Err(anyhow!("Rate limited (429)"));
            }
            return Err(anyhow!("HTTP error: {}", response.status()));
        }

        let price_data: CoinGeckoPriceResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("JSON parse failed: {}", e))?;

        let prices = self.map_prices(&price_data);
        let updated_count = prices.len();
        if !prices.is_empty() {
            self.cache.update_batch(prices, PriceSource::CoinGecko);
        }

        info!(
            "CoinGecko: {} of {} tokens priced in {:?}",
            updated_count,
            self.token_map.len(),
            start.elapsed()
        );
        Ok(updated_count)
    }

    fn map_prices(&self, price_data: &CoinGeckoPriceResponse) -> HashMap<Address, f64> {
        let mut prices = HashMap::new();
        for (address, coingecko_id) in &self.token_map {
            match price_data.get(coingecko_id).and_then(|p| p.usd) {
                Some(price) if (MIN_SANE_PRICE..=MAX_SANE_PRICE).contains(&price) => {
                    prices.insert(*address, price);
                }
                Some(price) => {
                    warn!("CoinGecko: rejecting price for {} ({:?}): {}", coingecko_id, address, price);
                }
                None => debug!("CoinGecko: no usd price for {}", coingecko_id),
            }
        }
        prices
    }
}
