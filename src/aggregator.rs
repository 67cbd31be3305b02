// src/aggregator.rs

use crate::apr::AprValue;
use crate::error::PopulationError;
use crate::fetcher::StakingContractState;
use crate::price_feeds::PriceService;
use crate::staking_contract::StakingContractAggregate;
use crate::token_catalog::TokenCatalog;
use futures::future::join_all;
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;

pub type PopulationResult = Result<Arc<StakingContractState>, PopulationError>;

/// Populates every contract concurrently. One result per aggregate, input order.
pub async fn populate_all(aggregates: &[Arc<StakingContractAggregate>]) -> Vec<PopulationResult> {
    join_all(aggregates.iter().map(|aggregate| aggregate.populate())).await
}

/// Pushes the current reward token prices into each aggregate. Returns how many were priced.
pub fn refresh_reward_prices(aggregates: &[Arc<StakingContractAggregate>], prices: &dyn PriceService) -> usize {
    let mut priced = 0;
    for aggregate in aggregates {
        match prices.price_of(&aggregate.reward_token_address()) {
            Some(price) => {
                aggregate.set_reward_token_price(price);
                priced += 1;
            }
            None => warn!("{}: no price for reward token", aggregate.name()),
        }
    }
    priced
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtocolAprs {
    pub protocol: String,
    /// Aligned with [`AprMatrix::pairs`].
    pub aprs: Vec<AprValue>,
}

/// Protocol-by-pair APR table, data only.
#[derive(Debug, Clone, Serialize)]
pub struct AprMatrix {
    /// Labels such as `wftm-wbtc`.
    pub pairs: Vec<String>,
    pub protocols: Vec<ProtocolAprs>,
}

impl AprMatrix {
    /// Pairs that cannot be priced, and contracts that never populated, show as `NoData`.
    pub fn build(
        aggregates: &[Arc<StakingContractAggregate>],
        pairs: &[(String, String)],
        catalog: &TokenCatalog,
        prices: &dyn PriceService,
    ) -> Self {
        let labels = pairs.iter().map(|(a, b)| format!("{}-{}", a, b)).collect();

        let queries: Vec<_> = pairs
            .iter()
            .map(|(a, b)| {
                let query = catalog.pair_query(a, b, prices);
                if query.is_none() {
                    debug!("{}-{}: no price, excluded", a, b);
                }
                query
            })
            .collect();
        let priced: Vec<_> = queries.iter().flatten().copied().collect();

        let protocols = aggregates
            .iter()
            .map(|aggregate| {
                let computed = aggregate.compute_aprs(&priced);
                let mut computed = computed.into_iter();
                let populated = computed.len() == priced.len();
                let aprs = queries
                    .iter()
                    .map(|query| match (query, populated) {
                        (Some(_), true) => computed.next().unwrap_or(AprValue::NoData),
                        _ => AprValue::NoData,
                    })
                    .collect();
                ProtocolAprs {
                    protocol: aggregate.name().to_string(),
                    aprs,
                }
            })
            .collect();

        Self {
            pairs: labels,
            protocols,
        }
    }

    pub fn get(&self, protocol: &str, pair: &str) -> Option<AprValue> {
        let column = self.pairs.iter().position(|p| p == pair)?;
        self.protocols
            .iter()
            .find(|p| p.protocol == protocol)
            .and_then(|p| p.aprs.get(column).copied())
    }
}
