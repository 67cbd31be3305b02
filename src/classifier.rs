// src/classifier.rs

use crate::classification_cache::ClassificationStore;
use crate::contracts::{self, erc20, i_uniswap_v2_pair};
use crate::metrics;
use crate::multicall::{BatchCaller, Call};
use crate::types::TokenType;
use ethers::prelude::Address;
use futures::future::join_all;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Decides whether an LP address is a two-asset pair or a plain token.
///
/// Probes run through the same `BatchCaller` as the fetcher, one call per probe.
/// Only terminal answers are written to the store, so an RPC hiccup costs a
/// re-probe on the next population, never a wrong cached answer.
#[derive(Clone)]
pub struct PoolTypeClassifier {
    caller: Arc<dyn BatchCaller>,
    store: Arc<dyn ClassificationStore>,
}

impl PoolTypeClassifier {
    pub fn new(caller: Arc<dyn BatchCaller>, store: Arc<dyn ClassificationStore>) -> Self {
        Self { caller, store }
    }

    pub async fn classify(&self, address: Address) -> TokenType {
        if address.is_zero() {
            return TokenType::SingleAsset;
        }
        if let Some(cached) = self.store.get(&address) {
            return cached;
        }

        let token_type = if self.probe_pair(address).await {
            TokenType::PairAsset
        } else if self.probe_single(address).await {
            TokenType::SingleAsset
        } else {
            warn!("{:?} answered neither token0() nor name(); leaving unclassified", address);
            return TokenType::Unclassified;
        };

        debug!("Classified {:?} as {}", address, token_type);
        self.store.set(address, token_type);
        token_type
    }

    /// Classifies every distinct address concurrently.
    pub async fn classify_all(&self, addresses: &[Address]) -> HashMap<Address, TokenType> {
        let mut seen = HashSet::with_capacity(addresses.len());
        let distinct: Vec<Address> = addresses
            .iter()
            .copied()
            .filter(|address| seen.insert(*address))
            .collect();

        let results = join_all(distinct.iter().map(|address| self.classify(*address))).await;
        distinct.into_iter().zip(results).collect()
    }

    async fn probe_pair(&self, address: Address) -> bool {
        let answered = self
            .probe(address, i_uniswap_v2_pair::token0())
            .await
            .map_or(false, |data| contracts::decode_address(&data).is_some());
        metrics::increment_classification_probe("token0", answered);
        answered
    }

    async fn probe_single(&self, address: Address) -> bool {
        let answered = self
            .probe(address, erc20::name())
            .await
            .map_or(false, |data| erc20::decode_name(&data).is_some());
        metrics::increment_classification_probe("name", answered);
        answered
    }

    async fn probe(&self, address: Address, call_data: ethers::types::Bytes) -> Option<Vec<u8>> {
        match self.caller.execute(vec![Call::new(address, call_data)]).await {
            Ok(outcomes) => outcomes
                .into_iter()
                .next()
                .and_then(|outcome| outcome.data().map(<[u8]>::to_vec)),
            Err(e) => {
                debug!("Probe of {:?} failed: {}", address, e);
                None
            }
        }
    }
}
