// src/staking_contract.rs

use crate::apr::{self, AprValue, TradingPairQuery};
use crate::error::PopulationError;
use crate::fetcher::{PoolStateFetcher, StakingContractState};
use crate::metrics;
use crate::settings::StakingContractConfig;
use crate::types::RewardToken;
use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use ethers::prelude::Address;
use log::{info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum PopulationStatus {
    Empty,
    Populating,
    Populated { at: DateTime<Utc> },
    /// Last attempt failed; an earlier snapshot, if any, is still served.
    Failed(String),
}

/// Owns one staking contract: constructed empty, populated on demand, then queried.
///
/// ## Lifecycle
///
/// - **Empty**: queries return an empty result set
/// - **Populate**: concurrent calls are serialized; a caller that waited on a pass
///   which succeeded gets that snapshot back instead of fetching again
/// - **Re-populate**: calling `populate` after completion re-reads the chain and
///   swaps the snapshot only if the new pass succeeds
/// - **Cancelled**: dropping a `populate` future mid-pass restores the previous status
pub struct StakingContractAggregate {
    config: StakingContractConfig,
    fetcher: Arc<PoolStateFetcher>,
    reward_token: ArcSwap<RewardToken>,
    state: ArcSwapOption<StakingContractState>,
    status: ArcSwap<PopulationStatus>,
    populate_lock: Mutex<()>,
    generation: AtomicU64,
}

impl StakingContractAggregate {
    pub fn new(config: StakingContractConfig, reward_token: RewardToken, fetcher: Arc<PoolStateFetcher>) -> Self {
        Self {
            config,
            fetcher,
            reward_token: ArcSwap::from_pointee(reward_token),
            state: ArcSwapOption::empty(),
            status: ArcSwap::from_pointee(PopulationStatus::Empty),
            populate_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &StakingContractConfig {
        &self.config
    }

    pub fn reward_token_address(&self) -> Address {
        self.config.reward_token
    }

    pub fn status(&self) -> PopulationStatus {
        (**self.status.load()).clone()
    }

    /// Latest successful snapshot.
    pub fn state(&self) -> Option<Arc<StakingContractState>> {
        self.state.load_full()
    }

    pub async fn populate(&self) -> Result<Arc<StakingContractState>, PopulationError> {
        let observed = self.generation.load(Ordering::Acquire);
        let _guard = self.populate_lock.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            if let Some(state) = self.state.load_full() {
                return Ok(state);
            }
        }

        let pass = PopulatingGuard::enter(&self.status);
        let start = Instant::now();
        let reward_token = (**self.reward_token.load()).clone();

        match self.fetcher.populate(&self.config, reward_token).await {
            Ok(state) => {
                let state = self.publish(state);
                self.generation.fetch_add(1, Ordering::AcqRel);
                pass.finish(PopulationStatus::Populated {
                    at: state.populated_at,
                });
                metrics::record_population_duration(&self.config.name, start.elapsed());
                info!(
                    "{}: population finished in {:?} ({} pools)",
                    self.config.name,
                    start.elapsed(),
                    state.pools.len()
                );
                Ok(state)
            }
            Err(e) => {
                metrics::increment_population_failures(&self.config.name);
                warn!("{}: population failed: {}", self.config.name, e);
                pass.finish(PopulationStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Swaps in a fresh snapshot carrying the latest reward token price.
    fn publish(&self, mut state: StakingContractState) -> Arc<StakingContractState> {
        state.reward_token.usd_price = self.reward_token.load().usd_price;
        let state = Arc::new(state);
        self.state.store(Some(state.clone()));

        // set_reward_token_price may have run between the read above and the store.
        if state.reward_token.usd_price == self.reward_token.load().usd_price {
            return state;
        }
        self.state.rcu(|current| {
            current
                .as_ref()
                .map(|snapshot| with_reward_price(snapshot, self.reward_token.load().usd_price))
        });
        self.state.load_full().unwrap_or(state)
    }

    /// One value per pair, or nothing at all before the first successful population.
    pub fn compute_aprs(&self, pairs: &[TradingPairQuery]) -> Vec<AprValue> {
        match self.state.load_full() {
            Some(state) => apr::compute_aprs(&state, pairs),
            None => Vec::new(),
        }
    }

    /// Reward token price is external data; it applies to the current snapshot and
    /// to every later population.
    pub fn set_reward_token_price(&self, usd_price: f64) {
        let price = (usd_price.is_finite() && usd_price > 0.0).then_some(usd_price);
        self.reward_token.rcu(|current| {
            let mut token = (**current).clone();
            token.usd_price = price;
            token
        });
        self.state
            .rcu(|current| current.as_ref().map(|state| with_reward_price(state, price)));
    }
}

fn with_reward_price(state: &StakingContractState, usd_price: Option<f64>) -> Arc<StakingContractState> {
    let mut state = state.clone();
    state.reward_token.usd_price = usd_price;
    Arc::new(state)
}

/// Holds `Populating` for one pass and puts the previous status back if the pass is
/// dropped before it finishes.
struct PopulatingGuard<'a> {
    status: &'a ArcSwap<PopulationStatus>,
    previous: Option<Arc<PopulationStatus>>,
}

impl<'a> PopulatingGuard<'a> {
    fn enter(status: &'a ArcSwap<PopulationStatus>) -> Self {
        let previous = status.swap(Arc::new(PopulationStatus::Populating));
        Self {
            status,
            previous: Some(previous),
        }
    }

    fn finish(mut self, outcome: PopulationStatus) {
        self.previous = None;
        self.status.store(Arc::new(outcome));
    }
}

impl Drop for PopulatingGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.status.store(previous);
        }
    }
}
