//! # MIG Yield SDK
//!
//! Batched discovery of MasterChef-style staking contracts and per-pair APR computation.
//!
//! ## Overview
//!
//! Each configured staking contract is populated once through a short chain of
//! dependent Multicall3 batches, then queried any number of times for the APR of
//! arbitrary trading pairs:
//!
//! - **Discovery**: pool count, total allocation and reward rate, then every `poolInfo(pid)`
//! - **Classification**: every staked token is probed as a two-asset pair or a plain token
//! - **State**: supplies, decimals, staked balances, pair members and reserves
//! - **APR**: yearly reward value over the pool's reserve value
//!
//! ## Architecture
//!
//! ### Transport Layer
//! [`multicall::BatchCaller`] is the only seam to the node. [`multicall::Multicall`]
//! implements it over `aggregate3`; tests implement it with scripted stubs.
//!
//! ### Population Layer
//! [`classifier::PoolTypeClassifier`] and [`fetcher::PoolStateFetcher`] build an
//! immutable [`fetcher::StakingContractState`] per pass. Classification decisions are
//! shared through a [`classification_cache::ClassificationStore`].
//!
//! ### Query Layer
//! [`staking_contract::StakingContractAggregate`] serves [`apr::compute_aprs`] against
//! its latest snapshot; [`aggregator`] fans out over many contracts.

// Core Types
/// Tagged pool representation (single-asset, pair-asset, unclassified)
pub mod pools;
/// Tokens, reward tokens and fixed-point conversion
pub mod types;
/// Error taxonomy
pub mod error;

// Transport
/// Multicall3 batch RPC client
pub mod multicall;
/// Selectors and decoders for the contracts that get read
pub mod contracts;

// Population
/// Classification decision stores
pub mod classification_cache;
/// Pair vs single-asset classification
pub mod classifier;
/// Staged pool discovery and state reads
pub mod fetcher;

// Query
/// APR math
pub mod apr;
/// Per-contract lifecycle facade
pub mod staking_contract;
/// Multi-contract population and the APR matrix
pub mod aggregator;

// Market Data
/// Token catalog
pub mod token_catalog;
/// Price service and pair-derived prices
pub mod price_feeds;
/// CoinGecko price integration
pub mod coingecko_price_updater;

// Infrastructure
/// Metrics and observability
pub mod metrics;
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use apr::{AprValue, TradingPairQuery};
pub use error::{BatchError, PopulationError};
pub use fetcher::{PoolStateFetcher, StakingContractState};
pub use multicall::{BatchCaller, Multicall};
pub use pools::Pool;
pub use settings::Settings;
pub use staking_contract::StakingContractAggregate;
