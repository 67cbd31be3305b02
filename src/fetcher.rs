//! Staking contract discovery and state fetching.
//!
//! A population pass runs four dependent batches against one staking contract:
//!
//! 1. **Scalars**: `poolLength()`, `totalAllocPoint()` and the configured reward-rate accessor.
//! 2. **Descriptors**: `poolInfo(pid)` for every pool.
//! 3. **Shape reads**: after classification, 3 calls per single-asset pool and 5 per pair.
//! 4. **Underlying reads**: token decimals and `getReserves()` for every pair.
//!
//! Every batch is de-multiplexed by a pure function of the flat outcome list, so the
//! offset bookkeeping is testable without a node. A batch is only built once the
//! previous one has returned.

use crate::classifier::PoolTypeClassifier;
use crate::contracts::{self, erc20, i_master_chef, i_uniswap_v2_pair};
use crate::error::{PopulationError, Stage};
use crate::multicall::{BatchCaller, Call, CallOutcome};
use crate::pools::{PairAssetPool, Pool, SingleAssetPool, UnclassifiedPool};
use crate::settings::{PoolInfoLayout, StakingContractConfig};
use crate::types::{to_real, RewardToken, Token, TokenType};
use chrono::{DateTime, Utc};
use ethers::prelude::{Address, U256};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `[totalSupply, decimals, balanceOf(chef)]`
pub const SINGLE_ASSET_CALLS: usize = 3;
/// `[token0, token1, totalSupply, decimals, balanceOf(chef)]`
pub const PAIR_ASSET_CALLS: usize = 5;
/// `[token0.decimals, token1.decimals, getReserves]`
pub const UNDERLYING_CALLS: usize = 3;

/// Decimals assumed for the chain's native asset.
const NATIVE_DECIMALS: u32 = 18;

/// Point-in-time snapshot of one staking contract. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingContractState {
    pub name: String,
    pub contract_address: Address,
    pub reward_token: RewardToken,
    pub reward_rate_per_second: f64,
    pub total_alloc_weight: f64,
    /// Discovery order, i.e. pid order.
    pub pools: Vec<Pool>,
    pub populated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarReads {
    pub pool_count: u64,
    pub total_alloc_weight: f64,
    pub reward_rate_per_second: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolDescriptor {
    pub pid: u64,
    pub lp_address: Address,
    pub alloc_weight: f64,
}

/// How a pool is read in stage 2, derived from its classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Single,
    Pair,
    /// Zero-address LP: the chain's native asset, nothing to call.
    Native,
    Skipped,
}

impl ShapeKind {
    pub fn of(lp_address: Address, token_type: TokenType) -> Self {
        match token_type {
            TokenType::SingleAsset if lp_address.is_zero() => ShapeKind::Native,
            TokenType::SingleAsset => ShapeKind::Single,
            TokenType::PairAsset => ShapeKind::Pair,
            TokenType::Unclassified => ShapeKind::Skipped,
        }
    }

    pub fn call_count(self) -> usize {
        match self {
            ShapeKind::Single => SINGLE_ASSET_CALLS,
            ShapeKind::Pair => PAIR_ASSET_CALLS,
            ShapeKind::Native | ShapeKind::Skipped => 0,
        }
    }
}

/// Per-pool result of stage 2, amounts already scaled by the LP decimals.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeRead {
    Single {
        total_supply: f64,
        decimals: u32,
        staked: f64,
    },
    Pair {
        token0: Address,
        token1: Address,
        total_supply: f64,
        decimals: u32,
        staked: f64,
    },
    Native,
    Skipped,
}

/// Per-pair result of stage 3, reserves scaled by each token's own decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnderlyingRead {
    pub decimals0: u32,
    pub decimals1: u32,
    pub reserve0: f64,
    pub reserve1: f64,
}

pub struct PoolStateFetcher {
    caller: Arc<dyn BatchCaller>,
    classifier: PoolTypeClassifier,
}

impl PoolStateFetcher {
    pub fn new(caller: Arc<dyn BatchCaller>, classifier: PoolTypeClassifier) -> Self {
        Self { caller, classifier }
    }

    /// Runs a full population pass. Any batch failure aborts the pass; nothing is retried.
    pub async fn populate(
        &self,
        config: &StakingContractConfig,
        reward_token: RewardToken,
    ) -> Result<StakingContractState, PopulationError> {
        let chef = config.address;
        let reward_rate_call = i_master_chef::reward_rate(&config.reward_rate_accessor)
            .ok_or_else(|| {
                PopulationError::InvalidConfig(format!(
                    "{}: reward rate accessor {:?} is not a valid function name",
                    config.name, config.reward_rate_accessor
                ))
            })?;

        // Stage 0
        let scalar_calls = vec![
            Call::new(chef, i_master_chef::pool_length()),
            Call::new(chef, i_master_chef::total_alloc_point()),
            Call::new(chef, reward_rate_call),
        ];
        let outcomes = self.run(Stage::Scalars, scalar_calls).await?;
        let scalars = decode_scalars(&outcomes, reward_token.decimals)?;
        info!(
            "{}: {} pools, total alloc {}, reward rate {}/s",
            config.name, scalars.pool_count, scalars.total_alloc_weight, scalars.reward_rate_per_second
        );

        // Stage 1
        let descriptor_calls = (0..scalars.pool_count)
            .map(|pid| Call::new(chef, i_master_chef::pool_info(pid)))
            .collect();
        let outcomes = self.run(Stage::Descriptors, descriptor_calls).await?;
        let descriptors = decode_descriptors(&outcomes, config.pool_info)?;

        // Classification
        let lp_addresses: Vec<Address> = descriptors.iter().map(|d| d.lp_address).collect();
        let types = self.classifier.classify_all(&lp_addresses).await;
        let kinds: Vec<ShapeKind> = descriptors
            .iter()
            .map(|d| {
                let token_type = types
                    .get(&d.lp_address)
                    .copied()
                    .unwrap_or(TokenType::Unclassified);
                ShapeKind::of(d.lp_address, token_type)
            })
            .collect();
        let unclassified = kinds.iter().filter(|k| **k == ShapeKind::Skipped).count();
        if unclassified > 0 {
            warn!(
                "{}: {} of {} pools unclassified; excluded from reads and APRs",
                config.name,
                unclassified,
                descriptors.len()
            );
        }

        // Stage 2
        let shape_calls = build_shape_calls(chef, &descriptors, &kinds);
        let outcomes = self.run(Stage::ShapeReads, shape_calls).await?;
        let shapes = demux_shape_reads(&kinds, &outcomes)?;

        // Stage 3
        let pairs: Vec<(Address, Address, Address)> = descriptors
            .iter()
            .zip(&shapes)
            .filter_map(|(d, shape)| match shape {
                ShapeRead::Pair { token0, token1, .. } => Some((d.lp_address, *token0, *token1)),
                _ => None,
            })
            .collect();
        let underlying_calls = pairs
            .iter()
            .flat_map(|(lp, token0, token1)| {
                [
                    Call::new(*token0, erc20::decimals()),
                    Call::new(*token1, erc20::decimals()),
                    Call::new(*lp, i_uniswap_v2_pair::get_reserves()),
                ]
            })
            .collect();
        let outcomes = self.run(Stage::UnderlyingReads, underlying_calls).await?;
        let underlying = demux_underlying_reads(pairs.len(), &outcomes)?;

        let pools = assemble_pools(&descriptors, shapes, underlying);
        info!("{}: populated {} pools", config.name, pools.len());

        Ok(StakingContractState {
            name: config.name.clone(),
            contract_address: chef,
            reward_token,
            reward_rate_per_second: scalars.reward_rate_per_second,
            total_alloc_weight: scalars.total_alloc_weight,
            pools,
            populated_at: Utc::now(),
        })
    }

    /// One batch round trip. Empty batches never reach the caller.
    async fn run(&self, stage: Stage, calls: Vec<Call>) -> Result<Vec<CallOutcome>, PopulationError> {
        if calls.is_empty() {
            debug!("{}: nothing to read", stage);
            return Ok(Vec::new());
        }
        let expected = calls.len();
        debug!("{}: issuing {} calls", stage, expected);
        let outcomes = self
            .caller
            .execute(calls)
            .await
            .map_err(|e| PopulationError::transient(stage, e))?;
        expect_len(stage, expected, outcomes.len())?;
        Ok(outcomes)
    }
}

fn expect_len(stage: Stage, expected: usize, actual: usize) -> Result<(), PopulationError> {
    if expected == actual {
        Ok(())
    } else {
        Err(PopulationError::ConfigurationMismatch {
            stage,
            expected,
            actual,
        })
    }
}

fn outcome_data(stage: Stage, outcomes: &[CallOutcome], index: usize) -> Result<&[u8], PopulationError> {
    outcomes
        .get(index)
        .and_then(CallOutcome::data)
        .ok_or(PopulationError::MalformedResult { stage, index })
}

fn read_uint(stage: Stage, outcomes: &[CallOutcome], index: usize) -> Result<U256, PopulationError> {
    contracts::decode_uint(outcome_data(stage, outcomes, index)?)
        .ok_or(PopulationError::MalformedResult { stage, index })
}

fn read_decimals(stage: Stage, outcomes: &[CallOutcome], index: usize) -> Result<u32, PopulationError> {
    contracts::decode_small_uint(outcome_data(stage, outcomes, index)?)
        .ok_or(PopulationError::MalformedResult { stage, index })
}

fn read_address(stage: Stage, outcomes: &[CallOutcome], index: usize) -> Result<Address, PopulationError> {
    contracts::decode_address(outcome_data(stage, outcomes, index)?)
        .ok_or(PopulationError::MalformedResult { stage, index })
}

/// Stage 0: `[poolLength, totalAllocPoint, rewardRate]`.
pub fn decode_scalars(outcomes: &[CallOutcome], reward_decimals: u32) -> Result<ScalarReads, PopulationError> {
    let stage = Stage::Scalars;
    expect_len(stage, 3, outcomes.len())?;

    let pool_count = read_uint(stage, outcomes, 0)?;
    if pool_count > U256::from(u64::MAX) {
        return Err(PopulationError::MalformedResult { stage, index: 0 });
    }
    Ok(ScalarReads {
        pool_count: pool_count.as_u64(),
        total_alloc_weight: to_real(read_uint(stage, outcomes, 1)?, 0),
        reward_rate_per_second: to_real(read_uint(stage, outcomes, 2)?, reward_decimals),
    })
}

/// Stage 1: one `poolInfo(pid)` per pool, pid == position.
pub fn decode_descriptors(
    outcomes: &[CallOutcome],
    layout: PoolInfoLayout,
) -> Result<Vec<PoolDescriptor>, PopulationError> {
    outcomes
        .iter()
        .enumerate()
        .map(|(index, outcome)| {
            let (lp_address, alloc_point) = outcome
                .data()
                .and_then(|data| {
                    i_master_chef::decode_pool_info(data, layout.lp_token_word, layout.alloc_point_word)
                })
                .ok_or(PopulationError::MalformedResult {
                    stage: Stage::Descriptors,
                    index,
                })?;
            Ok(PoolDescriptor {
                pid: index as u64,
                lp_address,
                alloc_weight: to_real(alloc_point, 0),
            })
        })
        .collect()
}

/// Stage 2 call list; each pool contributes exactly `kind.call_count()` calls.
pub fn build_shape_calls(chef: Address, descriptors: &[PoolDescriptor], kinds: &[ShapeKind]) -> Vec<Call> {
    let mut calls = Vec::with_capacity(kinds.iter().map(|k| k.call_count()).sum());
    for (descriptor, kind) in descriptors.iter().zip(kinds) {
        let lp = descriptor.lp_address;
        match kind {
            ShapeKind::Single => calls.extend([
                Call::new(lp, erc20::total_supply()),
                Call::new(lp, erc20::decimals()),
                Call::new(lp, erc20::balance_of(chef)),
            ]),
            ShapeKind::Pair => calls.extend([
                Call::new(lp, i_uniswap_v2_pair::token0()),
                Call::new(lp, i_uniswap_v2_pair::token1()),
                Call::new(lp, erc20::total_supply()),
                Call::new(lp, erc20::decimals()),
                Call::new(lp, erc20::balance_of(chef)),
            ]),
            ShapeKind::Native | ShapeKind::Skipped => {}
        }
    }
    calls
}

/// Stage 2 de-multiplexer. Walks `outcomes` with each pool's call count as its stride.
pub fn demux_shape_reads(kinds: &[ShapeKind], outcomes: &[CallOutcome]) -> Result<Vec<ShapeRead>, PopulationError> {
    let stage = Stage::ShapeReads;
    let expected: usize = kinds.iter().map(|k| k.call_count()).sum();
    expect_len(stage, expected, outcomes.len())?;

    let mut offset = 0;
    let mut reads = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let read = match kind {
            ShapeKind::Single => {
                let decimals = read_decimals(stage, outcomes, offset + 1)?;
                ShapeRead::Single {
                    total_supply: to_real(read_uint(stage, outcomes, offset)?, decimals),
                    decimals,
                    staked: to_real(read_uint(stage, outcomes, offset + 2)?, decimals),
                }
            }
            ShapeKind::Pair => {
                let decimals = read_decimals(stage, outcomes, offset + 3)?;
                ShapeRead::Pair {
                    token0: read_address(stage, outcomes, offset)?,
                    token1: read_address(stage, outcomes, offset + 1)?,
                    total_supply: to_real(read_uint(stage, outcomes, offset + 2)?, decimals),
                    decimals,
                    staked: to_real(read_uint(stage, outcomes, offset + 4)?, decimals),
                }
            }
            ShapeKind::Native => ShapeRead::Native,
            ShapeKind::Skipped => ShapeRead::Skipped,
        };
        offset += kind.call_count();
        reads.push(read);
    }
    Ok(reads)
}

/// Stage 3 de-multiplexer, fixed stride of [`UNDERLYING_CALLS`].
pub fn demux_underlying_reads(
    pair_count: usize,
    outcomes: &[CallOutcome],
) -> Result<Vec<UnderlyingRead>, PopulationError> {
    let stage = Stage::UnderlyingReads;
    expect_len(stage, pair_count * UNDERLYING_CALLS, outcomes.len())?;

    (0..pair_count)
        .map(|i| {
            let base = i * UNDERLYING_CALLS;
            let decimals0 = read_decimals(stage, outcomes, base)?;
            let decimals1 = read_decimals(stage, outcomes, base + 1)?;
            let (raw0, raw1) = i_uniswap_v2_pair::decode_reserves(outcome_data(stage, outcomes, base + 2)?)
                .ok_or(PopulationError::MalformedResult {
                    stage,
                    index: base + 2,
                })?;
            Ok(UnderlyingRead {
                decimals0,
                decimals1,
                reserve0: to_real(raw0, decimals0),
                reserve1: to_real(raw1, decimals1),
            })
        })
        .collect()
}

/// Joins descriptors with stage 2 and stage 3 reads. `underlying` is in pair order.
fn assemble_pools(
    descriptors: &[PoolDescriptor],
    shapes: Vec<ShapeRead>,
    underlying: Vec<UnderlyingRead>,
) -> Vec<Pool> {
    let mut underlying = underlying.into_iter();
    descriptors
        .iter()
        .zip(shapes)
        .filter_map(|(d, shape)| {
            let pool = match shape {
                ShapeRead::Single {
                    total_supply,
                    decimals,
                    staked,
                } => Pool::SingleAsset(SingleAssetPool {
                    pid: d.pid,
                    lp_token: Token {
                        address: d.lp_address,
                        decimals,
                        total_supply: Some(total_supply),
                        reserve: Some(staked),
                        token_type: TokenType::SingleAsset,
                    },
                    alloc_weight: d.alloc_weight,
                    staked_amount: staked,
                }),
                ShapeRead::Native => Pool::SingleAsset(SingleAssetPool {
                    pid: d.pid,
                    lp_token: Token {
                        address: d.lp_address,
                        decimals: NATIVE_DECIMALS,
                        total_supply: None,
                        reserve: Some(0.0),
                        token_type: TokenType::SingleAsset,
                    },
                    alloc_weight: d.alloc_weight,
                    staked_amount: 0.0,
                }),
                ShapeRead::Pair {
                    token0,
                    token1,
                    total_supply,
                    decimals,
                    staked,
                } => {
                    let reads = underlying.next()?;
                    Pool::PairAsset(PairAssetPool {
                        pid: d.pid,
                        lp_token: Token {
                            address: d.lp_address,
                            decimals,
                            total_supply: Some(total_supply),
                            reserve: None,
                            token_type: TokenType::PairAsset,
                        },
                        token0: Token {
                            address: token0,
                            decimals: reads.decimals0,
                            total_supply: None,
                            reserve: Some(reads.reserve0),
                            token_type: TokenType::SingleAsset,
                        },
                        token1: Token {
                            address: token1,
                            decimals: reads.decimals1,
                            total_supply: None,
                            reserve: Some(reads.reserve1),
                            token_type: TokenType::SingleAsset,
                        },
                        alloc_weight: d.alloc_weight,
                        staked_amount: staked,
                    })
                }
                ShapeRead::Skipped => Pool::Unclassified(UnclassifiedPool {
                    pid: d.pid,
                    lp_address: d.lp_address,
                    alloc_weight: d.alloc_weight,
                }),
            };
            debug!("pid {} -> {} ({:?})", d.pid, pool.token_type(), d.lp_address);
            Some(pool)
        })
        .collect()
}
