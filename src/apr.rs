// src/apr.rs

use crate::fetcher::StakingContractState;
use crate::pools::{PairAssetPool, Pool};
use ethers::prelude::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;

/// One pair to price against a populated staking contract. Supplied per query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradingPairQuery {
    pub token_a: Address,
    pub token_b: Address,
    pub usd_price_a: f64,
    pub usd_price_b: f64,
}

impl TradingPairQuery {
    pub fn new(token_a: Address, token_b: Address, usd_price_a: f64, usd_price_b: f64) -> Self {
        Self {
            token_a,
            token_b,
            usd_price_a,
            usd_price_b,
        }
    }
}

/// Annualized reward rate for one pair, or an explicit "cannot compute".
///
/// `NoData` covers zero total allocation, zero reserve value, a missing reward
/// token price and any non-finite intermediate. It is never folded into `0`
/// here; callers that want a plain number use [`AprValue::as_percent`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AprValue {
    Percent(f64),
    NoData,
}

impl AprValue {
    fn from_finite(value: f64) -> Self {
        if value.is_finite() {
            AprValue::Percent(value)
        } else {
            AprValue::NoData
        }
    }

    pub fn as_percent(&self) -> f64 {
        match self {
            AprValue::Percent(p) => *p,
            AprValue::NoData => 0.0,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, AprValue::NoData)
    }
}

impl fmt::Display for AprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AprValue::Percent(p) => write!(f, "{:.2}%", p),
            AprValue::NoData => f.write_str("n/a"),
        }
    }
}

/// One result per query, same order.
pub fn compute_aprs(state: &StakingContractState, pairs: &[TradingPairQuery]) -> Vec<AprValue> {
    pairs.iter().map(|pair| pair_apr(state, pair)).collect()
}

pub fn pair_apr(state: &StakingContractState, pair: &TradingPairQuery) -> AprValue {
    if !(state.total_alloc_weight > 0.0) {
        return AprValue::NoData;
    }

    let Some(pool) = find_pair_pool(&state.pools, pair.token_a, pair.token_b) else {
        return AprValue::Percent(0.0);
    };

    let Some(reward_price) = state.reward_token.usd_price else {
        return AprValue::NoData;
    };
    let Some((reserve0, reserve1)) = pool.reserves() else {
        return AprValue::NoData;
    };

    let (price0, price1) = if pool.token0.address == pair.token_a {
        (pair.usd_price_a, pair.usd_price_b)
    } else {
        (pair.usd_price_b, pair.usd_price_a)
    };

    let yearly_reward_value = state.reward_rate_per_second
        * SECONDS_PER_YEAR
        * reward_price
        * (pool.alloc_weight / state.total_alloc_weight);
    let reserve_value = reserve0 * price0 + reserve1 * price1;
    if !(reserve_value > 0.0) {
        return AprValue::NoData;
    }

    AprValue::from_finite(yearly_reward_value / reserve_value * 100.0)
}

/// First pair-asset pool in discovery order holding exactly `{a, b}`.
pub fn find_pair_pool(pools: &[Pool], a: Address, b: Address) -> Option<&PairAssetPool> {
    pools.iter().find_map(|pool| match pool {
        Pool::PairAsset(p)
            if (p.token0.address == a && p.token1.address == b)
                || (p.token0.address == b && p.token1.address == a) =>
        {
            Some(p)
        }
        _ => None,
    })
}
