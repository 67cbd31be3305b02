// src/pools.rs

use ethers::prelude::Address;
use serde::{Deserialize, Serialize};

use crate::types::{Token, TokenType};

/// A pool registered in a staking contract, shaped by what its LP address turned out to be.
///
/// ## Variants
///
/// - **SingleAsset**: the staked token is a plain ERC20; its only underlying token is itself
/// - **PairAsset**: the staked token is a two-asset AMM share with on-chain `token0`/`token1`
/// - **Unclassified**: neither classification probe answered; carries no reserve data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pool {
    SingleAsset(SingleAssetPool),
    PairAsset(PairAssetPool),
    Unclassified(UnclassifiedPool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleAssetPool {
    pub pid: u64,
    /// The staked token. `reserve` holds the amount the staking contract holds.
    pub lp_token: Token,
    pub alloc_weight: f64,
    pub staked_amount: f64,
}

/// Two-asset pool. `token0`/`token1` keep the pair contract's own order; matching
/// against queried pairs relies on it, so it is never re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairAssetPool {
    pub pid: u64,
    pub lp_token: Token,
    pub token0: Token,
    pub token1: Token,
    pub alloc_weight: f64,
    pub staked_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnclassifiedPool {
    pub pid: u64,
    pub lp_address: Address,
    pub alloc_weight: f64,
}

impl PairAssetPool {
    /// Reserves in `token0`/`token1` order, if both have been read.
    pub fn reserves(&self) -> Option<(f64, f64)> {
        Some((self.token0.reserve?, self.token1.reserve?))
    }
}

impl Pool {
    pub fn pid(&self) -> u64 {
        match self {
            Pool::SingleAsset(p) => p.pid,
            Pool::PairAsset(p) => p.pid,
            Pool::Unclassified(p) => p.pid,
        }
    }

    pub fn lp_address(&self) -> Address {
        match self {
            Pool::SingleAsset(p) => p.lp_token.address,
            Pool::PairAsset(p) => p.lp_token.address,
            Pool::Unclassified(p) => p.lp_address,
        }
    }

    pub fn alloc_weight(&self) -> f64 {
        match self {
            Pool::SingleAsset(p) => p.alloc_weight,
            Pool::PairAsset(p) => p.alloc_weight,
            Pool::Unclassified(p) => p.alloc_weight,
        }
    }

    pub fn token_type(&self) -> TokenType {
        match self {
            Pool::SingleAsset(_) => TokenType::SingleAsset,
            Pool::PairAsset(_) => TokenType::PairAsset,
            Pool::Unclassified(_) => TokenType::Unclassified,
        }
    }

    /// Underlying tokens: `[lp]` for single-asset pools, `[token0, token1]` for pairs,
    /// nothing for unclassified pools.
    pub fn underlying_tokens(&self) -> Vec<&Token> {
        match self {
            Pool::SingleAsset(p) => vec![&p.lp_token],
            Pool::PairAsset(p) => vec![&p.token0, &p.token1],
            Pool::Unclassified(_) => Vec::new(),
        }
    }

    pub fn staked_amount(&self) -> Option<f64> {
        match self {
            Pool::SingleAsset(p) => Some(p.staked_amount),
            Pool::PairAsset(p) => Some(p.staked_amount),
            Pool::Unclassified(_) => None,
        }
    }
}
