use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset structure behind an address staked in a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Plain ERC20-like token (answers `name()`).
    SingleAsset,
    /// Two-asset AMM share (answers `token0()`).
    PairAsset,
    /// Neither probe answered. Never cached, never priced.
    Unclassified,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::SingleAsset => "single_asset",
            TokenType::PairAsset => "pair_asset",
            TokenType::Unclassified => "unclassified",
        }
    }

    /// Only terminal classifications may be persisted.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, TokenType::Unclassified)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-chain token as seen by one population pass.
///
/// `total_supply` and `reserve` stay `None` until the stage that reads them has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub decimals: u32,
    pub total_supply: Option<f64>,
    pub reserve: Option<f64>,
    pub token_type: TokenType,
}

impl Token {
    pub fn new(address: Address, token_type: TokenType) -> Self {
        Self {
            address,
            decimals: 0,
            total_supply: None,
            reserve: None,
            token_type,
        }
    }
}

/// Token distributed by a staking contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardToken {
    pub address: Address,
    pub decimals: u32,
    /// USD unit price; `None` until a price service has supplied one.
    pub usd_price: Option<f64>,
}

impl RewardToken {
    pub fn new(address: Address, decimals: u32, usd_price: Option<f64>) -> Self {
        Self {
            address,
            decimals,
            usd_price,
        }
    }
}
