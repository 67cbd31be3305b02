// src/token_catalog.rs

use crate::apr::TradingPairQuery;
use crate::price_feeds::PriceService;
use crate::settings::TokenConfig;
use crate::types::conversions::address_to_string;
use crate::types::RewardToken;
use ethers::prelude::Address;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown token {0}")]
    UnknownToken(String),
    #[error("duplicate token name {0}")]
    DuplicateName(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogToken {
    pub name: String,
    pub coingecko_id: Option<String>,
    pub address: Address,
    pub decimals: u32,
    pub eth_pair: Option<Address>,
}

impl From<&TokenConfig> for CatalogToken {
    fn from(config: &TokenConfig) -> Self {
        Self {
            name: config.name.clone(),
            coingecko_id: config.coingecko_id.clone(),
            address: config.address,
            decimals: config.decimals,
            eth_pair: config.eth_pair,
        }
    }
}

/// Named tokens of one chain. Names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct TokenCatalog {
    tokens: Vec<CatalogToken>,
    by_name: HashMap<String, usize>,
    by_address: HashMap<Address, usize>,
}

impl TokenCatalog {
    pub fn new(tokens: Vec<CatalogToken>) -> Result<Self, CatalogError> {
        let mut by_name = HashMap::with_capacity(tokens.len());
        let mut by_address = HashMap::with_capacity(tokens.len());
        for (index, token) in tokens.iter().enumerate() {
            if by_name.insert(token.name.to_lowercase(), index).is_some() {
                return Err(CatalogError::DuplicateName(token.name.clone()));
            }
            by_address.entry(token.address).or_insert(index);
        }
        Ok(Self {
            tokens,
            by_name,
            by_address,
        })
    }

    pub fn from_settings(tokens: &[TokenConfig]) -> Result<Self, CatalogError> {
        Self::new(tokens.iter().map(CatalogToken::from).collect())
    }

    pub fn tokens(&self) -> &[CatalogToken] {
        &self.tokens
    }

    pub fn by_name(&self, name: &str) -> Option<&CatalogToken> {
        self.by_name.get(&name.to_lowercase()).map(|i| &self.tokens[*i])
    }

    pub fn by_address(&self, address: &Address) -> Option<&CatalogToken> {
        self.by_address.get(address).map(|i| &self.tokens[*i])
    }

    pub fn require(&self, name: &str) -> Result<&CatalogToken, CatalogError> {
        self.by_name(name)
            .ok_or_else(|| CatalogError::UnknownToken(name.to_string()))
    }

    /// Builds the query for a named pair. An unknown token or a missing price
    /// excludes the pair; prices are never defaulted to zero.
    pub fn pair_query(&self, name_a: &str, name_b: &str, prices: &dyn PriceService) -> Option<TradingPairQuery> {
        let a = self.by_name(name_a)?;
        let b = self.by_name(name_b)?;
        Some(TradingPairQuery::new(
            a.address,
            b.address,
            prices.price_of(&a.address)?,
            prices.price_of(&b.address)?,
        ))
    }

    /// Reward token descriptor with whatever price is currently known.
    pub fn reward_token(&self, address: &Address, prices: &dyn PriceService) -> Result<RewardToken, CatalogError> {
        let token = self
            .by_address(address)
            .ok_or_else(|| CatalogError::UnknownToken(address_to_string(*address)))?;
        Ok(RewardToken::new(token.address, token.decimals, prices.price_of(address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_feeds::SharedPriceCache;

    fn token(name: &str, n: u64, decimals: u32) -> CatalogToken {
        CatalogToken {
            name: name.to_string(),
            coingecko_id: None,
            address: Address::from_low_u64_be(n),
            decimals,
            eth_pair: None,
        }
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let catalog = TokenCatalog::new(vec![token("wftm", 1, 18), token("dKnight", 2, 18)]).unwrap();
        assert_eq!(catalog.by_name("WFTM").map(|t| t.decimals), Some(18));
        assert!(catalog.by_name("dknight").is_some());
        assert!(catalog.by_address(&Address::from_low_u64_be(2)).is_some());
        assert!(matches!(catalog.require("nope"), Err(CatalogError::UnknownToken(_))));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = TokenCatalog::new(vec![token("usdc", 1, 6), token("USDC", 2, 6)]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName(_)));
    }

    #[test]
    fn pair_query_needs_both_prices() {
        let catalog = TokenCatalog::new(vec![token("wftm", 1, 18), token("boo", 2, 18)]).unwrap();
        let prices = SharedPriceCache::new();
        prices.set_price(Address::from_low_u64_be(1), 0.5);
        assert!(catalog.pair_query("wftm", "boo", &prices).is_none());

        prices.set_price(Address::from_low_u64_be(2), 4.0);
        let query = catalog.pair_query("wftm", "boo", &prices).unwrap();
        assert_eq!(query.usd_price_a, 0.5);
        assert_eq!(query.usd_price_b, 4.0);
        assert_eq!(query.token_b, Address::from_low_u64_be(2));

        let reward = catalog.reward_token(&Address::from_low_u64_be(2), &prices).unwrap();
        assert_eq!(reward.usd_price, Some(4.0));

        let err = catalog.reward_token(&Address::from_low_u64_be(0xb0b), &prices).unwrap_err();
        assert_eq!(
            err.to_string(),
            CatalogError::UnknownToken("0x0000000000000000000000000000000000000b0b".into()).to_string()
        );
    }
}
