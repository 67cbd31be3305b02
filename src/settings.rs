use crate::contracts::i_master_chef;
use crate::types::conversions::{address_to_string, string_to_address};
use config::{Config, ConfigError, File, FileFormat};
use ethers::types::Address;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    pub http_url: String,
    /// Multicall3 deployment (`aggregate3`).
    #[serde(default = "default_multicall_address")]
    pub multicall_address: Address,
    #[serde(default = "default_multicall_batch_size")]
    pub multicall_batch_size: usize,
    #[serde(default = "default_multicall_timeout_seconds")]
    pub multicall_timeout_seconds: u64,
}

fn default_multicall_address() -> Address {
    // Canonical Multicall3 address, identical on every chain it is deployed to.
    Address::from([
        0xca, 0x11, 0xbd, 0xe0, 0x59, 0x77, 0xb3, 0x63, 0x11, 0x67, 0x02, 0x88, 0x62, 0xbe, 0x2a, 0x17, 0x39, 0x76,
        0xca, 0x11,
    ])
}
fn default_multicall_batch_size() -> usize {
    200
}
fn default_multicall_timeout_seconds() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClassificationCache {
    /// JSON file backing the classification store; in-memory only when unset.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PriceFeeds {
    #[serde(default = "default_coingecko_base_url")]
    pub coingecko_base_url: String,
    /// Catalog name of the wrapped native token used to price `eth_pair` tokens.
    #[serde(default = "default_native_token")]
    pub native_token: String,
    #[serde(default = "default_price_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_coingecko_base_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}
fn default_native_token() -> String {
    "wftm".to_string()
}
fn default_price_request_timeout_seconds() -> u64 {
    10
}

impl Default for PriceFeeds {
    fn default() -> Self {
        Self {
            coingecko_base_url: default_coingecko_base_url(),
            native_token: default_native_token(),
            request_timeout_seconds: default_price_request_timeout_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    pub name: String,
    #[serde(default)]
    pub coingecko_id: Option<String>,
    pub address: Address,
    pub decimals: u32,
    /// Pair against the native token, used when there is no CoinGecko listing.
    #[serde(default)]
    pub eth_pair: Option<Address>,
}

/// Which 32-byte words of `poolInfo(pid)` hold the staked token and its allocation points.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PoolInfoLayout {
    #[serde(default)]
    pub lp_token_word: usize,
    #[serde(default = "default_alloc_point_word")]
    pub alloc_point_word: usize,
}

fn default_alloc_point_word() -> usize {
    1
}

impl Default for PoolInfoLayout {
    fn default() -> Self {
        Self {
            lp_token_word: 0,
            alloc_point_word: default_alloc_point_word(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StakingContractConfig {
    pub name: String,
    pub address: Address,
    pub reward_token: Address,
    /// Zero-argument view returning the emission rate, e.g. `booPerSecond`.
    pub reward_rate_accessor: String,
    #[serde(default)]
    pub pool_info: PoolInfoLayout,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub rpc: Rpc,
    #[serde(default)]
    pub classification_cache: ClassificationCache,
    #[serde(default)]
    pub price_feeds: PriceFeeds,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    #[serde(default)]
    pub staking_contracts: Vec<StakingContractConfig>,
    /// Pairs of catalog token names, e.g. `[["wftm", "wbtc"]]`.
    #[serde(default)]
    pub pairs: Vec<Vec<String>>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_path("Config.toml")
    }

    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses and validates an inline TOML document. No environment overrides.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: Self = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("SDK_RPC_HTTP_URL") {
            let trimmed = url.trim();
            if !trimmed.is_empty() {
                self.rpc.http_url = trimmed.to_string();
            }
        }
        if let Ok(path) = env::var("SDK_CLASSIFICATION_CACHE_PATH") {
            let trimmed = path.trim();
            self.classification_cache.path = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        if let Ok(address) = env::var("SDK_MULTICALL_ADDRESS") {
            self.override_multicall_address(&address)?;
        }
        Ok(())
    }

    fn override_multicall_address(&mut self, raw: &str) -> Result<(), ConfigError> {
        self.rpc.multicall_address =
            string_to_address(raw).map_err(|e| invalid(format!("SDK_MULTICALL_ADDRESS: {}", e)))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.rpc.http_url)
            .map_err(|e| invalid(format!("rpc.http_url {:?}: {}", self.rpc.http_url, e)))?;
        if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(invalid(format!("rpc.http_url has unsupported scheme {}", url.scheme())));
        }
        if self.rpc.multicall_address.is_zero() {
            return Err(invalid("rpc.multicall_address must not be the zero address"));
        }
        url::Url::parse(&self.price_feeds.coingecko_base_url)
            .map_err(|e| invalid(format!("price_feeds.coingecko_base_url: {}", e)))?;

        let mut names = HashSet::new();
        for token in &self.tokens {
            if token.name.trim().is_empty() {
                return Err(invalid(format!("token {} has an empty name", address_to_string(token.address))));
            }
            if !names.insert(token.name.to_lowercase()) {
                return Err(invalid(format!("duplicate token name {}", token.name)));
            }
        }
        if !self.tokens.is_empty() && !names.contains(&self.price_feeds.native_token.to_lowercase()) {
            return Err(invalid(format!(
                "price_feeds.native_token {} is not in the token catalog",
                self.price_feeds.native_token
            )));
        }

        let mut contract_names = HashSet::new();
        for chef in &self.staking_contracts {
            if chef.name.trim().is_empty() {
                return Err(invalid(format!(
                    "staking contract {} has an empty name",
                    address_to_string(chef.address)
                )));
            }
            if !contract_names.insert(chef.name.as_str()) {
                return Err(invalid(format!("duplicate staking contract name {}", chef.name)));
            }
            if i_master_chef::reward_rate(&chef.reward_rate_accessor).is_none() {
                return Err(invalid(format!(
                    "{}: reward_rate_accessor {:?} is not a function name",
                    chef.name, chef.reward_rate_accessor
                )));
            }
            if !self.tokens.iter().any(|t| t.address == chef.reward_token) {
                return Err(invalid(format!(
                    "{}: reward token {} is not in the token catalog",
                    chef.name,
                    address_to_string(chef.reward_token)
                )));
            }
            if chef.pool_info.lp_token_word == chef.pool_info.alloc_point_word {
                return Err(invalid(format!(
                    "{}: pool_info words must differ",
                    chef.name
                )));
            }
        }

        for pair in &self.pairs {
            if pair.len() != 2 {
                return Err(invalid(format!("pair {:?} must name exactly two tokens", pair)));
            }
            for name in pair {
                if !names.contains(&name.to_lowercase()) {
                    return Err(invalid(format!("pair {:?} names unknown token {}", pair, name)));
                }
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Message(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        pairs = [["wftm", "boo"]]

        [rpc]
        http_url = "https://rpc.ftm.tools"

        [[tokens]]
        name = "wftm"
        coingecko_id = "fantom"
        address = "0x21be370D5312f44cB42ce377BC9b8a0cEF1A4C83"
        decimals = 18

        [[tokens]]
        name = "boo"
        address = "0x841fad6eae12c286d1fd18d1d525dffa75c7effe"
        decimals = 18
        eth_pair = "0xEc7178F4C41f346b2721907F5cF7628E388A7a58"

        [[staking_contracts]]
        name = "spooky"
        address = "0x2b2929E785374c651a81A63878Ab22742656DcDd"
        reward_token = "0x841fad6eae12c286d1fd18d1d525dffa75c7effe"
        reward_rate_accessor = "booPerSecond"
    "#;

    #[test]
    fn minimal_document_gets_defaults() {
        let settings = Settings::from_toml_str(MINIMAL).unwrap();
        assert_eq!(settings.rpc.multicall_batch_size, 200);
        assert_eq!(settings.rpc.multicall_timeout_seconds, 10);
        assert_eq!(
            settings.rpc.multicall_address,
            "0xcA11bde05977b3631167028862bE2a173976CA11".parse::<Address>().unwrap()
        );
        assert_eq!(settings.price_feeds.native_token, "wftm");
        assert!(settings.classification_cache.path.is_none());

        let chef = &settings.staking_contracts[0];
        assert_eq!(chef.pool_info, PoolInfoLayout::default());
        assert_eq!(settings.tokens[1].coingecko_id, None);
        assert!(settings.tokens[1].eth_pair.is_some());
    }

    #[test]
    fn custom_pool_info_layout() {
        let raw = MINIMAL.replace(
            r#"reward_rate_accessor = "booPerSecond""#,
            "reward_rate_accessor = \"booPerSecond\"\n        pool_info = { lp_token_word = 2, alloc_point_word = 0 }",
        );
        let settings = Settings::from_toml_str(&raw).unwrap();
        assert_eq!(
            settings.staking_contracts[0].pool_info,
            PoolInfoLayout {
                lp_token_word: 2,
                alloc_point_word: 0
            }
        );
    }

    #[test]
    fn rejects_unknown_reward_token() {
        let raw = MINIMAL.replace(
            r#"reward_token = "0x841fad6eae12c286d1fd18d1d525dffa75c7effe""#,
            r#"reward_token = "0x0000000000000000000000000000000000000001""#,
        );
        let err = Settings::from_toml_str(&raw).unwrap_err();
        assert!(err
            .to_string()
            .contains("reward token 0x0000000000000000000000000000000000000001"));
    }

    #[test]
    fn multicall_address_override() {
        let mut settings = Settings::from_toml_str(MINIMAL).unwrap();
        settings
            .override_multicall_address(" 0xcA11bde05977b3631167028862bE2a173976CA12 ")
            .unwrap();
        assert_eq!(
            address_to_string(settings.rpc.multicall_address),
            "0xca11bde05977b3631167028862be2a173976ca12"
        );

        let err = settings.override_multicall_address("multicall").unwrap_err();
        assert!(err.to_string().contains("SDK_MULTICALL_ADDRESS"));
    }

    #[test]
    fn rejects_bad_accessor_and_pairs() {
        let raw = MINIMAL.replace("booPerSecond", "booPerSecond()");
        assert!(Settings::from_toml_str(&raw).is_err());

        let raw = MINIMAL.replace(r#"pairs = [["wftm", "boo"]]"#, r#"pairs = [["wftm", "nope"]]"#);
        assert!(Settings::from_toml_str(&raw).is_err());

        let raw = MINIMAL.replace(r#"pairs = [["wftm", "boo"]]"#, r#"pairs = [["wftm"]]"#);
        assert!(Settings::from_toml_str(&raw).is_err());
    }

    #[test]
    fn rejects_bad_url() {
        let raw = MINIMAL.replace("https://rpc.ftm.tools", "rpc.ftm.tools");
        assert!(Settings::from_toml_str(&raw).is_err());
    }

    #[test]
    fn shipped_config_is_valid() {
        let settings = Settings::from_toml_str(include_str!("../Config.toml")).unwrap();
        assert_eq!(settings.staking_contracts.len(), 7);
        assert!(settings.pairs.iter().all(|p| p.len() == 2));
        assert!(settings
            .tokens
            .iter()
            .any(|t| t.name == "wftm" && t.coingecko_id.as_deref() == Some("fantom")));
    }
}
