//! Shared data types: unit conversion and token descriptors.

pub mod conversions;
pub mod token;

pub use conversions::{to_real, ConversionError};
pub use token::{RewardToken, Token, TokenType};
