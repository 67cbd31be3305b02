use ethers::types::{Address, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Converts a fixed-point on-chain integer scaled by `10^decimals` into a real number.
///
/// Values that fit `Decimal` (96-bit mantissa, scale <= 28) are scaled exactly and only
/// rounded once, on the final `f64` conversion. Anything wider (huge supplies, exotic
/// decimals) goes through a float path, which keeps the magnitude right even when the
/// last digits are lost.
pub fn to_real(raw: U256, decimals: u32) -> f64 {
    if let Ok(value) = u256_to_decimal(raw, decimals) {
        if let Some(real) = value.to_f64() {
            return real;
        }
    }
    wide_to_real(raw, decimals)
}

fn wide_to_real(raw: U256, decimals: u32) -> f64 {
    // Decimal strings of a U256 always parse as f64.
    let value = raw.to_string().parse::<f64>().unwrap_or(f64::MAX);
    value / 10f64.powi(decimals.min(i32::MAX as u32) as i32)
}

/// Exact decimal form of `value / 10^decimals`, when it is representable.
pub fn u256_to_decimal(value: U256, decimals: u32) -> Result<Decimal, ConversionError> {
    if value > U256::from(i128::MAX as u128) {
        return Err(ConversionError::Overflow);
    }
    Decimal::try_from_i128_with_scale(value.as_u128() as i128, decimals)
        .map_err(|e| ConversionError::InvalidDecimal(e.to_string()))
}

// Addresses
pub fn address_to_string(addr: Address) -> String {
    format!("{:?}", addr).to_lowercase()
}

pub fn string_to_address(s: &str) -> Result<Address, ConversionError> {
    Address::from_str(s.trim()).map_err(|e| ConversionError::InvalidAddress(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),
    #[error("Overflow in conversion")]
    Overflow,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        if b == 0.0 {
            return a.abs() < 1e-12;
        }
        ((a - b) / b).abs() < 1e-12
    }

    #[test]
    fn zero_decimals_is_passthrough() {
        assert_eq!(to_real(U256::from(42u64), 0), 42.0);
        assert_eq!(to_real(U256::zero(), 0), 0.0);
    }

    #[test]
    fn scales_by_decimals() {
        // 1.5 tokens with 18 decimals
        let raw = U256::from(1_500_000_000_000_000_000u128);
        assert!(close(to_real(raw, 18), 1.5));
        // 123.456789 USDC
        assert!(close(to_real(U256::from(123_456_789u64), 6), 123.456789));
        // 0.00000001 WBTC
        assert!(close(to_real(U256::from(1u64), 8), 1e-8));
    }

    #[test]
    fn matches_plain_division_for_all_supported_decimals() {
        let samples = [
            1u128,
            999,
            1_000_000,
            123_456_789_012_345_678,
            10u128.pow(27) + 7,
        ];
        for decimals in 0..=18u32 {
            for &n in &samples {
                let expected = n as f64 / 10f64.powi(decimals as i32);
                let got = to_real(U256::from(n), decimals);
                assert!(close(got, expected), "n={} d={} got={} expected={}", n, decimals, got, expected);
            }
        }
    }

    #[test]
    fn monotonic_in_raw_value() {
        for decimals in [0u32, 6, 8, 12, 18] {
            let mut previous = -1.0;
            for step in 0..200u64 {
                let raw = U256::from(step) * U256::exp10(15);
                let value = to_real(raw, decimals);
                assert!(value >= previous, "not monotonic at step {} (d={})", step, decimals);
                previous = value;
            }
        }
    }

    #[test]
    fn values_wider_than_decimal_fall_back_to_float() {
        // 10^40 wei is far outside Decimal's 96-bit mantissa.
        let raw = U256::exp10(40);
        assert!(u256_to_decimal(raw, 18).is_err());
        assert!(close(to_real(raw, 18), 1e22));
        assert!(close(to_real(U256::MAX, 0), 1.157920892373162e77));
    }

    #[test]
    fn addresses_round_trip_lowercase() {
        let addr = string_to_address("0x21be370D5312f44cB42ce377BC9b8a0cEF1A4C83").unwrap();
        assert_eq!(
            address_to_string(addr),
            "0x21be370d5312f44cb42ce377bc9b8a0cef1a4c83"
        );
        assert!(string_to_address("not-an-address").is_err());
    }
}
