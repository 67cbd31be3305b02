// Contracts Module - calldata and decoders for the read-only calls the fetcher batches.
//
// Fixed interfaces come from `abigen!` call types; MasterChef reads are encoded at runtime
// because forks differ. Nothing here needs a provider.

pub mod erc20;
pub mod i_master_chef;
pub mod i_uniswap_v2_pair;

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

/// Encodes `signature` (e.g. `"balanceOf(address)"`) with its arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    if !args.is_empty() {
        data.extend_from_slice(&abi::encode(args));
    }
    Bytes::from(data)
}

pub fn decode_uint(data: &[u8]) -> Option<U256> {
    abi::decode(&[ParamType::Uint(256)], data)
        .ok()?
        .into_iter()
        .next()?
        .into_uint()
}

/// Small unsigned value such as `decimals()`; anything above `u32::MAX` is rejected.
pub fn decode_small_uint(data: &[u8]) -> Option<u32> {
    let value = decode_uint(data)?;
    (value <= U256::from(u32::MAX)).then(|| value.as_u32())
}

pub fn decode_address(data: &[u8]) -> Option<Address> {
    abi::decode(&[ParamType::Address], data)
        .ok()?
        .into_iter()
        .next()?
        .into_address()
}

/// 32-byte word `index` of raw return data.
pub fn word(data: &[u8], index: usize) -> Option<&[u8]> {
    data.get(index * 32..(index + 1) * 32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_selector_and_arguments() {
        let data = encode_call("balanceOf(address)", &[Token::Address(Address::from_low_u64_be(7))]);
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(data.len(), 36);
        assert_eq!(data[35], 7);

        let no_args = encode_call("decimals()", &[]);
        assert_eq!(&no_args[..], &[0x31, 0x3c, 0xe5, 0x67]);
    }

    #[test]
    fn decoders_reject_short_data() {
        assert_eq!(decode_uint(&[]), None);
        assert_eq!(decode_address(&[0u8; 4]), None);
        assert_eq!(decode_small_uint(&[0u8; 31]), None);
    }

    #[test]
    fn decodes_words() {
        let encoded = abi::encode(&[Token::Uint(U256::from(18u8))]);
        assert_eq!(decode_small_uint(&encoded), Some(18));
        let too_big = abi::encode(&[Token::Uint(U256::MAX)]);
        assert_eq!(decode_small_uint(&too_big), None);

        let two = abi::encode(&[Token::Uint(1.into()), Token::Uint(2.into())]);
        assert_eq!(word(&two, 1).map(|w| w[31]), Some(2));
        assert_eq!(word(&two, 2), None);
    }
}
