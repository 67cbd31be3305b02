use ethers::abi::{AbiDecode, AbiEncode};
use ethers::prelude::abigen;
use ethers::types::{Bytes, U256};

// LP shares of a V2 pair are ERC20 themselves: totalSupply/decimals/balanceOf come from `erc20`.
abigen!(
    IUniswapV2Pair,
    r#"[
        function token0() external view returns (address)
        function token1() external view returns (address)
        function getReserves() external view returns (uint112, uint112, uint32)
    ]"#
);

pub fn token0() -> Bytes {
    Token0Call.encode().into()
}

pub fn token1() -> Bytes {
    Token1Call.encode().into()
}

pub fn get_reserves() -> Bytes {
    GetReservesCall.encode().into()
}

/// Raw `(reserve0, reserve1)`; the timestamp word is dropped.
pub fn decode_reserves(data: &[u8]) -> Option<(U256, U256)> {
    let GetReservesReturn(reserve0, reserve1, _) = GetReservesReturn::decode(data).ok()?;
    Some((U256::from(reserve0), U256::from(reserve1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{self, Token};

    #[test]
    fn selectors_match_pair_interface() {
        assert_eq!(&token0()[..], &[0x0d, 0xfe, 0x16, 0x81]);
        assert_eq!(&token1()[..], &[0xd2, 0x12, 0x20, 0xa7]);
        assert_eq!(&get_reserves()[..], &[0x09, 0x02, 0xf1, 0xac]);
    }

    #[test]
    fn decodes_reserve_words() {
        let data = abi::encode(&[
            Token::Uint(U256::from(1_000u64)),
            Token::Uint(U256::from(500u64)),
            Token::Uint(U256::from(1_650_000_000u64)),
        ]);
        assert_eq!(decode_reserves(&data), Some((U256::from(1_000u64), U256::from(500u64))));
        assert_eq!(decode_reserves(&data[..64]), None);
    }
}
