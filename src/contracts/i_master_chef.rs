use super::{decode_uint, encode_call, word};
use ethers::abi::Token;
use ethers::types::{Address, Bytes, U256};

// MasterChef forks share poolLength/totalAllocPoint/poolInfo but name their emission
// accessor freely (booPerSecond, spiritPerBlock, ...), so that one is built from config.

pub fn pool_length() -> Bytes {
    encode_call("poolLength()", &[])
}

pub fn total_alloc_point() -> Bytes {
    encode_call("totalAllocPoint()", &[])
}

pub fn pool_info(pid: u64) -> Bytes {
    encode_call("poolInfo(uint256)", &[Token::Uint(U256::from(pid))])
}

/// Zero-argument accessor returning one fixed-point number, e.g. `booPerSecond`.
/// Returns `None` when `accessor` is not a plain Solidity identifier.
pub fn reward_rate(accessor: &str) -> Option<Bytes> {
    is_identifier(accessor).then(|| encode_call(&format!("{}()", accessor), &[]))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Reads the staked token address and allocation points out of a `poolInfo` struct.
///
/// Only static words are read, so the remaining fields of the struct (whatever the
/// fork put there) do not matter.
pub fn decode_pool_info(data: &[u8], lp_token_word: usize, alloc_point_word: usize) -> Option<(Address, U256)> {
    let lp_word = word(data, lp_token_word)?;
    // Addresses are left-padded; a dirty high part means the layout is wrong.
    if lp_word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    let lp_token = Address::from_slice(&lp_word[12..]);
    let alloc_point = decode_uint(word(data, alloc_point_word)?)?;
    Some((lp_token, alloc_point))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi;

    #[test]
    fn reward_rate_accessor_must_be_identifier() {
        assert!(reward_rate("booPerSecond").is_some());
        assert!(reward_rate("emission_per_second").is_some());
        assert!(reward_rate("").is_none());
        assert!(reward_rate("booPerSecond()").is_none());
        assert!(reward_rate("1st").is_none());
    }

    #[test]
    fn accessor_selector_is_keccak_of_signature() {
        let data = reward_rate("booPerSecond").unwrap();
        assert_eq!(&data[..], &ethers::utils::id("booPerSecond()"));
    }

    #[test]
    fn decodes_default_and_custom_layouts() {
        let lp = Address::from_low_u64_be(0xabc);
        // spooky: (lpToken, allocPoint, lastRewardTime, accBooPerShare)
        let spooky = abi::encode(&[
            Token::Address(lp),
            Token::Uint(U256::from(150u64)),
            Token::Uint(U256::from(1_630_000_000u64)),
            Token::Uint(U256::from(42u64)),
        ]);
        assert_eq!(decode_pool_info(&spooky, 0, 1), Some((lp, U256::from(150u64))));

        // a fork that puts allocPoint third
        let other = abi::encode(&[
            Token::Address(lp),
            Token::Uint(U256::from(9u64)),
            Token::Uint(U256::from(300u64)),
        ]);
        assert_eq!(decode_pool_info(&other, 0, 2), Some((lp, U256::from(300u64))));

        // a layout that points the address at a large number is rejected
        let wrong = abi::encode(&[Token::Uint(U256::MAX), Token::Uint(U256::one())]);
        assert_eq!(decode_pool_info(&wrong, 0, 1), None);
        assert_eq!(decode_pool_info(&spooky[..32], 0, 1), None);
    }
}
