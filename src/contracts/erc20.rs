use ethers::abi::{AbiDecode, AbiEncode};
use ethers::prelude::abigen;
use ethers::types::{Address, Bytes};

abigen!(
    Erc20,
    r#"[
        function name() external view returns (string)
        function decimals() external view returns (uint8)
        function totalSupply() external view returns (uint256)
        function balanceOf(address account) external view returns (uint256)
    ]"#
);

pub fn name() -> Bytes {
    NameCall.encode().into()
}

pub fn decimals() -> Bytes {
    DecimalsCall.encode().into()
}

pub fn total_supply() -> Bytes {
    TotalSupplyCall.encode().into()
}

pub fn balance_of(account: Address) -> Bytes {
    BalanceOfCall { account }.encode().into()
}

/// `name()` as an ABI string, or as the right-padded bytes32 some older tokens return.
pub fn decode_name(data: &[u8]) -> Option<String> {
    if let Ok(NameReturn(name)) = NameReturn::decode(data) {
        return Some(name);
    }
    (data.len() == 32).then(|| String::from_utf8_lossy(data).trim_end_matches('\0').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{self, Token};

    #[test]
    fn selectors_match_erc20() {
        assert_eq!(&name()[..], &[0x06, 0xfd, 0xde, 0x03]);
        assert_eq!(&decimals()[..], &[0x31, 0x3c, 0xe5, 0x67]);
        assert_eq!(&total_supply()[..], &[0x18, 0x16, 0x0d, 0xdd]);

        let data = balance_of(Address::from_low_u64_be(7));
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(data.len(), 36);
        assert_eq!(data[35], 7);
    }

    #[test]
    fn decodes_string_and_bytes32_names() {
        let name = abi::encode(&[Token::String("Wrapped Fantom".into())]);
        assert_eq!(decode_name(&name).as_deref(), Some("Wrapped Fantom"));

        let mut legacy = [0u8; 32];
        legacy[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_name(&legacy).as_deref(), Some("MKR"));

        // an all-zero bytes32 name is still an answer
        assert_eq!(decode_name(&[0u8; 32]).as_deref(), Some(""));
        assert_eq!(decode_name(&[0u8; 4]), None);
        assert_eq!(decode_name(&[]), None);
    }
}
