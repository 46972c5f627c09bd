//! Storage slot derivation and word conversions for simulated contracts,
//! following Solidity's layout rules for mappings

use alloy_primitives::{keccak256, Address, B256, U256};

/// The base slot of a named storage variable
pub fn slot(label: &str) -> B256 {
    keccak256(label.as_bytes())
}

/// The slot of `key` within the mapping rooted at `base`
pub fn mapping_slot(base: B256, key: B256) -> B256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(key.as_slice());
    preimage[32..].copy_from_slice(base.as_slice());
    keccak256(preimage)
}

/// Left-pad an address into a word
pub fn address_word(address: Address) -> B256 {
    address.into_word()
}

/// The address held in the low 20 bytes of a word
pub fn word_address(word: B256) -> Address {
    Address::from_word(word)
}

/// A big-endian word holding `value`
pub fn u256_word(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

/// The integer held in a big-endian word
pub fn word_u256(word: B256) -> U256 {
    U256::from_be_bytes(word.0)
}

/// A word holding a boolean
pub fn bool_word(value: bool) -> B256 {
    u256_word(U256::from(value as u8))
}

/// Whether a word holds a non-zero value
pub fn word_bool(word: B256) -> bool {
    word != B256::ZERO
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{b256, Address, U256};

    use super::*;

    #[test]
    fn test_word_conversions() {
        let address = Address::repeat_byte(0xab);
        assert_eq!(word_address(address_word(address)), address);
        assert_eq!(word_u256(u256_word(U256::from(42u64))), U256::from(42u64));
        assert!(word_bool(bool_word(true)));
        assert!(!word_bool(bool_word(false)));
    }

    #[test]
    fn test_mapping_slot_matches_solidity_layout() {
        // keccak256(abi.encode(uint256(1), uint256(0)))
        let slot = mapping_slot(B256::ZERO, u256_word(U256::from(1u64)));
        assert_eq!(
            slot,
            b256!("ada5013122d395ba3c54772283fb069b10426056ef8ca54750cb9bb552a59e7d")
        );
    }
}
