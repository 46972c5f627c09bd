//! Utilities for the migration scripts

use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, B256};
use itertools::Itertools;
use tracing::warn;

use crate::{
    constants::{
        DEPLOYMENTS_FILE_NAME, FILTER_SEPARATOR, KEYSTORE_PASSWORD_ENV_VAR, NUM_BYTES_ADDRESS,
        NUM_BYTES_STORAGE_SLOT,
    },
    errors::ScriptError,
};

/// Load the deployer's signer, either from an encrypted keystore (password read from the
/// environment) or from a hex private key
pub fn load_signer(
    keystore: Option<&Path>,
    priv_key: Option<&str>,
) -> Result<PrivateKeySigner, ScriptError> {
    match (keystore, priv_key) {
        (Some(path), _) => {
            let password = env::var(KEYSTORE_PASSWORD_ENV_VAR).map_err(|_| {
                ScriptError::ClientInitialization(format!(
                    "{} must be set to decrypt {}",
                    KEYSTORE_PASSWORD_ENV_VAR,
                    path.display()
                ))
            })?;
            PrivateKeySigner::decrypt_keystore(path, password)
                .map_err(|e| ScriptError::ClientInitialization(e.to_string()))
        }
        (None, Some(key)) => PrivateKeySigner::from_str(key)
            .map_err(|e| ScriptError::ClientInitialization(e.to_string())),
        (None, None) => Err(ScriptError::ClientInitialization(
            "either a keystore or a private key is required".to_string(),
        )),
    }
}

/// The address stored in the low bytes of a storage word.
///
/// This is how the EIP-1967 implementation and admin slots are read:
/// https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v5.0.0/contracts/proxy/ERC1967/ERC1967Utils.sol#L104-L106
pub fn address_from_slot(word: B256) -> Address {
    Address::from_slice(&word[NUM_BYTES_STORAGE_SLOT - NUM_BYTES_ADDRESS..NUM_BYTES_STORAGE_SLOT])
}

/// Drop the zero addresses from a list of labelled accounts, warning for each,
/// and keep the rest in order
pub fn filter_zero_addresses<'a>(
    accounts: impl IntoIterator<Item = (&'a str, Address)>,
) -> Vec<Address> {
    accounts
        .into_iter()
        .filter_map(|(label, address)| {
            if address == Address::ZERO {
                warn!(account = label, "skipping zero address");
                return None;
            }
            Some(address)
        })
        .collect()
}

/// Parse a comma-separated filter into the distinct contract names it selects.
///
/// An empty filter selects nothing, meaning no filtering.
pub fn parse_filter(filter: &str) -> Vec<String> {
    filter
        .split(FILTER_SEPARATOR)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

/// The path of a chain's deployments record within the data directory
pub fn deployments_path(datadir: &Path, chain: &str) -> PathBuf {
    datadir.join(chain).join(DEPLOYMENTS_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use alloy_primitives::{b256, Address};

    use super::{address_from_slot, deployments_path, filter_zero_addresses, parse_filter};

    #[test]
    fn test_filter_zero_addresses_keeps_order() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);

        let filtered = filter_zero_addresses([("a", a), ("zero", Address::ZERO), ("b", b)]);
        assert_eq!(filtered, vec![a, b]);
        assert!(filter_zero_addresses([("zero", Address::ZERO)]).is_empty());
    }

    #[test]
    fn test_parse_filter() {
        assert!(parse_filter("").is_empty());
        assert!(parse_filter(" , ").is_empty());
        assert_eq!(parse_filter("B"), vec!["B"]);
        assert_eq!(parse_filter("A, B,A"), vec!["A", "B"]);
    }

    #[test]
    fn test_address_from_slot() {
        let word = b256!("000000000000000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(address_from_slot(word), Address::repeat_byte(0xaa));
    }

    #[test]
    fn test_deployments_path() {
        let path = deployments_path(Path::new("data"), "local");
        assert_eq!(path, Path::new("data/local/deployments.json"));
    }
}
