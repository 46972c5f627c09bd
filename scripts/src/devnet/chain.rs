//! An in-process ephemeral chain: accounts, contract code, storage, and a transaction log.
//!
//! State changes made by a reverting transaction are rolled back.

use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use alloy_primitives::{keccak256, Address, Bytes, TxHash, B256, U256};

/// A revert raised by simulated contract code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revert(pub String);

impl Revert {
    /// A revert with the given reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl Display for Revert {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "execution reverted: {}", self.0)
    }
}

/// The behavior of a simulated contract.
///
/// Code is stateless; all state lives in the storage of the context it runs in,
/// which for a delegated call is the storage of the delegating contract.
pub trait ContractCode: Send + Sync {
    /// Run the constructor with its ABI-encoded arguments
    fn construct(&self, ctx: &mut CallContext<'_>, args: &[u8]) -> Result<(), Revert>;

    /// Handle a call with the given calldata, returning the ABI-encoded output
    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert>;
}

/// An externally owned or contract account
#[derive(Debug, Clone, Copy, Default)]
struct Account {
    /// The account's balance in wei
    balance: U256,
    /// The number of transactions or creations the account has made
    nonce: u64,
}

/// Everything a transaction can change
#[derive(Clone, Default)]
struct WorldState {
    /// Account balances and nonces
    accounts: HashMap<Address, Account>,
    /// Code of deployed contracts
    code: HashMap<Address, Arc<dyn ContractCode>>,
    /// Fixed-size storage words
    words: HashMap<(Address, B256), B256>,
    /// Dynamic storage values (strings)
    blobs: HashMap<(Address, B256), Vec<u8>>,
}

impl WorldState {
    /// Move `value` from `from` to `to`
    fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), Revert> {
        if value.is_zero() {
            return Ok(());
        }

        let sender = self.accounts.entry(from).or_default();
        sender.balance = sender
            .balance
            .checked_sub(value)
            .ok_or_else(|| Revert::new("insufficient balance"))?;
        self.accounts.entry(to).or_default().balance += value;
        Ok(())
    }

    /// Increment the nonce of `address`, returning the nonce before the increment
    fn bump_nonce(&mut self, address: Address) -> u64 {
        let account = self.accounts.entry(address).or_default();
        let nonce = account.nonce;
        account.nonce += 1;
        nonce
    }

    /// Create a contract from `deployer`, returning its address
    fn create(
        &mut self,
        deployer: Address,
        code: Arc<dyn ContractCode>,
        value: U256,
        args: &[u8],
    ) -> Result<Address, Revert> {
        let nonce = self.bump_nonce(deployer);
        let address = deployer.create(nonce);
        self.transfer(deployer, address, value)?;
        self.code.insert(address, code.clone());

        let mut ctx =
            CallContext { state: self, address, sender: deployer, value, is_static: false };
        code.construct(&mut ctx, args)?;
        Ok(address)
    }

    /// Call the contract at `to`
    fn call(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
        input: &[u8],
        is_static: bool,
    ) -> Result<Vec<u8>, Revert> {
        self.transfer(from, to, value)?;
        let code = self
            .code
            .get(&to)
            .cloned()
            .ok_or_else(|| Revert::new(format!("no contract at {:#x}", to)))?;

        let mut ctx = CallContext { state: self, address: to, sender: from, value, is_static };
        code.call(&mut ctx, input)
    }
}

/// The execution context of a simulated contract
pub struct CallContext<'a> {
    /// The chain state
    state: &'a mut WorldState,
    /// The address whose storage the code runs against
    pub address: Address,
    /// The immediate caller
    pub sender: Address,
    /// The value sent with the call
    pub value: U256,
    /// Whether state changes are forbidden
    pub is_static: bool,
}

impl CallContext<'_> {
    /// Load a storage word
    pub fn sload(&self, slot: B256) -> B256 {
        self.state.words.get(&(self.address, slot)).copied().unwrap_or_default()
    }

    /// Store a storage word
    pub fn sstore(&mut self, slot: B256, value: B256) -> Result<(), Revert> {
        self.check_writable()?;
        if value == B256::ZERO {
            self.state.words.remove(&(self.address, slot));
        } else {
            self.state.words.insert((self.address, slot), value);
        }
        Ok(())
    }

    /// Load a dynamic storage value, empty if unset
    pub fn load_bytes(&self, slot: B256) -> Vec<u8> {
        self.state.blobs.get(&(self.address, slot)).cloned().unwrap_or_default()
    }

    /// Store a dynamic storage value
    pub fn store_bytes(&mut self, slot: B256, value: Vec<u8>) -> Result<(), Revert> {
        self.check_writable()?;
        if value.is_empty() {
            self.state.blobs.remove(&(self.address, slot));
        } else {
            self.state.blobs.insert((self.address, slot), value);
        }
        Ok(())
    }

    /// The code deployed at `address`
    pub fn code_at(&self, address: Address) -> Option<Arc<dyn ContractCode>> {
        self.state.code.get(&address).cloned()
    }

    /// Run `code` against this context's storage, sender, and value
    pub fn delegate(
        &mut self,
        code: &Arc<dyn ContractCode>,
        input: &[u8],
    ) -> Result<Vec<u8>, Revert> {
        code.call(self, input)
    }

    /// Call another contract, with this contract as the caller
    pub fn call(&mut self, to: Address, input: &[u8]) -> Result<Vec<u8>, Revert> {
        let from = self.address;
        let is_static = self.is_static;
        self.state.call(from, to, U256::ZERO, input, is_static)
    }

    /// Create a contract, with this contract as the deployer
    pub fn create(&mut self, code: Arc<dyn ContractCode>, args: &[u8]) -> Result<Address, Revert> {
        self.check_writable()?;
        let deployer = self.address;
        self.state.create(deployer, code, U256::ZERO, args)
    }

    /// Fail if this context may not change state
    fn check_writable(&self) -> Result<(), Revert> {
        if self.is_static {
            return Err(Revert::new("state change in static call"));
        }
        Ok(())
    }
}

/// A transaction submitted to the ephemeral chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    /// The transaction hash
    pub hash: TxHash,
    /// The sending account
    pub from: Address,
    /// The called contract, `None` for creations
    pub to: Option<Address>,
    /// The value sent
    pub value: U256,
    /// The calldata, or the constructor arguments for creations
    pub input: Bytes,
    /// Whether the transaction succeeded
    pub success: bool,
}

/// The result of a transaction
#[derive(Debug, Clone)]
pub struct TxOutcome {
    /// The transaction hash
    pub hash: TxHash,
    /// The created contract, for successful creations
    pub created: Option<Address>,
    /// The returned data, or the revert
    pub result: Result<Vec<u8>, Revert>,
}

/// An in-memory chain with instant, sequential transaction execution
#[derive(Default)]
pub struct EphemeralChain {
    /// The current state
    state: WorldState,
    /// Every transaction submitted, in order
    transactions: Vec<TxRecord>,
}

impl EphemeralChain {
    /// An empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` wei to `address`
    pub fn fund(&mut self, address: Address, amount: U256) {
        self.state.accounts.entry(address).or_default().balance += amount;
    }

    /// The balance of `address`
    pub fn balance(&self, address: Address) -> U256 {
        self.state.accounts.get(&address).map(|a| a.balance).unwrap_or_default()
    }

    /// Whether contract code is deployed at `address`
    pub fn has_code(&self, address: Address) -> bool {
        self.state.code.contains_key(&address)
    }

    /// Read a storage word
    pub fn storage_at(&self, address: Address, slot: B256) -> B256 {
        self.state.words.get(&(address, slot)).copied().unwrap_or_default()
    }

    /// Every transaction submitted so far
    pub fn transactions(&self) -> &[TxRecord] {
        &self.transactions
    }

    /// Submit a contract creation
    pub fn create(
        &mut self,
        from: Address,
        code: Arc<dyn ContractCode>,
        value: U256,
        args: &[u8],
    ) -> TxOutcome {
        let hash = self.tx_hash(from, args);
        let snapshot = self.state.clone();
        let result = self.state.create(from, code, value, args);
        let (created, result) = match result {
            Ok(address) => (Some(address), Ok(Vec::new())),
            Err(revert) => {
                self.revert_to(snapshot, from);
                (None, Err(revert))
            }
        };

        self.log(hash, from, None, value, args, result.is_ok());
        TxOutcome { hash, created, result }
    }

    /// Submit a call transaction
    pub fn transact(&mut self, from: Address, to: Address, value: U256, input: &[u8]) -> TxOutcome {
        let hash = self.tx_hash(from, input);
        self.state.bump_nonce(from);
        let snapshot = self.state.clone();
        let result = self.state.call(from, to, value, input, false /* is_static */);
        if result.is_err() {
            self.state = snapshot;
        }

        self.log(hash, from, Some(to), value, input, result.is_ok());
        TxOutcome { hash, created: None, result }
    }

    /// Evaluate a call without submitting a transaction
    pub fn call(&self, from: Address, to: Address, input: &[u8]) -> Result<Vec<u8>, Revert> {
        let mut scratch = self.state.clone();
        scratch.call(from, to, U256::ZERO, input, true /* is_static */)
    }

    /// Restore `snapshot`, keeping the sender's nonce consumed
    fn revert_to(&mut self, snapshot: WorldState, from: Address) {
        self.state = snapshot;
        self.state.bump_nonce(from);
    }

    /// Derive a unique hash for a transaction from `from`
    fn tx_hash(&self, from: Address, input: &[u8]) -> TxHash {
        let nonce = self.state.accounts.get(&from).map(|a| a.nonce).unwrap_or_default();
        let mut preimage = from.to_vec();
        preimage.extend(nonce.to_be_bytes());
        preimage.extend(input);
        keccak256(preimage)
    }

    /// Append a transaction to the log
    fn log(
        &mut self,
        hash: TxHash,
        from: Address,
        to: Option<Address>,
        value: U256,
        input: &[u8],
        success: bool,
    ) {
        self.transactions.push(TxRecord {
            hash,
            from,
            to,
            value,
            input: Bytes::copy_from_slice(input),
            success,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy_primitives::{Address, B256, U256};

    use super::{CallContext, ContractCode, EphemeralChain, Revert};

    /// Stores its calldata's first word, reverting on an empty call
    struct Counter;

    impl ContractCode for Counter {
        fn construct(&self, _ctx: &mut CallContext<'_>, _args: &[u8]) -> Result<(), Revert> {
            Ok(())
        }

        fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert> {
            if input.is_empty() {
                return Ok(ctx.sload(B256::ZERO).to_vec());
            }
            ctx.sstore(B256::ZERO, B256::from_slice(&input[..32]))?;
            if input.len() > 32 {
                return Err(Revert::new("too long"));
            }
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_create_addresses_follow_nonce() {
        let mut chain = EphemeralChain::new();
        let deployer = Address::repeat_byte(1);

        let first = chain.create(deployer, Arc::new(Counter), U256::ZERO, &[]);
        let second = chain.create(deployer, Arc::new(Counter), U256::ZERO, &[]);
        assert_eq!(first.created, Some(deployer.create(0)));
        assert_eq!(second.created, Some(deployer.create(1)));
        assert_ne!(first.hash, second.hash);
        assert_eq!(chain.transactions().len(), 2);
    }

    #[test]
    fn test_revert_rolls_back_storage() {
        let mut chain = EphemeralChain::new();
        let user = Address::repeat_byte(2);
        let counter = chain.create(user, Arc::new(Counter), U256::ZERO, &[]).created.unwrap();

        let stored = B256::repeat_byte(7);
        assert!(chain.transact(user, counter, U256::ZERO, stored.as_slice()).result.is_ok());

        let mut too_long = B256::repeat_byte(9).to_vec();
        too_long.push(0);
        let outcome = chain.transact(user, counter, U256::ZERO, &too_long);
        assert!(outcome.result.is_err());
        assert!(!chain.transactions().last().unwrap().success);

        assert_eq!(chain.storage_at(counter, B256::ZERO), stored);
        assert_eq!(chain.call(user, counter, &[]).unwrap(), stored.to_vec());
    }

    #[test]
    fn test_static_call_cannot_write() {
        let mut chain = EphemeralChain::new();
        let user = Address::repeat_byte(3);
        let counter = chain.create(user, Arc::new(Counter), U256::ZERO, &[]).created.unwrap();

        assert!(chain.call(user, counter, B256::repeat_byte(1).as_slice()).is_err());
        assert_eq!(chain.storage_at(counter, B256::ZERO), B256::ZERO);
    }

    #[test]
    fn test_value_requires_balance() {
        let mut chain = EphemeralChain::new();
        let user = Address::repeat_byte(4);
        let outcome = chain.create(user, Arc::new(Counter), U256::from(1u64), &[]);
        assert!(outcome.result.is_err());

        chain.fund(user, U256::from(10u64));
        let outcome = chain.create(user, Arc::new(Counter), U256::from(1u64), &[]);
        assert_eq!(chain.balance(outcome.created.unwrap()), U256::from(1u64));
        assert_eq!(chain.balance(user), U256::from(9u64));
    }
}
