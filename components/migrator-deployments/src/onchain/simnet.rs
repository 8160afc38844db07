use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;

use super::{ChainBackend, ChainError, Receipt};
use alloy_primitives::{keccak256, Address};

use crate::abi::function_selector;

pub const SIMULATED_NETWORK_ID: &str = "5777";
const SIMULATED_ACCOUNTS: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedCall {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
    pub transaction_hash: String,
}

/// In-memory chain used for dry runs and tests. Every instance draws its own salt, so two
/// chains never hand out the same addresses.
pub struct SimulatedChain {
    network_id: String,
    salt: [u8; 32],
    accounts: Vec<Address>,
    nonces: BTreeMap<Address, u64>,
    code: BTreeMap<Address, Vec<u8>>,
    receipts: BTreeMap<String, Receipt>,
    calls: Vec<SimulatedCall>,
    block_number: u64,
    reverted_selectors: BTreeSet<[u8; 4]>,
    deployment_reverts: bool,
    rejection: Option<String>,
}

impl Default for SimulatedChain {
    fn default() -> Self {
        SimulatedChain::new()
    }
}

impl SimulatedChain {
    pub fn new() -> SimulatedChain {
        let salt: [u8; 32] = rand::thread_rng().gen();
        SimulatedChain::with_salt(salt)
    }

    pub fn with_salt(salt: [u8; 32]) -> SimulatedChain {
        let accounts = (0..SIMULATED_ACCOUNTS)
            .map(|i| {
                let mut seed = salt.to_vec();
                seed.extend_from_slice(b"account");
                seed.push(i);
                Address::from_word(keccak256(&seed))
            })
            .collect();
        SimulatedChain {
            network_id: SIMULATED_NETWORK_ID.to_string(),
            salt,
            accounts,
            nonces: BTreeMap::new(),
            code: BTreeMap::new(),
            receipts: BTreeMap::new(),
            calls: vec![],
            block_number: 0,
            reverted_selectors: BTreeSet::new(),
            deployment_reverts: false,
            rejection: None,
        }
    }

    pub fn with_network_id(mut self, network_id: &str) -> SimulatedChain {
        self.network_id = network_id.to_string();
        self
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// Calls to `signature` (e.g. `setResourceManagerAddress(address)`) will revert.
    pub fn revert_method(&mut self, signature: &str) {
        self.reverted_selectors.insert(function_selector(signature));
    }

    pub fn revert_next_deployment(&mut self) {
        self.deployment_reverts = true;
    }

    /// Every submission is refused with `reason` until cleared with `None`.
    pub fn reject_transactions(&mut self, reason: Option<&str>) {
        self.rejection = reason.map(|r| r.to_string());
    }

    pub fn code_at(&self, address: &Address) -> Option<&[u8]> {
        self.code.get(address).map(|code| code.as_slice())
    }

    pub fn calls(&self) -> &[SimulatedCall] {
        &self.calls
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    fn next_nonce(&mut self, sender: &Address) -> u64 {
        let nonce = self.nonces.entry(*sender).or_insert(0);
        let current = *nonce;
        *nonce += 1;
        current
    }

    fn transaction_hash(&self, sender: &Address, nonce: u64, data: &[u8]) -> String {
        let mut preimage = self.salt.to_vec();
        preimage.extend_from_slice(sender.as_slice());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(data);
        format!("0x{}", hex::encode(keccak256(&preimage).as_slice()))
    }

    fn contract_address(&self, sender: &Address, nonce: u64) -> Address {
        let mut preimage = self.salt.to_vec();
        preimage.extend_from_slice(sender.as_slice());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        Address::from_word(keccak256(&preimage))
    }

    fn check_submission(&self, sender: &Address) -> Result<(), ChainError> {
        if let Some(ref reason) = self.rejection {
            return Err(ChainError::Rejected(reason.clone()));
        }
        if !self.accounts.contains(sender) {
            return Err(ChainError::Rejected(format!(
                "sender account {} not recognized",
                sender
            )));
        }
        Ok(())
    }

    fn mine(&mut self, transaction_hash: &str, contract_address: Option<Address>, succeeded: bool) {
        self.block_number += 1;
        self.receipts.insert(
            transaction_hash.to_string(),
            Receipt {
                transaction_hash: transaction_hash.to_string(),
                block_number: Some(self.block_number),
                contract_address,
                succeeded,
            },
        );
    }
}

impl ChainBackend for SimulatedChain {
    fn network_id(&self) -> Result<String, ChainError> {
        Ok(self.network_id.clone())
    }

    fn default_sender(&self) -> Result<Address, ChainError> {
        self.accounts
            .first()
            .copied()
            .ok_or_else(|| ChainError::Rejected("no account available".into()))
    }

    fn submit_deployment(
        &mut self,
        sender: &Address,
        bytecode: &[u8],
        _gas: u64,
    ) -> Result<String, ChainError> {
        self.check_submission(sender)?;
        let nonce = self.next_nonce(sender);
        let transaction_hash = self.transaction_hash(sender, nonce, bytecode);

        if self.deployment_reverts {
            self.deployment_reverts = false;
            self.mine(&transaction_hash, None, false);
            return Ok(transaction_hash);
        }

        let address = self.contract_address(sender, nonce);
        self.code.insert(address, bytecode.to_vec());
        self.mine(&transaction_hash, Some(address), true);
        Ok(transaction_hash)
    }

    fn submit_call(
        &mut self,
        sender: &Address,
        to: &Address,
        data: &[u8],
        _gas: u64,
    ) -> Result<String, ChainError> {
        self.check_submission(sender)?;
        let nonce = self.next_nonce(sender);
        let transaction_hash = self.transaction_hash(sender, nonce, data);

        let reverted = !self.code.contains_key(to)
            || data.len() < 4
            || self.reverted_selectors.contains(&[data[0], data[1], data[2], data[3]]);

        self.calls.push(SimulatedCall {
            from: *sender,
            to: *to,
            data: data.to_vec(),
            transaction_hash: transaction_hash.clone(),
        });
        self.mine(&transaction_hash, None, !reverted);
        Ok(transaction_hash)
    }

    fn wait_for_receipt(&mut self, transaction_hash: &str) -> Result<Receipt, ChainError> {
        self.receipts
            .get(transaction_hash)
            .cloned()
            .ok_or_else(|| ChainError::Transport(format!("unknown transaction {}", transaction_hash)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployments_get_distinct_addresses() {
        let mut chain = SimulatedChain::with_salt([7u8; 32]);
        let sender = chain.default_sender().unwrap();

        let first = chain.submit_deployment(&sender, &[0x60, 0x80], 1).unwrap();
        let second = chain.submit_deployment(&sender, &[0x60, 0x80], 1).unwrap();
        assert_ne!(first, second);

        let first = chain.wait_for_receipt(&first).unwrap();
        let second = chain.wait_for_receipt(&second).unwrap();
        assert!(first.succeeded && second.succeeded);
        assert_ne!(first.contract_address, second.contract_address);
        assert_eq!(second.block_number, Some(2));
    }

    #[test]
    fn test_same_salt_is_deterministic() {
        let mut left = SimulatedChain::with_salt([1u8; 32]);
        let mut right = SimulatedChain::with_salt([1u8; 32]);
        let sender = left.default_sender().unwrap();
        assert_eq!(right.default_sender().unwrap(), sender);

        let left_tx = left.submit_deployment(&sender, &[0x00], 1).unwrap();
        let right_tx = right.submit_deployment(&sender, &[0x00], 1).unwrap();
        assert_eq!(
            left.wait_for_receipt(&left_tx).unwrap().contract_address,
            right.wait_for_receipt(&right_tx).unwrap().contract_address
        );
    }

    #[test]
    fn test_reverts_and_rejections() {
        let mut chain = SimulatedChain::with_salt([3u8; 32]);
        let sender = chain.default_sender().unwrap();
        let tx = chain.submit_deployment(&sender, &[0x60], 1).unwrap();
        let target = chain.wait_for_receipt(&tx).unwrap().contract_address.unwrap();

        chain.revert_method("book(uint256)");
        let mut data = function_selector("book(uint256)").to_vec();
        data.extend_from_slice(&[0u8; 32]);
        let tx = chain.submit_call(&sender, &target, &data, 1).unwrap();
        assert!(!chain.wait_for_receipt(&tx).unwrap().succeeded);

        let data = function_selector("cancel(uint256)").to_vec();
        let tx = chain.submit_call(&sender, &target, &data, 1).unwrap();
        assert!(chain.wait_for_receipt(&tx).unwrap().succeeded);
        assert_eq!(chain.calls().len(), 2);

        chain.reject_transactions(Some("insufficient funds"));
        assert_eq!(
            chain.submit_deployment(&sender, &[0x60], 1),
            Err(ChainError::Rejected("insufficient funds".into()))
        );

        chain.reject_transactions(None);
        let stranger = Address::repeat_byte(9);
        assert!(chain.submit_deployment(&stranger, &[0x60], 1).is_err());
    }
}
