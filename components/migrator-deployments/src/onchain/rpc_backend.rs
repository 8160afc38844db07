use std::thread::sleep;
use std::time::Duration;

use evm_rpc_client::rpc_client::parse_quantity;
use evm_rpc_client::{EvmRpc, RpcError, TransactionReceipt, TransactionRequest};
use migrator_files::NetworkProfile;
use tracing::debug;

use super::{ChainBackend, ChainError, Receipt};
use crate::types::{parse_address, Address};

/// Talks to a development node through `eth_sendTransaction`, the node signs with its
/// unlocked accounts.
pub struct RpcChainBackend {
    rpc: EvmRpc,
    poll_interval: Duration,
}

impl RpcChainBackend {
    pub fn new(url: &str, poll_interval_ms: u64) -> RpcChainBackend {
        RpcChainBackend {
            rpc: EvmRpc::new(url),
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }

    pub fn from_network_profile(profile: &NetworkProfile) -> RpcChainBackend {
        RpcChainBackend::new(&profile.rpc_url(), profile.confirmation_poll_interval_ms)
    }

    pub fn url(&self) -> &str {
        &self.rpc.url
    }
}

fn into_chain_error(error: RpcError) -> ChainError {
    match error {
        RpcError::Node { message, .. } => ChainError::Rejected(message),
        other => ChainError::Transport(other.to_string()),
    }
}

fn into_receipt(receipt: TransactionReceipt) -> Result<Receipt, ChainError> {
    let contract_address = match receipt.contract_address {
        Some(ref address) => Some(parse_address(address).map_err(ChainError::Transport)?),
        None => None,
    };
    let block_number = match receipt.block_number {
        Some(ref height) => Some(parse_quantity(height).map_err(into_chain_error)?),
        None => None,
    };
    Ok(Receipt {
        succeeded: receipt.succeeded(),
        transaction_hash: receipt.transaction_hash,
        block_number,
        contract_address,
    })
}

impl ChainBackend for RpcChainBackend {
    fn network_id(&self) -> Result<String, ChainError> {
        self.rpc.net_version().map_err(into_chain_error)
    }

    fn default_sender(&self) -> Result<Address, ChainError> {
        let accounts = self.rpc.get_accounts().map_err(into_chain_error)?;
        match accounts.first() {
            Some(account) => parse_address(account).map_err(ChainError::Transport),
            None => Err(ChainError::Rejected(
                "node exposes no unlocked account, set `from` in the network profile".into(),
            )),
        }
    }

    fn submit_deployment(
        &mut self,
        sender: &Address,
        bytecode: &[u8],
        gas: u64,
    ) -> Result<String, ChainError> {
        let transaction = TransactionRequest::contract_creation(
            &sender.to_string(),
            format!("0x{}", hex::encode(bytecode)),
            gas,
        );
        self.rpc
            .send_transaction(&transaction)
            .map_err(into_chain_error)
    }

    fn submit_call(
        &mut self,
        sender: &Address,
        to: &Address,
        data: &[u8],
        gas: u64,
    ) -> Result<String, ChainError> {
        let transaction = TransactionRequest::contract_call(
            &sender.to_string(),
            &to.to_string(),
            format!("0x{}", hex::encode(data)),
            gas,
        );
        self.rpc
            .send_transaction(&transaction)
            .map_err(into_chain_error)
    }

    fn wait_for_receipt(&mut self, transaction_hash: &str) -> Result<Receipt, ChainError> {
        loop {
            match self
                .rpc
                .get_transaction_receipt(transaction_hash)
                .map_err(into_chain_error)?
            {
                Some(receipt) => return into_receipt(receipt),
                None => {
                    debug!("{} pending", transaction_hash);
                    sleep(self.poll_interval);
                }
            }
        }
    }
}
