extern crate serde;

#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate serde_json;

pub mod rpc_client;

#[cfg(feature = "mock")]
pub mod mock_evm_rpc;

pub use rpc_client::{EvmRpc, RpcError, TransactionReceipt, TransactionRequest};
