use mockito::{Matcher, Mock, ServerGuard};

use crate::rpc_client::TransactionReceipt;

pub struct MockEvmRpc {
    pub url: String,
    client: ServerGuard,
}

impl Default for MockEvmRpc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEvmRpc {
    pub fn new() -> Self {
        let client = mockito::Server::new();
        let url = client.url().to_string();
        Self { client, url }
    }

    fn method_mock(&mut self, method: &str, result: serde_json::Value) -> Mock {
        self.client
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": method })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string())
            .create()
    }

    pub fn net_version_mock(&mut self, network_id: &str) -> Mock {
        self.method_mock("net_version", json!(network_id))
    }

    pub fn accounts_mock(&mut self, accounts: &[&str]) -> Mock {
        self.method_mock("eth_accounts", json!(accounts))
    }

    pub fn send_transaction_mock(&mut self, tx_hash: &str) -> Mock {
        self.method_mock("eth_sendTransaction", json!(tx_hash))
    }

    pub fn send_transaction_error_mock(&mut self, message: &str) -> Mock {
        self.client
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(
                json!({ "method": "eth_sendTransaction" }),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": { "code": -32000, "message": message }
                })
                .to_string(),
            )
            .create()
    }

    pub fn receipt_mock(&mut self, receipt: TransactionReceipt) -> Mock {
        self.client
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "method": "eth_getTransactionReceipt",
                "params": [receipt.transaction_hash.clone()],
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": receipt }).to_string())
            .create()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EvmRpc, TransactionRequest};

    #[test]
    fn test_send_and_confirm_against_mock() {
        let mut mock = MockEvmRpc::new();
        let _version = mock.net_version_mock("5777");
        let _send = mock.send_transaction_mock("0xfeed");
        let _receipt = mock.receipt_mock(TransactionReceipt {
            transaction_hash: "0xfeed".into(),
            block_number: Some("0x2".into()),
            contract_address: Some("0x5fbdb2315678afecb367f032d93f642f64180aa3".into()),
            status: Some("0x1".into()),
            gas_used: Some("0x5208".into()),
        });

        let rpc = EvmRpc::new(&mock.url);
        assert_eq!(rpc.net_version().unwrap(), "5777");

        let tx_hash = rpc
            .send_transaction(&TransactionRequest::contract_creation(
                "0x627306090abab3a6e1400e9345bc60c78a8bef57",
                "0x6080".into(),
                6_721_975,
            ))
            .unwrap();
        assert_eq!(tx_hash, "0xfeed");

        let receipt = rpc.get_transaction_receipt(&tx_hash).unwrap().unwrap();
        assert!(receipt.succeeded());
        assert_eq!(
            receipt.contract_address.as_deref(),
            Some("0x5fbdb2315678afecb367f032d93f642f64180aa3")
        );
    }

    #[test]
    fn test_node_error_is_surfaced() {
        let mut mock = MockEvmRpc::new();
        let _send = mock.send_transaction_error_mock("sender account not recognized");

        let rpc = EvmRpc::new(&mock.url);
        let err = rpc
            .send_transaction(&TransactionRequest::contract_creation("0x01", "0x00".into(), 1))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "node error -32000: sender account not recognized"
        );
    }
}
