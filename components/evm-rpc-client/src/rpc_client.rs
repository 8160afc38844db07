use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub enum RpcError {
    StatusCode(u16),
    Message(String),
    Node { code: i64, message: String },
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            RpcError::Message(e) => write!(f, "{}", e),
            RpcError::StatusCode(e) => write!(f, "error status code {}", e),
            RpcError::Node { code, message } => write!(f, "node error {}: {}", code, message),
        }
    }
}

pub struct EvmRpc {
    pub url: String,
    pub client: Client,
    next_request_id: AtomicU64,
}

/// Transaction signed by the node itself (`eth_sendTransaction`), the way
/// development nodes such as Ganache expose their unlocked accounts.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
}

impl TransactionRequest {
    pub fn contract_creation(from: &str, data: String, gas: u64) -> TransactionRequest {
        TransactionRequest {
            from: from.to_string(),
            to: None,
            data,
            gas: Some(format_quantity(gas)),
        }
    }

    pub fn contract_call(from: &str, to: &str, data: String, gas: u64) -> TransactionRequest {
        TransactionRequest {
            from: from.to_string(),
            to: Some(to.to_string()),
            data,
            gas: Some(format_quantity(gas)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
}

impl TransactionReceipt {
    /// Receipts without a status field predate Byzantium and are treated as successful.
    pub fn succeeded(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => parse_quantity(status).map(|s| s == 1).unwrap_or(false),
            None => true,
        }
    }
}

#[derive(Deserialize, Debug)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize, Debug)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

pub fn format_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

pub fn parse_quantity(value: &str) -> Result<u64, RpcError> {
    let digits = value.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::Message(format!("unable to parse quantity {}: {}", value, e)))
}

impl EvmRpc {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
            next_request_id: AtomicU64::new(1),
        }
    }

    fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let res = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .map_err(|e| RpcError::Message(e.to_string()))?;

        if !res.status().is_success() {
            return Err(RpcError::StatusCode(res.status().as_u16()));
        }

        let response: JsonRpcResponse = res
            .json()
            .map_err(|e| RpcError::Message(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(response.result.unwrap_or(Value::Null))
            .map_err(|e| RpcError::Message(format!("unable to decode {} result: {}", method, e)))
    }

    pub fn net_version(&self) -> Result<String, RpcError> {
        self.request::<String>("net_version", json!([]))
    }

    pub fn get_accounts(&self) -> Result<Vec<String>, RpcError> {
        self.request::<Vec<String>>("eth_accounts", json!([]))
    }

    pub fn send_transaction(&self, transaction: &TransactionRequest) -> Result<String, RpcError> {
        self.request::<String>("eth_sendTransaction", json!([transaction]))
    }

    pub fn get_transaction_receipt(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        self.request::<Option<TransactionReceipt>>(
            "eth_getTransactionReceipt",
            json!([transaction_hash]),
        )
    }
}
