use std::fmt;
use toml::value::Value;

pub const DEFAULT_GAS_LIMIT: u64 = 6_721_975;
pub const DEFAULT_CONFIRMATION_POLL_INTERVAL_MS: u64 = 500;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NetworkProfileFile {
    pub network_id: Option<Value>,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub from: Option<String>,
    pub gas: Option<u64>,
    pub confirmation_poll_interval_ms: Option<u64>,
}

/// Identifier a node must report through `net_version` before anything is submitted to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkId {
    Any,
    Exact(String),
}

impl NetworkId {
    /// `None` for a blank value.
    pub fn parse(value: &str) -> Option<NetworkId> {
        match value.trim() {
            "" => None,
            "*" => Some(NetworkId::Any),
            id => Some(NetworkId::Exact(id.to_string())),
        }
    }

    pub fn matches(&self, reported: &str) -> bool {
        match self {
            NetworkId::Any => true,
            NetworkId::Exact(id) => id == reported.trim(),
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkId::Any => write!(f, "*"),
            NetworkId::Exact(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkProfile {
    pub name: String,
    pub network_id: NetworkId,
    pub host: String,
    pub port: u16,
    pub from: Option<String>,
    pub gas: u64,
    pub confirmation_poll_interval_ms: u64,
}

impl NetworkProfile {
    pub fn from_network_profile_file(
        name: &str,
        file: &NetworkProfileFile,
    ) -> Result<NetworkProfile, String> {
        let network_id = match &file.network_id {
            Some(Value::String(id)) => match NetworkId::parse(id) {
                Some(network_id) => network_id,
                None => return Err(format!("network '{}': missing field network_id", name)),
            },
            Some(Value::Integer(id)) if *id >= 0 => NetworkId::Exact(id.to_string()),
            Some(_) => {
                return Err(format!(
                    "network '{}': network_id must be \"*\" or a positive integer",
                    name
                ))
            }
            None => return Err(format!("network '{}': missing field network_id", name)),
        };

        let host = match &file.host {
            Some(host) if !host.trim().is_empty() => host.trim().to_string(),
            _ => return Err(format!("network '{}': missing field host", name)),
        };

        let port = match file.port {
            Some(port) => u16::try_from(port)
                .map_err(|_| format!("network '{}': port {} out of range", name, port))?,
            None => return Err(format!("network '{}': missing field port", name)),
        };

        Ok(NetworkProfile {
            name: name.to_string(),
            network_id,
            host,
            port,
            from: file.from.clone(),
            gas: file.gas.unwrap_or(DEFAULT_GAS_LIMIT),
            confirmation_poll_interval_ms: file
                .confirmation_poll_interval_ms
                .unwrap_or(DEFAULT_CONFIRMATION_POLL_INTERVAL_MS),
        })
    }

    pub fn rpc_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}
