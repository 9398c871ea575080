//! Parsing of `--output json` transaction responses and CLI error text.

use cwdeploy_core::{ClientError, TxReceipt};
use serde::{Deserialize, Deserializer};

/// Substrings that mean the node could not be reached.
const TRANSPORT_MARKERS: &[&str] = &[
    "connection refused",
    "post failed",
    "dial tcp",
    "no such host",
    "i/o timeout",
    "context deadline exceeded",
    "error in json rpc client",
    "connection reset",
];

/// Substrings that mean the signing key is unusable.
const SIGNATURE_MARKERS: &[&str] = &[
    "key not found",
    "not a valid name or address",
    "invalid mnemonic",
    "failed to decrypt",
    "keyring",
];

/// Suffixes wasmd appends after a contract's own error message.
const CONTRACT_FAILURE_MARKERS: &[&str] = &[
    ": execute wasm contract failed",
    ": instantiate wasm contract failed",
    ": query wasm contract failed",
];

/// SDK transaction-check failures recognisable from CLI text, with their
/// ABCI codes.
const SDK_REJECTIONS: &[(&str, u32)] = &[
    ("out of gas", 11),
    ("insufficient fee", 13),
    ("incorrect account sequence", 32),
    ("account sequence mismatch", 32),
];

const MESSAGE_INDEX: &str = "message index: ";

/// One ABCI event, e.g. `store_code` with a `code_id` attribute.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<TxAttribute>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxAttribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MessageLog {
    #[serde(default)]
    events: Vec<TxEvent>,
}

/// A transaction response as printed by `tx ... --output json` and
/// `query tx ... --output json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxResponse {
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    pub height: u64,
    pub txhash: String,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    pub gas_wanted: u64,
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    pub gas_used: u64,
    #[serde(default)]
    pub events: Vec<TxEvent>,
    #[serde(default)]
    logs: Vec<MessageLog>,
}

impl TxResponse {
    pub fn parse(output: &str) -> Result<Self, ClientError> {
        serde_json::from_str(output.trim()).map_err(|e| {
            ClientError::Transport(format!("unexpected transaction response: {e}"))
        })
    }

    /// Fail if the chain refused the transaction.
    pub fn check(&self) -> Result<(), ClientError> {
        if self.code == 0 {
            return Ok(());
        }
        Err(ClientError::Rejected {
            codespace: (!self.codespace.is_empty()).then(|| self.codespace.clone()),
            code: Some(self.code),
            log: contract_error_message(&self.raw_log),
        })
    }

    /// First value of `key` on an event of type `kind`.
    ///
    /// Looks at top-level events first, then at per-message logs, which older
    /// nodes use.
    pub fn attribute(&self, kind: &str, key: &str) -> Option<&str> {
        let per_message = self.logs.iter().flat_map(|log| log.events.iter());
        self.events
            .iter()
            .chain(per_message)
            .filter(|event| event.kind == kind)
            .flat_map(|event| event.attributes.iter())
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }

    pub fn receipt(&self) -> TxReceipt {
        TxReceipt {
            transaction_hash: self.txhash.clone(),
            height: self.height,
            gas_wanted: self.gas_wanted,
            gas_used: self.gas_used,
        }
    }
}

fn u64_from_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(d)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) if s.is_empty() => Ok(0),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Map failing CLI output onto the client error taxonomy.
pub fn classify_failure(stderr: &str) -> ClientError {
    let lower = stderr.to_lowercase();
    if TRANSPORT_MARKERS.iter().any(|m| lower.contains(m)) {
        return ClientError::Transport(first_line(stderr));
    }
    if SIGNATURE_MARKERS.iter().any(|m| lower.contains(m)) {
        return ClientError::Signature(first_line(stderr));
    }
    if !CONTRACT_FAILURE_MARKERS.iter().any(|m| lower.contains(m)) {
        if let Some((_, code)) = SDK_REJECTIONS.iter().find(|(m, _)| lower.contains(m)) {
            return ClientError::sdk_rejected(*code, contract_error_message(stderr));
        }
    }
    ClientError::rejected(contract_error_message(stderr))
}

/// Whether `query tx` failed only because the transaction is not indexed yet.
pub fn is_tx_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("tx") && lower.contains("not found")
}

/// Pull the contract's own message out of a wasmd error log.
///
/// `failed to execute message; message index: 0: Insufficient funds: execute
/// wasm contract failed` becomes `Insufficient funds`. Logs without a
/// contract failure are returned trimmed, minus any `Error: ` prefix.
pub fn contract_error_message(log: &str) -> String {
    let log = first_line(log);
    let log = log.strip_prefix("Error: ").unwrap_or(&log);

    let Some(end) = CONTRACT_FAILURE_MARKERS
        .iter()
        .filter_map(|m| log.find(m))
        .min()
    else {
        return log.trim().to_string();
    };

    let head = &log[..end];
    let message = match head.rfind(MESSAGE_INDEX) {
        Some(i) => {
            let rest = &head[i + MESSAGE_INDEX.len()..];
            rest.split_once(": ").map(|(_, m)| m).unwrap_or(rest)
        }
        None => head.rsplit("desc = ").next().unwrap_or(head),
    };
    message.trim().to_string()
}

fn first_line(s: &str) -> String {
    s.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string()
}
