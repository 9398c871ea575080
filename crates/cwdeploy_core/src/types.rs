use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// Contract-defined message body (constructor, execute or query).
///
/// The orchestrator never looks inside; only the contract gives it meaning.
pub type ContractMsg = serde_json::Value;

/// A chain-assigned identifier for uploaded bytecode.
///
/// Always a positive integer. The only ways to obtain one are [`CodeId::new`]
/// and [`CodeId::parse`], so holding a `CodeId` proves the value was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeId(NonZeroU64);

impl CodeId {
    /// Wrap a raw code id, rejecting zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Parse a code id as reported in a transaction event attribute.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u64>().ok().and_then(Self::new)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A native token amount in a single denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    /// Cosmos SDK coin notation, e.g. `1500ustake`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Validated outcome of the store-code step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCodeResult {
    pub transaction_hash: String,
    pub code_id: CodeId,
    pub gas_wanted: u64,
    pub gas_used: u64,
}

/// Validated outcome of the instantiate step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiateResult {
    pub transaction_hash: String,
    pub contract_address: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
}

/// Receipt of an included transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub height: u64,
    pub gas_wanted: u64,
    pub gas_used: u64,
}
