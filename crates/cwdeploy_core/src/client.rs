//! The chain client seam.
//!
//! [`ChainClient`] is the stable interface to whatever signs, broadcasts and
//! queries on the real network. Implementations report raw responses; the
//! orchestrator decides whether they are usable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::fee::Fee;
use crate::types::{CodeId, Coin, ContractMsg, TxReceipt};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Failures a chain client can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The network or RPC layer could not be reached or answered garbage.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The signing identity is missing or could not sign.
    #[error("signature failure: {0}")]
    Signature(String),

    /// The chain refused the transaction or query, before or after inclusion.
    ///
    /// `codespace` and `code` are the ABCI error coordinates when known.
    #[error("chain rejection: {log}")]
    Rejected {
        codespace: Option<String>,
        code: Option<u32>,
        log: String,
    },
}

/// Codespace of errors raised by the SDK itself (fees, gas, sequence)
/// rather than by a module or a contract.
pub const SDK_CODESPACE: &str = "sdk";

impl ClientError {
    pub fn rejected(log: impl Into<String>) -> Self {
        Self::Rejected {
            codespace: None,
            code: None,
            log: log.into(),
        }
    }

    /// A rejection by the SDK's own transaction checks, with ABCI `code`.
    pub fn sdk_rejected(code: u32, log: impl Into<String>) -> Self {
        Self::Rejected {
            codespace: Some(SDK_CODESPACE.to_string()),
            code: Some(code),
            log: log.into(),
        }
    }

    /// Whether the chain refused the transaction on its own rules before any
    /// contract logic decided the outcome.
    pub fn is_sdk_rejection(&self) -> bool {
        matches!(self, Self::Rejected { codespace: Some(cs), .. } if cs == SDK_CODESPACE)
    }
}

// ---------------------------------------------------------------------------
// Raw responses
// ---------------------------------------------------------------------------

/// How the fee of a signed transaction is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeSelection {
    /// Pay exactly this fee.
    Fixed(Fee),
    /// Let the client simulate and pick gas and fee itself.
    Auto,
}

/// Code upload response as the client reported it.
///
/// `code_id` is the raw event attribute, unchecked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCodeResponse {
    pub transaction_hash: String,
    pub code_id: Option<String>,
    pub gas_wanted: u64,
    pub gas_used: u64,
}

/// Instantiate response as the client reported it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiateResponse {
    pub transaction_hash: String,
    pub contract_address: Option<String>,
    pub gas_wanted: u64,
    pub gas_used: u64,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Signs and broadcasts transactions, and runs read-only queries.
///
/// Signed calls return once the network has confirmed inclusion.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Upload wasm bytecode.
    async fn upload(
        &self,
        sender: &str,
        bytecode: &[u8],
        fee: &Fee,
        memo: &str,
    ) -> Result<StoreCodeResponse, ClientError>;

    /// Create a contract instance from stored code.
    async fn instantiate(
        &self,
        sender: &str,
        code_id: CodeId,
        init_msg: &ContractMsg,
        label: &str,
        fee: &FeeSelection,
    ) -> Result<InstantiateResponse, ClientError>;

    /// Send a state-changing message, optionally with funds attached.
    async fn execute(
        &self,
        sender: &str,
        contract: &str,
        msg: &ContractMsg,
        fee: &FeeSelection,
        memo: &str,
        funds: &[Coin],
    ) -> Result<TxReceipt, ClientError>;

    /// Smart-query a contract. Needs no signer.
    async fn query(&self, contract: &str, msg: &ContractMsg) -> Result<ContractMsg, ClientError>;
}
