//! cwdeploy core -- sequencing and validation for CosmWasm contract deployment.
//!
//! The crate wraps a remote signing/broadcasting client behind the
//! [`ChainClient`] trait and drives it through four steps:
//!
//! - **store code**: upload wasm bytecode and obtain a [`CodeId`];
//! - **instantiate**: create a contract from that code id and obtain its address;
//! - **execute**: send a signed, state-changing message to a live contract;
//! - **query**: ask a live contract a read-only question.
//!
//! Each step validates the identifier the previous one produced before the
//! next is allowed to run. Nothing is retried automatically.

pub mod artifact;
pub mod client;
pub mod config;
pub mod error;
pub mod fee;
pub mod logging;
pub mod orchestrator;
pub mod session;
pub mod signer;
pub mod types;

// ── Re-exports for convenience ──────────────────────────────────────────

pub use artifact::{ArtifactDir, ArtifactError, ArtifactSource};
pub use client::{
    ChainClient, ClientError, FeeSelection, InstantiateResponse, SDK_CODESPACE, StoreCodeResponse,
};
pub use config::{DeployConfig, Secret, validate_rpc_url};
pub use error::{DeployError, ErrorKind, Step};
pub use fee::{Decimal, Fee, FeeError, GasPrice, STORE_CODE_GAS_LIMIT, compute_fee};
pub use orchestrator::{
    DeploymentReport, deploy, deploy_from_code_id, execute, instantiate, query, store_code,
};
pub use session::{Actor, DeploySession};
pub use signer::{Account, Role, SignerHandle, SignerProvider};
pub use types::{CodeId, Coin, ContractMsg, InstantiateResult, StoreCodeResult, TxReceipt};
