//! Deployment error types.

use std::fmt;

use crate::artifact::ArtifactError;
use crate::client::ClientError;
use crate::fee::FeeError;
use crate::signer::Role;
use crate::types::CodeId;

/// The four remote steps of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    StoreCode,
    Instantiate,
    Execute,
    Query,
}

impl Step {
    /// Position in the deployment sequence, as shown to operators.
    pub fn number(&self) -> u8 {
        match self {
            Step::StoreCode => 1,
            Step::Instantiate => 2,
            Step::Execute => 3,
            Step::Query => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::StoreCode => "store code",
            Step::Instantiate => "instantiate",
            Step::Execute => "execute",
            Step::Query => "query",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse failure category, for callers that branch on cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing configuration or local input.
    Config,
    /// The network/RPC layer failed.
    Transport,
    /// Wallet or signing failed.
    Signature,
    /// The chain refused a transaction or query.
    ChainRejection,
    /// The contract's own validation refused an execute message.
    ContractRejected,
    /// The client reported success but left out an expected identifier.
    InvalidResponse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Transport => "TransportFailure",
            ErrorKind::Signature => "SignatureFailure",
            ErrorKind::ChainRejection => "ChainRejection",
            ErrorKind::ContractRejected => "ContractRejected",
            ErrorKind::InvalidResponse => "InvalidResponse",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ClientError> for ErrorKind {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::Signature(_) => ErrorKind::Signature,
            ClientError::Rejected { .. } => ErrorKind::ChainRejection,
        }
    }
}

/// Errors that can end a deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Fee(#[from] FeeError),

    #[error("could not establish {role} identity: {cause}")]
    Identity { role: Role, cause: ClientError },

    #[error("store code failed: {0}")]
    StoreFailure(ClientError),

    #[error("instantiate of code {code_id} failed: {cause}")]
    InstantiateFailure { code_id: CodeId, cause: ClientError },

    #[error("execute on {contract} failed: {cause}")]
    ExecuteFailure { contract: String, cause: ClientError },

    #[error("contract {contract} rejected the message: {message}")]
    ContractRejected { contract: String, message: String },

    #[error("query on {contract} failed: {cause}")]
    QueryFailure { contract: String, cause: ClientError },

    #[error("{step} returned an invalid response: {detail}")]
    InvalidResponse { step: Step, detail: String },
}

impl DeployError {
    /// Which remote step failed, if the failure happened in one.
    pub fn step(&self) -> Option<Step> {
        match self {
            DeployError::StoreFailure(_) => Some(Step::StoreCode),
            DeployError::InstantiateFailure { .. } => Some(Step::Instantiate),
            DeployError::ExecuteFailure { .. } | DeployError::ContractRejected { .. } => {
                Some(Step::Execute)
            }
            DeployError::QueryFailure { .. } => Some(Step::Query),
            DeployError::InvalidResponse { step, .. } => Some(*step),
            DeployError::Config(_)
            | DeployError::Artifact(_)
            | DeployError::Fee(_)
            | DeployError::Identity { .. } => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::Config(_) | DeployError::Artifact(_) | DeployError::Fee(_) => {
                ErrorKind::Config
            }
            DeployError::Identity { cause, .. }
            | DeployError::StoreFailure(cause)
            | DeployError::InstantiateFailure { cause, .. }
            | DeployError::ExecuteFailure { cause, .. }
            | DeployError::QueryFailure { cause, .. } => ErrorKind::from(cause),
            DeployError::ContractRejected { .. } => ErrorKind::ContractRejected,
            DeployError::InvalidResponse { .. } => ErrorKind::InvalidResponse,
        }
    }

    /// The underlying client failure, when there is one.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            DeployError::Identity { cause, .. }
            | DeployError::StoreFailure(cause)
            | DeployError::InstantiateFailure { cause, .. }
            | DeployError::ExecuteFailure { cause, .. }
            | DeployError::QueryFailure { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Code id already on chain when instantiation failed; resume from it.
    pub fn stored_code_id(&self) -> Option<CodeId> {
        match self {
            DeployError::InstantiateFailure { code_id, .. } => Some(*code_id),
            _ => None,
        }
    }
}
