use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::{ChainClient, ClientError};

/// The two parts an account can play during a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Stores and instantiates.
    Deployer,
    /// Executes and queries.
    Tester,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Deployer => "deployer",
            Role::Tester => "tester",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a signing key held by a [`SignerProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignerHandle(pub String);

impl SignerHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An on-chain address together with the signer that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub role: Role,
    pub address: String,
    pub signer: SignerHandle,
}

/// Derives signing identities from secrets and connects clients for them.
#[async_trait]
pub trait SignerProvider: Send + Sync {
    type Client: ChainClient;

    /// Derive the account for `secret`. The same secret must always yield the
    /// same address.
    async fn from_secret(
        &self,
        role: Role,
        secret: &str,
        address_prefix: &str,
    ) -> Result<Account, ClientError>;

    /// A client that signs as `account`.
    async fn connect(&self, account: &Account) -> Result<Self::Client, ClientError>;

    /// A client with no signer, usable for queries only.
    fn connect_read_only(&self) -> Self::Client;
}
