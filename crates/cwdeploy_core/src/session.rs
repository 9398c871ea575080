//! Deployment session -- the two actors and the settings every step shares.

use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::client::ChainClient;
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::fee::GasPrice;
use crate::signer::{Account, Role, SignerProvider};
use crate::types::Coin;

/// Memo attached to code uploads.
pub const DEFAULT_UPLOAD_MEMO: &str = "Upload contract code";
/// Memo attached to execute transactions.
pub const DEFAULT_EXECUTE_MEMO: &str = "execute a message";

/// An account paired with the client that signs for it.
///
/// Signed transactions from one account are not reentrant (they race on the
/// account sequence number), so every signed step holds the actor's
/// sequence lock until the chain has answered.
pub struct Actor<C> {
    account: Account,
    client: C,
    sequence: Mutex<()>,
}

impl<C: ChainClient> Actor<C> {
    pub fn new(account: Account, client: C) -> Self {
        Self {
            account,
            client,
            sequence: Mutex::new(()),
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn address(&self) -> &str {
        &self.account.address
    }

    pub fn role(&self) -> Role {
        self.account.role
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Wait until no other signed transaction from this account is in flight.
    pub(crate) async fn lock_sequence(&self) -> MutexGuard<'_, ()> {
        self.sequence.lock().await
    }
}

/// Everything the deployment steps share, built once at startup and passed
/// by reference.
pub struct DeploySession<C> {
    deployer: Actor<C>,
    tester: Actor<C>,
    gas_price: GasPrice,
    native_denom: String,
    label: String,
    upload_memo: String,
    execute_memo: String,
}

impl<C: ChainClient> DeploySession<C> {
    pub fn new(deployer: Actor<C>, tester: Actor<C>, gas_price: GasPrice) -> Self {
        let native_denom = gas_price.denom.clone();
        Self {
            deployer,
            tester,
            gas_price,
            native_denom,
            label: DeployConfig::default().label,
            upload_memo: DEFAULT_UPLOAD_MEMO.to_string(),
            execute_memo: DEFAULT_EXECUTE_MEMO.to_string(),
        }
    }

    /// Derive both identities from the configured mnemonics and connect a
    /// signing client for each.
    pub async fn establish<P>(provider: &P, config: &DeployConfig) -> Result<Self, DeployError>
    where
        P: SignerProvider<Client = C>,
    {
        let deployer = Self::establish_actor(provider, config, Role::Deployer).await?;
        let tester = Self::establish_actor(provider, config, Role::Tester).await?;

        Ok(Self::new(deployer, tester, config.gas_price()?)
            .with_native_denom(config.native_denom.clone())
            .with_label(config.label.clone()))
    }

    async fn establish_actor<P>(
        provider: &P,
        config: &DeployConfig,
        role: Role,
    ) -> Result<Actor<C>, DeployError>
    where
        P: SignerProvider<Client = C>,
    {
        let secret = config.mnemonic(role)?;
        let account = provider
            .from_secret(role, secret.expose(), &config.address_prefix)
            .await
            .map_err(|cause| DeployError::Identity { role, cause })?;
        let client = provider
            .connect(&account)
            .await
            .map_err(|cause| DeployError::Identity { role, cause })?;

        info!(role = %role, address = %account.address, "account ready");
        Ok(Actor::new(account, client))
    }

    pub fn with_native_denom(mut self, denom: impl Into<String>) -> Self {
        self.native_denom = denom.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_upload_memo(mut self, memo: impl Into<String>) -> Self {
        self.upload_memo = memo.into();
        self
    }

    pub fn deployer(&self) -> &Actor<C> {
        &self.deployer
    }

    pub fn tester(&self) -> &Actor<C> {
        &self.tester
    }

    pub fn actor(&self, role: Role) -> &Actor<C> {
        match role {
            Role::Deployer => &self.deployer,
            Role::Tester => &self.tester,
        }
    }

    pub fn gas_price(&self) -> &GasPrice {
        &self.gas_price
    }

    pub fn native_denom(&self) -> &str {
        &self.native_denom
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn upload_memo(&self) -> &str {
        &self.upload_memo
    }

    pub fn execute_memo(&self) -> &str {
        &self.execute_memo
    }

    /// Funds of `amount` in the native denomination; `None` for zero.
    pub fn native_funds(&self, amount: u128) -> Option<Coin> {
        (amount > 0).then(|| Coin::new(amount, self.native_denom.clone()))
    }
}
