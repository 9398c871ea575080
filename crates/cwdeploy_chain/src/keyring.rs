use async_trait::async_trait;
use cwdeploy_core::{
    Account, ClientError, DeployConfig, DeployError, Role, SignerHandle, SignerProvider,
};
use tracing::{debug, info};

use crate::cli::{ChainCli, CliError};
use crate::wasmd::{TxSettings, WasmdClient};

/// Keyring entry name used for `role`.
pub fn key_name(role: Role) -> String {
    format!("cwdeploy-{role}")
}

/// [`SignerProvider`] that imports mnemonics into the daemon's keyring.
///
/// Each role gets its own entry, replaced on every run so a changed mnemonic
/// never signs with a stale key.
#[derive(Debug, Clone)]
pub struct KeyringSigner {
    cli: ChainCli,
    settings: TxSettings,
}

impl KeyringSigner {
    pub fn new(cli: ChainCli, settings: TxSettings) -> Self {
        Self { cli, settings }
    }

    pub fn from_config(config: &DeployConfig) -> Result<Self, DeployError> {
        Ok(Self::new(
            ChainCli::from_config(config)?,
            TxSettings::from_config(config)?,
        ))
    }

    fn keys_args(&self, parts: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = std::iter::once("keys")
            .chain(parts.iter().copied())
            .map(str::to_string)
            .collect();
        args.extend(self.cli.keyring_flags());
        args
    }

    async fn recover(&self, name: &str, secret: &str) -> Result<(), ClientError> {
        // A leftover entry would make `keys add` prompt for overwrite.
        if let Err(e) = self.cli.run(&self.keys_args(&["delete", name, "-y"])).await {
            debug!(key = name, error = %e, "no previous keyring entry removed");
        }

        let mut input = secret.trim().to_string();
        input.push('\n');
        self.cli
            .run_with_stdin(&self.keys_args(&["add", name, "--recover"]), &input)
            .await
            .map_err(keyring_error)?;
        Ok(())
    }
}

/// Any keyring command failure is an identity problem unless the binary
/// could not even be started.
fn keyring_error(err: CliError) -> ClientError {
    match err {
        CliError::Failed { stderr, .. } => ClientError::Signature(stderr),
        other => ClientError::from(other),
    }
}

#[async_trait]
impl SignerProvider for KeyringSigner {
    type Client = WasmdClient;

    async fn from_secret(
        &self,
        role: Role,
        secret: &str,
        address_prefix: &str,
    ) -> Result<Account, ClientError> {
        let name = key_name(role);
        self.recover(&name, secret).await?;

        let output = self
            .cli
            .run(&self.keys_args(&["show", name.as_str(), "-a"]))
            .await
            .map_err(keyring_error)?;
        let address = output.trim().to_string();

        let expected = format!("{address_prefix}1");
        if !address.starts_with(&expected) {
            return Err(ClientError::Signature(format!(
                "derived address `{address}` does not use prefix `{address_prefix}`"
            )));
        }

        info!(role = %role, key = %name, "signing key imported");
        Ok(Account {
            role,
            address,
            signer: SignerHandle(name),
        })
    }

    async fn connect(&self, account: &Account) -> Result<WasmdClient, ClientError> {
        Ok(WasmdClient::signing(
            self.cli.clone(),
            self.settings.clone(),
            account.signer.as_str(),
            account.address.clone(),
        ))
    }

    fn connect_read_only(&self) -> WasmdClient {
        WasmdClient::read_only(self.cli.clone(), self.settings.clone())
    }
}
