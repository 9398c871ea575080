use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use cwdeploy_core::{
    ChainClient, ClientError, CodeId, Coin, ContractMsg, DeployConfig, DeployError, Fee,
    FeeSelection, InstantiateResponse, StoreCodeResponse, TxReceipt,
};
use tracing::{debug, info, warn};

use crate::cli::{ChainCli, CliError};
use crate::tx::{self, TxResponse};

/// Gas multiplier applied to simulated gas when the fee is picked automatically.
pub const GAS_ADJUSTMENT: &str = "1.4";

/// Broadcast and confirmation settings shared by every signed call.
#[derive(Debug, Clone)]
pub struct TxSettings {
    /// Gas price passed to `--gas-prices` for automatic fees, e.g. `0.025ustake`.
    pub gas_price: String,
    pub confirm_attempts: u32,
    pub confirm_interval: Duration,
}

impl TxSettings {
    pub fn from_config(config: &DeployConfig) -> Result<Self, DeployError> {
        Ok(Self {
            gas_price: config.gas_price()?.to_string(),
            confirm_attempts: config.confirm_attempts.max(1),
            confirm_interval: config.confirm_interval(),
        })
    }
}

/// [`ChainClient`] backed by a `wasmd`-compatible CLI.
///
/// A client built with [`WasmdClient::read_only`] can only query.
#[derive(Debug, Clone)]
pub struct WasmdClient {
    cli: ChainCli,
    settings: TxSettings,
    key_name: Option<String>,
    address: Option<String>,
}

impl WasmdClient {
    pub fn read_only(cli: ChainCli, settings: TxSettings) -> Self {
        Self {
            cli,
            settings,
            key_name: None,
            address: None,
        }
    }

    /// A client that signs with keyring entry `key_name`, which must own `address`.
    pub fn signing(
        cli: ChainCli,
        settings: TxSettings,
        key_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            cli,
            settings,
            key_name: Some(key_name.into()),
            address: Some(address.into()),
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn signing_key(&self, sender: &str) -> Result<&str, ClientError> {
        let (Some(key), Some(address)) = (&self.key_name, &self.address) else {
            return Err(ClientError::Signature(
                "client has no signer; it can only query".into(),
            ));
        };
        if address != sender {
            return Err(ClientError::Signature(format!(
                "client signs for {address}, not {sender}"
            )));
        }
        Ok(key)
    }

    // ── Argument builders ─────────────────────────────────────────

    pub fn fee_args(&self, fee: &FeeSelection) -> Vec<String> {
        match fee {
            FeeSelection::Fixed(fee) => fixed_fee_args(fee),
            FeeSelection::Auto => vec![
                "--gas".into(),
                "auto".into(),
                "--gas-adjustment".into(),
                GAS_ADJUSTMENT.into(),
                "--gas-prices".into(),
                self.settings.gas_price.clone(),
            ],
        }
    }

    pub fn store_args(&self, key: &str, wasm_path: &str, fee: &Fee, memo: &str) -> Vec<String> {
        let mut args = strings(&["tx", "wasm", "store", wasm_path]);
        args.extend(fixed_fee_args(fee));
        push_memo(&mut args, memo);
        args.extend(self.cli.tx_flags(key));
        args
    }

    pub fn instantiate_args(
        &self,
        key: &str,
        code_id: CodeId,
        init_msg: &ContractMsg,
        label: &str,
        fee: &FeeSelection,
    ) -> Vec<String> {
        let mut args = strings(&["tx", "wasm", "instantiate"]);
        args.push(code_id.to_string());
        args.push(init_msg.to_string());
        args.push("--label".into());
        args.push(label.into());
        args.push("--no-admin".into());
        args.extend(self.fee_args(fee));
        args.extend(self.cli.tx_flags(key));
        args
    }

    pub fn execute_args(
        &self,
        key: &str,
        contract: &str,
        msg: &ContractMsg,
        fee: &FeeSelection,
        memo: &str,
        funds: &[Coin],
    ) -> Vec<String> {
        let mut args = strings(&["tx", "wasm", "execute", contract]);
        args.push(msg.to_string());
        if !funds.is_empty() {
            args.push("--amount".into());
            args.push(join_coins(funds));
        }
        args.extend(self.fee_args(fee));
        push_memo(&mut args, memo);
        args.extend(self.cli.tx_flags(key));
        args
    }

    pub fn query_args(&self, contract: &str, msg: &ContractMsg) -> Vec<String> {
        let mut args = strings(&["query", "wasm", "contract-state", "smart", contract]);
        args.push(msg.to_string());
        args.extend(self.cli.query_flags());
        args
    }

    // ── Broadcast ─────────────────────────────────────────────────

    /// Broadcast a signed transaction and wait until a block includes it.
    async fn broadcast(&self, args: &[String]) -> Result<TxResponse, ClientError> {
        let output = self.cli.run(args).await?;
        let submitted = TxResponse::parse(&output)?;
        submitted.check()?;
        debug!(txhash = %submitted.txhash, "transaction accepted into mempool");

        let included = self.wait_for_inclusion(&submitted.txhash).await?;
        included.check()?;
        Ok(included)
    }

    async fn wait_for_inclusion(&self, txhash: &str) -> Result<TxResponse, ClientError> {
        let mut args = strings(&["query", "tx", txhash]);
        args.extend(self.cli.query_flags());

        for attempt in 1..=self.settings.confirm_attempts {
            tokio::time::sleep(self.settings.confirm_interval).await;
            match self.cli.run(&args).await {
                Ok(output) => return TxResponse::parse(&output),
                Err(CliError::Failed { ref stderr, .. }) if tx::is_tx_not_found(stderr) => {
                    debug!(txhash, attempt, "transaction not yet included");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(txhash, "transaction not confirmed");
        Err(ClientError::Transport(format!(
            "transaction {txhash} not confirmed after {} attempts; check chain state before resubmitting",
            self.settings.confirm_attempts
        )))
    }
}

#[async_trait]
impl ChainClient for WasmdClient {
    async fn upload(
        &self,
        sender: &str,
        bytecode: &[u8],
        fee: &Fee,
        memo: &str,
    ) -> Result<StoreCodeResponse, ClientError> {
        let key = self.signing_key(sender)?;

        // The CLI reads bytecode from a file, so stage it on disk.
        let mut staged = tempfile::Builder::new()
            .prefix("cwdeploy-")
            .suffix(".wasm")
            .tempfile()
            .map_err(|e| ClientError::Transport(format!("cannot stage bytecode: {e}")))?;
        staged
            .write_all(bytecode)
            .and_then(|_| staged.flush())
            .map_err(|e| ClientError::Transport(format!("cannot stage bytecode: {e}")))?;
        let path = staged.path().display().to_string();

        let tx = self
            .broadcast(&self.store_args(key, &path, fee, memo))
            .await?;
        info!(txhash = %tx.txhash, bytes = bytecode.len(), "code stored");

        Ok(StoreCodeResponse {
            code_id: tx.attribute("store_code", "code_id").map(str::to_string),
            transaction_hash: tx.txhash,
            gas_wanted: tx.gas_wanted,
            gas_used: tx.gas_used,
        })
    }

    async fn instantiate(
        &self,
        sender: &str,
        code_id: CodeId,
        init_msg: &ContractMsg,
        label: &str,
        fee: &FeeSelection,
    ) -> Result<InstantiateResponse, ClientError> {
        let key = self.signing_key(sender)?;
        let tx = self
            .broadcast(&self.instantiate_args(key, code_id, init_msg, label, fee))
            .await?;

        Ok(InstantiateResponse {
            contract_address: tx
                .attribute("instantiate", "_contract_address")
                .map(str::to_string),
            transaction_hash: tx.txhash,
            gas_wanted: tx.gas_wanted,
            gas_used: tx.gas_used,
        })
    }

    async fn execute(
        &self,
        sender: &str,
        contract: &str,
        msg: &ContractMsg,
        fee: &FeeSelection,
        memo: &str,
        funds: &[Coin],
    ) -> Result<TxReceipt, ClientError> {
        let key = self.signing_key(sender)?;
        let tx = self
            .broadcast(&self.execute_args(key, contract, msg, fee, memo, funds))
            .await?;
        Ok(tx.receipt())
    }

    async fn query(&self, contract: &str, msg: &ContractMsg) -> Result<ContractMsg, ClientError> {
        let output = self.cli.run(&self.query_args(contract, msg)).await?;
        let mut body: ContractMsg = serde_json::from_str(output.trim())
            .map_err(|e| ClientError::Transport(format!("unexpected query response: {e}")))?;
        match body.get_mut("data") {
            Some(data) => Ok(data.take()),
            None => Err(ClientError::Transport(
                "query response has no `data` field".into(),
            )),
        }
    }
}

fn fixed_fee_args(fee: &Fee) -> Vec<String> {
    vec![
        "--gas".into(),
        fee.gas_limit.to_string(),
        "--fees".into(),
        join_coins(&fee.amount),
    ]
}

fn push_memo(args: &mut Vec<String>, memo: &str) {
    if !memo.is_empty() {
        args.push("--note".into());
        args.push(memo.into());
    }
}

fn join_coins(coins: &[Coin]) -> String {
    coins
        .iter()
        .map(Coin::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
