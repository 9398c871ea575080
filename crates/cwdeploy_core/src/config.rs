use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::DeployError;
use crate::fee::GasPrice;
use crate::signer::Role;
use crate::types::{CodeId, ContractMsg};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "CWDEPLOY_CONFIG";
pub const DEPLOYER_MNEMONIC_ENV: &str = "CWDEPLOY_DEPLOYER_MNEMONIC";
pub const TESTER_MNEMONIC_ENV: &str = "CWDEPLOY_TESTER_MNEMONIC";

const DEFAULT_CONFIG_FILE: &str = "cwdeploy.toml";

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A mnemonic or other secret. Never printed, never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ---------------------------------------------------------------------------
// DeployConfig
// ---------------------------------------------------------------------------

/// Deployment configuration, read once at startup from a TOML file.
///
/// Mnemonics are **never** read from or written to the file. They come from
/// `CWDEPLOY_DEPLOYER_MNEMONIC` and `CWDEPLOY_TESTER_MNEMONIC`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    // Chain
    pub rpc_endpoint: String,
    pub chain_id: String,
    pub address_prefix: String,
    pub native_denom: String,
    /// Gas price amount, in `native_denom` per unit of gas.
    pub gas_price: String,

    // Chain CLI
    pub chain_binary: String,
    pub keyring_backend: String,
    pub keyring_home: Option<PathBuf>,
    pub confirm_attempts: u32,
    pub confirm_interval_secs: u64,

    // Deployment
    pub artifacts_dir: PathBuf,
    pub label: String,
    pub instantiate_msg: ContractMsg,
    /// Skip the upload and instantiate this already stored code.
    pub resume_code_id: Option<u64>,

    #[serde(skip)]
    pub deployer_mnemonic: Option<Secret>,
    #[serde(skip)]
    pub tester_mnemonic: Option<Secret>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: "http://localhost:26657".into(),
            chain_id: "localwasm".into(),
            address_prefix: "wasm".into(),
            native_denom: "ustake".into(),
            gas_price: "0.025".into(),
            chain_binary: "wasmd".into(),
            keyring_backend: "test".into(),
            keyring_home: None,
            confirm_attempts: 30,
            confirm_interval_secs: 1,
            artifacts_dir: PathBuf::from("artifacts"),
            label: "instantiation contract".into(),
            instantiate_msg: ContractMsg::Object(Default::default()),
            resume_code_id: None,
            deployer_mnemonic: None,
            tester_mnemonic: None,
        }
    }
}

impl DeployConfig {
    /// Base directory for cwdeploy state: `~/.cwdeploy`.
    pub fn base_dir() -> Result<PathBuf, DeployError> {
        dirs::home_dir()
            .map(|home| home.join(".cwdeploy"))
            .ok_or_else(|| DeployError::Config("cannot determine home directory".into()))
    }

    /// Log directory: `~/.cwdeploy/logs`.
    pub fn logs_dir() -> Result<PathBuf, DeployError> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Keyring home used when none is configured: `~/.cwdeploy/keyring`.
    pub fn default_keyring_home() -> Result<PathBuf, DeployError> {
        Ok(Self::base_dir()?.join("keyring"))
    }

    /// Path of the config file: `$CWDEPLOY_CONFIG` or `./cwdeploy.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load, attach secrets from the process environment, and validate.
    pub fn from_env() -> Result<Self, DeployError> {
        let path = Self::default_path();
        let config = Self::load(&path)?.with_secrets(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load the config file, or defaults if it does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&data)
            .map_err(|e| DeployError::Config(format!("cannot parse {}: {e}", path.display())))?;
        info!(path = %path.display(), chain_id = %config.chain_id, "config loaded");
        Ok(config)
    }

    /// Fill in mnemonics from `lookup` (normally the process environment).
    pub fn with_secrets(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(Secret::new)
        };
        self.deployer_mnemonic = read(DEPLOYER_MNEMONIC_ENV);
        self.tester_mnemonic = read(TESTER_MNEMONIC_ENV);
        self
    }

    pub fn mnemonic(&self, role: Role) -> Result<&Secret, DeployError> {
        let (secret, var) = match role {
            Role::Deployer => (&self.deployer_mnemonic, DEPLOYER_MNEMONIC_ENV),
            Role::Tester => (&self.tester_mnemonic, TESTER_MNEMONIC_ENV),
        };
        secret
            .as_ref()
            .ok_or_else(|| DeployError::Config(format!("{role} mnemonic missing: set {var}")))
    }

    /// The configured gas price, denominated in the native token.
    pub fn gas_price(&self) -> Result<GasPrice, DeployError> {
        format!("{}{}", self.gas_price.trim(), self.native_denom)
            .parse()
            .map_err(|e| DeployError::Config(format!("gas_price: {e}")))
    }

    pub fn resume_code_id(&self) -> Result<Option<CodeId>, DeployError> {
        match self.resume_code_id {
            None => Ok(None),
            Some(raw) => CodeId::new(raw)
                .map(Some)
                .ok_or_else(|| DeployError::Config("resume_code_id must be positive".into())),
        }
    }

    pub fn confirm_interval(&self) -> Duration {
        Duration::from_secs(self.confirm_interval_secs)
    }

    /// Check every field the deployment depends on.
    pub fn validate(&self) -> Result<(), DeployError> {
        if !validate_rpc_url(&self.rpc_endpoint) {
            return Err(DeployError::Config(format!(
                "invalid rpc_endpoint: {}",
                self.rpc_endpoint
            )));
        }
        if self.chain_id.trim().is_empty() {
            return Err(DeployError::Config("chain_id is empty".into()));
        }
        if self.address_prefix.is_empty()
            || !self
                .address_prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(DeployError::Config(format!(
                "invalid address_prefix: {:?}",
                self.address_prefix
            )));
        }
        if self.native_denom.trim().is_empty() {
            return Err(DeployError::Config("native_denom is empty".into()));
        }
        self.gas_price()?;
        if self.chain_binary.trim().is_empty() {
            return Err(DeployError::Config("chain_binary is empty".into()));
        }
        if self.confirm_attempts == 0 {
            return Err(DeployError::Config("confirm_attempts must be positive".into()));
        }
        if self.label.trim().is_empty() {
            return Err(DeployError::Config("label is empty".into()));
        }
        self.resume_code_id()?;
        if let (Some(deployer), Some(tester)) = (&self.deployer_mnemonic, &self.tester_mnemonic) {
            if same_words(deployer.expose(), tester.expose()) {
                return Err(DeployError::Config(format!(
                    "{DEPLOYER_MNEMONIC_ENV} and {TESTER_MNEMONIC_ENV} must differ: both roles would sign from one account"
                )));
            }
        }
        Ok(())
    }
}

fn same_words(a: &str, b: &str) -> bool {
    a.split_whitespace().eq(b.split_whitespace())
}

/// Validate that an RPC endpoint is well-formed and uses a node scheme.
pub fn validate_rpc_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            matches!(scheme, "http" | "https" | "tcp") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
