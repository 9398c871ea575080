use std::path::PathBuf;
use std::process::Stdio;

use cwdeploy_core::{ClientError, DeployConfig, DeployError};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::tx::classify_failure;

/// Failure to run the chain CLI.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` produced non-UTF-8 output")]
    Utf8 { command: String },
}

impl From<CliError> for ClientError {
    fn from(err: CliError) -> Self {
        match err {
            CliError::Failed { stderr, .. } => classify_failure(&stderr),
            other => ClientError::Transport(other.to_string()),
        }
    }
}

/// Connection settings for a `wasmd`-compatible daemon binary.
///
/// All operations shell out to the binary using `tokio::process::Command`.
#[derive(Debug, Clone)]
pub struct ChainCli {
    binary: String,
    node: String,
    chain_id: String,
    keyring_backend: String,
    keyring_home: Option<PathBuf>,
}

impl ChainCli {
    pub fn new(
        binary: impl Into<String>,
        node: impl Into<String>,
        chain_id: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            node: node.into(),
            chain_id: chain_id.into(),
            keyring_backend: "test".into(),
            keyring_home: None,
        }
    }

    pub fn with_keyring(mut self, backend: impl Into<String>, home: Option<PathBuf>) -> Self {
        self.keyring_backend = backend.into();
        self.keyring_home = home;
        self
    }

    /// Build from config; the keyring lives under `~/.cwdeploy/keyring`
    /// unless configured otherwise.
    pub fn from_config(config: &DeployConfig) -> Result<Self, DeployError> {
        let home = match &config.keyring_home {
            Some(home) => home.clone(),
            None => DeployConfig::default_keyring_home()?,
        };
        Ok(Self::new(&config.chain_binary, &config.rpc_endpoint, &config.chain_id)
            .with_keyring(&config.keyring_backend, Some(home)))
    }

    // ── Argument builders ─────────────────────────────────────────

    /// Flags every keyring command needs.
    pub fn keyring_flags(&self) -> Vec<String> {
        let mut flags = vec!["--keyring-backend".to_string(), self.keyring_backend.clone()];
        if let Some(home) = &self.keyring_home {
            flags.push("--home".into());
            flags.push(home.display().to_string());
        }
        flags
    }

    /// Flags for a read-only query against the node.
    pub fn query_flags(&self) -> Vec<String> {
        vec![
            "--node".into(),
            self.node.clone(),
            "--output".into(),
            "json".into(),
        ]
    }

    /// Flags for a signed, synchronously broadcast transaction from `key`.
    pub fn tx_flags(&self, key: &str) -> Vec<String> {
        let mut flags = vec![
            "--from".to_string(),
            key.to_string(),
            "--chain-id".into(),
            self.chain_id.clone(),
            "--node".into(),
            self.node.clone(),
            "--broadcast-mode".into(),
            "sync".into(),
            "--output".into(),
            "json".into(),
            "--yes".into(),
        ];
        flags.extend(self.keyring_flags());
        flags
    }

    // ── Execution ─────────────────────────────────────────────────

    /// Run the binary with `args` and return its stdout.
    pub async fn run(&self, args: &[String]) -> Result<String, CliError> {
        self.exec(args, None).await
    }

    /// Run the binary, feeding `input` on stdin.
    pub async fn run_with_stdin(&self, args: &[String], input: &str) -> Result<String, CliError> {
        self.exec(args, Some(input)).await
    }

    async fn exec(&self, args: &[String], input: Option<&str>) -> Result<String, CliError> {
        let command = self.describe(args);
        let spawn_err = |source: std::io::Error| CliError::Spawn {
            command: command.clone(),
            source,
        };

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %command, "executing chain CLI command");
        let mut child = cmd.spawn().map_err(spawn_err)?;

        if let Some(input) = input {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes()).await.map_err(spawn_err)?;
                // Dropping stdin closes the pipe so the child sees EOF.
            }
        }

        let output = child.wait_with_output().await.map_err(spawn_err)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stderr = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            return Err(CliError::Failed {
                command,
                status: output.status.to_string(),
                stderr,
            });
        }

        String::from_utf8(output.stdout).map_err(|_| CliError::Utf8 { command })
    }

    /// Short command description for logs; message bodies are left out.
    fn describe(&self, args: &[String]) -> String {
        let head: Vec<&str> = args.iter().take(3).map(String::as_str).collect();
        format!("{} {}", self.binary, head.join(" "))
    }
}
