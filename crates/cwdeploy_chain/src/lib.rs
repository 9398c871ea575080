//! Chain collaborators backed by a `wasmd`-compatible daemon CLI.
//!
//! [`WasmdClient`] implements [`cwdeploy_core::ChainClient`] by shelling out
//! to `<binary> tx wasm ...` and `<binary> query ...` with `--output json`.
//! [`KeyringSigner`] implements [`cwdeploy_core::SignerProvider`] on top of
//! the same binary's key management.

pub mod cli;
pub mod keyring;
pub mod tx;
pub mod wasmd;

pub use cli::{ChainCli, CliError};
pub use keyring::KeyringSigner;
pub use tx::{TxEvent, TxResponse};
pub use wasmd::{TxSettings, WasmdClient};
