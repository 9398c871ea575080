mod report;

use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, info};

use cwdeploy_chain::{KeyringSigner, WasmdClient};
use cwdeploy_core::{
    ArtifactDir, ArtifactSource, DeployConfig, DeployError, DeploySession, DeploymentReport,
    deploy, deploy_from_code_id, logging,
};

const USAGE: &str = "Usage: contract-setup <wasm_contract_name>";

/// The single positional argument, or `None` if there is not exactly one.
fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Option<String> {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(name), None) if !name.trim().is_empty() => Some(name),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let Some(contract_name) = parse_args(std::env::args().skip(1)) else {
        println!("{USAGE}");
        return ExitCode::from(1);
    };

    let _log_guard = match logging::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: file logging disabled: {e:#}");
            None
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), contract = %contract_name, "contract-setup starting");

    let outcome = run(&contract_name).await;
    match &outcome {
        Ok(deployment) => {
            info!(contract_address = %deployment.contract_address(), "contract setup completed");
            print!("{}", report::render_success(deployment));
        }
        Err(e) => {
            error!("contract setup failed: {e:#}");
            eprint!("{}", report::render_failure(e));
        }
    }
    ExitCode::from(report::exit_status(&outcome))
}

async fn run(contract_name: &str) -> anyhow::Result<DeploymentReport> {
    let config = DeployConfig::from_env().context("loading configuration")?;
    let resume_from = config.resume_code_id()?;

    // Local input is checked before any key is touched.
    let bytecode = match resume_from {
        Some(_) => Vec::new(),
        None => ArtifactDir::new(&config.artifacts_dir)
            .load(contract_name)
            .map_err(DeployError::from)?,
    };

    let signer = KeyringSigner::from_config(&config)?;
    let session: DeploySession<WasmdClient> = DeploySession::establish(&signer, &config).await?;

    let deployment = match resume_from {
        Some(code_id) => deploy_from_code_id(&session, code_id, &config.instantiate_msg).await?,
        None => deploy(&session, &bytecode, &config.instantiate_msg).await?,
    };
    Ok(deployment)
}
