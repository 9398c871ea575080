//! Console output for the operator.

use std::fmt::Write;

use cwdeploy_core::{ClientError, DeployError, DeploymentReport, ErrorKind};

pub fn render_success(report: &DeploymentReport) -> String {
    let mut out = String::new();
    match &report.store {
        Some(stored) => {
            let _ = writeln!(out, "1. Stored source code");
            let _ = writeln!(out, "  transactionHash: {}", stored.transaction_hash);
            let _ = writeln!(out, "  codeId: {}", stored.code_id);
            let _ = writeln!(
                out,
                "  gasWanted / gasUsed: {} / {}",
                stored.gas_wanted, stored.gas_used
            );
        }
        None => {
            let _ = writeln!(out, "1. Reused stored code");
        }
    }

    let inst = &report.instantiate;
    let _ = writeln!(out, "2. Instantiated contract");
    let _ = writeln!(out, "  transactionHash: {}", inst.transaction_hash);
    let _ = writeln!(out, "  contractAddress: {}", inst.contract_address);
    let _ = writeln!(
        out,
        "  gasWanted / gasUsed: {} / {}",
        inst.gas_wanted, inst.gas_used
    );
    let _ = writeln!(out, "Contract setup completed!");
    out
}

pub fn render_failure(err: &anyhow::Error) -> String {
    let mut out = String::new();
    let Some(deploy_err) = err.downcast_ref::<DeployError>() else {
        let _ = writeln!(out, "Contract setup failed: {err:#}");
        return out;
    };

    match deploy_err.step() {
        Some(step) => {
            let _ = writeln!(
                out,
                "Step {} ({step}) failed [{}]",
                step.number(),
                deploy_err.kind()
            );
        }
        None => {
            let _ = writeln!(out, "Setup failed [{}]", deploy_err.kind());
        }
    }
    let _ = writeln!(out, "  {err:#}");

    if let Some(code_id) = deploy_err.stored_code_id() {
        let _ = writeln!(
            out,
            "  Code {code_id} is already on chain. Set `resume_code_id = {code_id}` to retry instantiation without uploading again."
        );
    }
    if deploy_err
        .client_error()
        .is_some_and(ClientError::is_sdk_rejection)
    {
        let _ = writeln!(
            out,
            "  The chain refused the transaction before the contract ran (fee, gas or account sequence)."
        );
    }
    if deploy_err.kind() == ErrorKind::Transport {
        let _ = writeln!(
            out,
            "  The transaction may still land. Check chain state before running again."
        );
    }
    out
}

pub fn exit_status<T>(outcome: &anyhow::Result<T>) -> u8 {
    match outcome {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwdeploy_core::{CodeId, InstantiateResult, StoreCodeResult};

    fn report(store: Option<StoreCodeResult>) -> DeploymentReport {
        DeploymentReport {
            store,
            instantiate: InstantiateResult {
                transaction_hash: "H2".into(),
                contract_address: "wasm1contract".into(),
                gas_wanted: 250_000,
                gas_used: 190_000,
            },
            deployed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn success_lists_both_steps() {
        let text = render_success(&report(Some(StoreCodeResult {
            transaction_hash: "H1".into(),
            code_id: CodeId::new(42).unwrap(),
            gas_wanted: 3_000_000,
            gas_used: 2_143_511,
        })));
        assert!(text.contains("codeId: 42"));
        assert!(text.contains("transactionHash: H1"));
        assert!(text.contains("contractAddress: wasm1contract"));
        assert!(text.contains("3000000 / 2143511"));
        assert!(text.ends_with("Contract setup completed!\n"));
    }

    #[test]
    fn resumed_success_has_no_upload() {
        let text = render_success(&report(None));
        assert!(text.contains("Reused stored code"));
        assert!(!text.contains("codeId"));
    }

    #[test]
    fn store_transport_failure_is_reported() {
        let outcome: anyhow::Result<()> = Err(DeployError::StoreFailure(
            ClientError::Transport("connection refused".into()),
        )
        .into());
        let text = render_failure(outcome.as_ref().unwrap_err());
        assert!(text.starts_with("Step 1 (store code) failed [TransportFailure]"));
        assert!(text.contains("connection refused"));
        assert!(!text.contains("resume_code_id"));
        assert_ne!(exit_status(&outcome), 0);
    }

    #[test]
    fn instantiate_failure_hints_resume() {
        let err: anyhow::Error = DeployError::InstantiateFailure {
            code_id: CodeId::new(42).unwrap(),
            cause: ClientError::rejected("out of gas"),
        }
        .into();
        let text = render_failure(&err);
        assert!(text.contains("[ChainRejection]"));
        assert!(text.contains("resume_code_id = 42"));
    }

    #[test]
    fn sdk_rejection_on_execute_is_explained() {
        let err: anyhow::Error = DeployError::ExecuteFailure {
            contract: "wasm1contract".into(),
            cause: ClientError::sdk_rejected(32, "account sequence mismatch, expected 7, got 6"),
        }
        .into();
        let text = render_failure(&err);
        assert!(text.starts_with("Step 3 (execute) failed [ChainRejection]"));
        assert!(text.contains("before the contract ran"));
    }

    #[test]
    fn context_keeps_classification() {
        use anyhow::Context;
        let outcome: anyhow::Result<()> =
            Err(DeployError::Config("rpc_endpoint invalid".into())).context("loading configuration");
        let text = render_failure(outcome.as_ref().unwrap_err());
        assert!(text.starts_with("Setup failed [ConfigError]"));
        assert!(text.contains("loading configuration"));
    }

    #[test]
    fn success_exits_zero() {
        assert_eq!(exit_status(&Ok::<_, anyhow::Error>(())), 0);
    }
}
