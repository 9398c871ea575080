//! The deployment steps and the sequence that chains them.
//!
//! `Idle -> CodeStored -> Instantiated`: every arrow needs the previous
//! step's validated output. A failure stops the sequence and is returned
//! as-is; nothing here retries, since a resubmitted transaction may land twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::client::{
    ChainClient, ClientError, FeeSelection, InstantiateResponse, SDK_CODESPACE, StoreCodeResponse,
};
use crate::error::{DeployError, Step};
use crate::fee::{STORE_CODE_GAS_LIMIT, compute_fee};
use crate::session::{Actor, DeploySession};
use crate::types::{CodeId, Coin, ContractMsg, InstantiateResult, StoreCodeResult, TxReceipt};

/// Outcome of a full deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReport {
    /// `None` when the deployment resumed from a known code id.
    pub store: Option<StoreCodeResult>,
    pub instantiate: InstantiateResult,
    pub deployed_at: DateTime<Utc>,
}

impl DeploymentReport {
    pub fn code_id(&self) -> Option<CodeId> {
        self.store.as_ref().map(|s| s.code_id)
    }

    pub fn contract_address(&self) -> &str {
        &self.instantiate.contract_address
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Upload `bytecode` as the deployer, paying the fixed upload fee.
pub async fn store_code<C: ChainClient>(
    session: &DeploySession<C>,
    bytecode: &[u8],
) -> Result<StoreCodeResult, DeployError> {
    let fee = compute_fee(STORE_CODE_GAS_LIMIT, session.gas_price())?;
    let deployer = session.deployer();

    info!(
        sender = %deployer.address(),
        size = bytecode.len(),
        gas_limit = fee.gas_limit,
        "uploading contract code"
    );
    let response = {
        let _sequence = deployer.lock_sequence().await;
        deployer
            .client()
            .upload(deployer.address(), bytecode, &fee, session.upload_memo())
            .await
    }
    .map_err(|cause| {
        error!(error = %cause, "store code failed");
        DeployError::StoreFailure(cause)
    })?;

    let result = validate_store_response(response)?;
    info!(
        tx_hash = %result.transaction_hash,
        code_id = %result.code_id,
        gas_wanted = result.gas_wanted,
        gas_used = result.gas_used,
        "contract code stored"
    );
    Ok(result)
}

/// Instantiate stored code as the deployer with an automatic fee.
pub async fn instantiate<C: ChainClient>(
    session: &DeploySession<C>,
    code_id: CodeId,
    init_msg: &ContractMsg,
) -> Result<InstantiateResult, DeployError> {
    let deployer = session.deployer();

    info!(sender = %deployer.address(), code_id = %code_id, label = %session.label(), "instantiating contract");
    let response = {
        let _sequence = deployer.lock_sequence().await;
        deployer
            .client()
            .instantiate(
                deployer.address(),
                code_id,
                init_msg,
                session.label(),
                &FeeSelection::Auto,
            )
            .await
    }
    .map_err(|cause| {
        error!(code_id = %code_id, error = %cause, "instantiate failed");
        DeployError::InstantiateFailure { code_id, cause }
    })?;

    let result = validate_instantiate_response(response)?;
    info!(
        tx_hash = %result.transaction_hash,
        contract = %result.contract_address,
        gas_wanted = result.gas_wanted,
        gas_used = result.gas_used,
        "contract instantiated"
    );
    Ok(result)
}

/// Execute `msg` on `contract` as `actor`, attaching `funds` when present.
///
/// A coin with amount zero is dropped: the transaction then carries no funds
/// at all, never a zero-value coin.
pub async fn execute<C: ChainClient>(
    session: &DeploySession<C>,
    actor: &Actor<C>,
    contract: &str,
    msg: &ContractMsg,
    funds: Option<Coin>,
) -> Result<TxReceipt, DeployError> {
    let funds = attached_funds(funds);

    info!(
        sender = %actor.address(),
        role = %actor.role(),
        contract = %contract,
        funds = ?funds,
        "executing message"
    );
    let receipt = {
        let _sequence = actor.lock_sequence().await;
        actor
            .client()
            .execute(
                actor.address(),
                contract,
                msg,
                &FeeSelection::Auto,
                session.execute_memo(),
                &funds,
            )
            .await
    }
    .map_err(|cause| {
        error!(contract = %contract, error = %cause, "execute failed");
        match cause {
            // SDK rejections (fees, gas, sequence) are not the contract's verdict.
            ClientError::Rejected { codespace, log, .. }
                if codespace.as_deref() != Some(SDK_CODESPACE) =>
            {
                DeployError::ContractRejected {
                    contract: contract.to_string(),
                    message: log,
                }
            }
            cause => DeployError::ExecuteFailure {
                contract: contract.to_string(),
                cause,
            },
        }
    })?;

    info!(
        tx_hash = %receipt.transaction_hash,
        gas_wanted = receipt.gas_wanted,
        gas_used = receipt.gas_used,
        "message executed"
    );
    Ok(receipt)
}

/// Smart-query `contract`. Works with any client, signer or not.
pub async fn query<C: ChainClient + ?Sized>(
    client: &C,
    contract: &str,
    msg: &ContractMsg,
) -> Result<ContractMsg, DeployError> {
    debug!(contract = %contract, "querying contract");
    let response = client.query(contract, msg).await.map_err(|cause| {
        error!(contract = %contract, error = %cause, "query failed");
        DeployError::QueryFailure {
            contract: contract.to_string(),
            cause,
        }
    })?;
    info!(contract = %contract, "query successful");
    Ok(response)
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// Store `bytecode`, then instantiate it with `init_msg`.
pub async fn deploy<C: ChainClient>(
    session: &DeploySession<C>,
    bytecode: &[u8],
    init_msg: &ContractMsg,
) -> Result<DeploymentReport, DeployError> {
    let stored = store_code(session, bytecode).await?;
    let instantiated = instantiate(session, stored.code_id, init_msg).await?;
    Ok(DeploymentReport {
        store: Some(stored),
        instantiate: instantiated,
        deployed_at: Utc::now(),
    })
}

/// Instantiate code already on chain, for resuming after an instantiate
/// failure.
pub async fn deploy_from_code_id<C: ChainClient>(
    session: &DeploySession<C>,
    code_id: CodeId,
    init_msg: &ContractMsg,
) -> Result<DeploymentReport, DeployError> {
    info!(code_id = %code_id, "resuming deployment from stored code");
    let instantiated = instantiate(session, code_id, init_msg).await?;
    Ok(DeploymentReport {
        store: None,
        instantiate: instantiated,
        deployed_at: Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Response validation
// ---------------------------------------------------------------------------

/// Accept a store-code response only if it names a positive code id.
pub fn validate_store_response(response: StoreCodeResponse) -> Result<StoreCodeResult, DeployError> {
    let invalid = |detail: String| {
        error!(tx_hash = %response.transaction_hash, %detail, "invalid store code response");
        DeployError::InvalidResponse {
            step: Step::StoreCode,
            detail,
        }
    };

    let code_id = match response.code_id.as_deref() {
        None => return Err(invalid("no code id in response".into())),
        Some(raw) => CodeId::parse(raw)
            .ok_or_else(|| invalid(format!("code id {raw:?} is not a positive integer")))?,
    };

    Ok(StoreCodeResult {
        transaction_hash: response.transaction_hash,
        code_id,
        gas_wanted: response.gas_wanted,
        gas_used: response.gas_used,
    })
}

/// Accept an instantiate response only if it names a contract address.
pub fn validate_instantiate_response(
    response: InstantiateResponse,
) -> Result<InstantiateResult, DeployError> {
    let contract_address = response
        .contract_address
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            error!(tx_hash = %response.transaction_hash, "instantiate response has no contract address");
            DeployError::InvalidResponse {
                step: Step::Instantiate,
                detail: "no contract address in response".into(),
            }
        })?;

    Ok(InstantiateResult {
        transaction_hash: response.transaction_hash,
        contract_address,
        gas_wanted: response.gas_wanted,
        gas_used: response.gas_used,
    })
}

fn attached_funds(funds: Option<Coin>) -> Vec<Coin> {
    funds.into_iter().filter(|coin| !coin.is_zero()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_response(code_id: Option<&str>) -> StoreCodeResponse {
        StoreCodeResponse {
            transaction_hash: "H1".into(),
            code_id: code_id.map(str::to_string),
            gas_wanted: 3_000_000,
            gas_used: 1_234_567,
        }
    }

    #[test]
    fn store_response_with_code_id_is_accepted() {
        let result = validate_store_response(store_response(Some("42"))).unwrap();
        assert_eq!(result.code_id.get(), 42);
        assert_eq!(result.transaction_hash, "H1");
        assert_eq!(result.gas_used, 1_234_567);
    }

    #[test]
    fn store_response_without_code_id_is_invalid() {
        let err = validate_store_response(store_response(None)).unwrap_err();
        assert!(matches!(
            err,
            DeployError::InvalidResponse {
                step: Step::StoreCode,
                ..
            }
        ));
    }

    #[test]
    fn store_response_with_bad_code_id_is_invalid() {
        for raw in ["", "0", "abc", "4.2"] {
            let err = validate_store_response(store_response(Some(raw))).unwrap_err();
            assert_eq!(err.step(), Some(Step::StoreCode), "accepted {raw:?}");
        }
    }

    #[test]
    fn instantiate_response_needs_address() {
        let mut response = InstantiateResponse {
            transaction_hash: "H2".into(),
            contract_address: Some("wasm1contract".into()),
            gas_wanted: 200_000,
            gas_used: 180_000,
        };
        let ok = validate_instantiate_response(response.clone()).unwrap();
        assert_eq!(ok.contract_address, "wasm1contract");

        response.contract_address = Some("  ".into());
        assert!(validate_instantiate_response(response.clone()).is_err());

        response.contract_address = None;
        let err = validate_instantiate_response(response).unwrap_err();
        assert_eq!(err.step(), Some(Step::Instantiate));
    }

    #[test]
    fn zero_funds_are_dropped() {
        assert!(attached_funds(None).is_empty());
        assert!(attached_funds(Some(Coin::new(0, "ustake"))).is_empty());
        assert_eq!(
            attached_funds(Some(Coin::new(5, "ustake"))),
            vec![Coin::new(5, "ustake")]
        );
    }
}
