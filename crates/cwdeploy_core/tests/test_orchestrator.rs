use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use cwdeploy_core::{
    Account, Actor, ChainClient, ClientError, CodeId, Coin, ContractMsg, DeployConfig,
    DeployError, DeploySession, ErrorKind, Fee, FeeSelection, InstantiateResponse, Role,
    SignerHandle, SignerProvider, Step, StoreCodeResponse, TxReceipt, deploy,
    deploy_from_code_id, execute, instantiate, query, store_code,
};

// ---------------------------------------------------------------------------
// Client double
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Upload {
        sender: String,
        size: usize,
        fee: Fee,
        memo: String,
    },
    Instantiate {
        sender: String,
        code_id: u64,
        msg: ContractMsg,
        label: String,
        fee: FeeSelection,
    },
    Execute {
        sender: String,
        contract: String,
        memo: String,
        fee: FeeSelection,
        funds: Vec<Coin>,
    },
    Query {
        contract: String,
    },
}

struct Script {
    upload: Result<StoreCodeResponse, ClientError>,
    instantiate: Result<InstantiateResponse, ClientError>,
    execute: Result<TxReceipt, ClientError>,
    query: Result<ContractMsg, ClientError>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            upload: Ok(StoreCodeResponse {
                transaction_hash: "H1".into(),
                code_id: Some("42".into()),
                gas_wanted: 3_000_000,
                gas_used: 2_100_000,
            }),
            instantiate: Ok(InstantiateResponse {
                transaction_hash: "H2".into(),
                contract_address: Some("addr1".into()),
                gas_wanted: 250_000,
                gas_used: 190_000,
            }),
            execute: Ok(TxReceipt {
                transaction_hash: "H3".into(),
                height: 77,
                gas_wanted: 150_000,
                gas_used: 120_000,
            }),
            query: Ok(json!({ "owner": "wasm1deployer" })),
        }
    }
}

/// Records every call and answers from a script.
#[derive(Clone)]
struct RecordingClient {
    signer: Option<String>,
    script: Arc<Script>,
    calls: Arc<Mutex<Vec<Call>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    delay: Duration,
}

impl RecordingClient {
    fn new(signer: Option<&str>, script: Script) -> Self {
        Self {
            signer: signer.map(str::to_string),
            script: Arc::new(script),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Share call log and in-flight counters with `other`.
    fn sharing_with(mut self, other: &RecordingClient) -> Self {
        self.calls = other.calls.clone();
        self.in_flight = other.in_flight.clone();
        self.max_in_flight = other.max_in_flight.clone();
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn instantiate_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Instantiate { .. }))
            .count()
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn require_signer(&self) -> Result<(), ClientError> {
        match self.signer {
            Some(_) => Ok(()),
            None => Err(ClientError::Signature("client has no signer".into())),
        }
    }

    async fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainClient for RecordingClient {
    async fn upload(
        &self,
        sender: &str,
        bytecode: &[u8],
        fee: &Fee,
        memo: &str,
    ) -> Result<StoreCodeResponse, ClientError> {
        self.require_signer()?;
        self.record(Call::Upload {
            sender: sender.into(),
            size: bytecode.len(),
            fee: fee.clone(),
            memo: memo.into(),
        })
        .await;
        self.script.upload.clone()
    }

    async fn instantiate(
        &self,
        sender: &str,
        code_id: CodeId,
        init_msg: &ContractMsg,
        label: &str,
        fee: &FeeSelection,
    ) -> Result<InstantiateResponse, ClientError> {
        self.require_signer()?;
        self.record(Call::Instantiate {
            sender: sender.into(),
            code_id: code_id.get(),
            msg: init_msg.clone(),
            label: label.into(),
            fee: fee.clone(),
        })
        .await;
        self.script.instantiate.clone()
    }

    async fn execute(
        &self,
        sender: &str,
        contract: &str,
        _msg: &ContractMsg,
        fee: &FeeSelection,
        memo: &str,
        funds: &[Coin],
    ) -> Result<TxReceipt, ClientError> {
        self.require_signer()?;
        self.record(Call::Execute {
            sender: sender.into(),
            contract: contract.into(),
            memo: memo.into(),
            fee: fee.clone(),
            funds: funds.to_vec(),
        })
        .await;
        self.script.execute.clone()
    }

    async fn query(&self, contract: &str, _msg: &ContractMsg) -> Result<ContractMsg, ClientError> {
        self.record(Call::Query {
            contract: contract.into(),
        })
        .await;
        self.script.query.clone()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn account(role: Role, address: &str) -> Account {
    Account {
        role,
        address: address.into(),
        signer: SignerHandle(format!("cwdeploy-{role}")),
    }
}

fn session_with(
    deployer: RecordingClient,
    tester: RecordingClient,
) -> DeploySession<RecordingClient> {
    DeploySession::new(
        Actor::new(account(Role::Deployer, "wasm1deployer"), deployer),
        Actor::new(account(Role::Tester, "wasm1tester"), tester),
        "0.025ustake".parse().unwrap(),
    )
}

fn session(script: Script) -> (DeploySession<RecordingClient>, RecordingClient) {
    let deployer = RecordingClient::new(Some("deployer-key"), script);
    let tester = RecordingClient::new(Some("tester-key"), Script::default()).sharing_with(&deployer);
    (session_with(deployer.clone(), tester), deployer)
}

fn bytecode() -> Vec<u8> {
    b"\0asm\x01\0\0\0".to_vec()
}

// ---------------------------------------------------------------------------
// Deployment sequence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deploy_stores_then_instantiates_with_returned_code_id() {
    let (session, client) = session(Script::default());
    let init = json!({ "campaign_code_id": 1343, "allow_create_for_all": false });

    let report = deploy(&session, &bytecode(), &init).await.unwrap();

    assert_eq!(report.contract_address(), "addr1");
    assert_eq!(report.code_id().map(CodeId::get), Some(42));
    assert_eq!(report.store.as_ref().unwrap().transaction_hash, "H1");
    assert_eq!(report.instantiate.transaction_hash, "H2");

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    match &calls[0] {
        Call::Upload {
            sender,
            size,
            fee,
            memo,
        } => {
            assert_eq!(sender, "wasm1deployer");
            assert_eq!(*size, bytecode().len());
            assert_eq!(fee.gas_limit, 3_000_000);
            assert_eq!(fee.amount, vec![Coin::new(75_000, "ustake")]);
            assert_eq!(memo, "Upload contract code");
        }
        other => panic!("expected upload first, got {other:?}"),
    }
    match &calls[1] {
        Call::Instantiate {
            sender,
            code_id,
            msg,
            label,
            fee,
        } => {
            assert_eq!(sender, "wasm1deployer");
            assert_eq!(*code_id, 42);
            assert_eq!(msg, &init);
            assert_eq!(label, "instantiation contract");
            assert_eq!(fee, &FeeSelection::Auto);
        }
        other => panic!("expected instantiate second, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_code_id_never_reaches_instantiate() {
    let script = Script {
        upload: Ok(StoreCodeResponse {
            transaction_hash: "H1".into(),
            code_id: None,
            gas_wanted: 3_000_000,
            gas_used: 2_000_000,
        }),
        ..Script::default()
    };
    let (session, client) = session(script);

    let err = deploy(&session, &bytecode(), &json!({})).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    assert_eq!(err.step(), Some(Step::StoreCode));
    assert_eq!(client.instantiate_calls(), 0);
}

#[tokio::test]
async fn non_numeric_code_id_never_reaches_instantiate() {
    let script = Script {
        upload: Ok(StoreCodeResponse {
            transaction_hash: "H1".into(),
            code_id: Some("undefined".into()),
            ..StoreCodeResponse::default()
        }),
        ..Script::default()
    };
    let (session, client) = session(script);

    let err = deploy(&session, &bytecode(), &json!({})).await.unwrap_err();

    assert!(matches!(err, DeployError::InvalidResponse { .. }));
    assert_eq!(client.instantiate_calls(), 0);
}

#[tokio::test]
async fn transport_failure_on_store_halts_sequence() {
    let script = Script {
        upload: Err(ClientError::Transport("dial tcp: connection refused".into())),
        ..Script::default()
    };
    let (session, client) = session(script);

    let err = deploy(&session, &bytecode(), &json!({})).await.unwrap_err();

    assert!(matches!(err, DeployError::StoreFailure(ClientError::Transport(_))));
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.step(), Some(Step::StoreCode));
    assert_eq!(client.instantiate_calls(), 0);
}

#[tokio::test]
async fn instantiate_without_address_is_invalid_response() {
    let script = Script {
        instantiate: Ok(InstantiateResponse {
            transaction_hash: "H2".into(),
            contract_address: None,
            ..InstantiateResponse::default()
        }),
        ..Script::default()
    };
    let (session, _client) = session(script);

    let err = deploy(&session, &bytecode(), &json!({})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    assert_eq!(err.step(), Some(Step::Instantiate));
}

#[tokio::test]
async fn instantiate_failure_reports_code_id_to_resume_from() {
    let script = Script {
        instantiate: Err(ClientError::rejected("out of gas in location: wasm")),
        ..Script::default()
    };
    let (session, _client) = session(script);

    let err = deploy(&session, &bytecode(), &json!({})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChainRejection);
    assert_eq!(err.stored_code_id().map(CodeId::get), Some(42));
}

#[tokio::test]
async fn resume_skips_upload() {
    let (session, client) = session(Script::default());
    let code_id = CodeId::new(1343).unwrap();

    let report = deploy_from_code_id(&session, code_id, &json!({}))
        .await
        .unwrap();

    assert!(report.store.is_none());
    assert_eq!(report.contract_address(), "addr1");
    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], Call::Instantiate { code_id: 1343, .. }));
}

#[tokio::test]
async fn custom_label_and_memo_are_used() {
    let (session, client) = session(Script::default());
    let session = session
        .with_label("campaign factory v2")
        .with_upload_memo("Upload campaign contract code");

    let stored = store_code(&session, &bytecode()).await.unwrap();
    instantiate(&session, stored.code_id, &json!({})).await.unwrap();

    let calls = client.calls();
    assert!(matches!(&calls[0], Call::Upload { memo, .. } if memo == "Upload campaign contract code"));
    assert!(matches!(&calls[1], Call::Instantiate { label, .. } if label == "campaign factory v2"));
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

#[tokio::test]
async fn execute_without_funds_sends_no_coins() {
    let (session, client) = session(Script::default());

    for funds in [None, session.native_funds(0), Some(Coin::new(0, "uother"))] {
        execute(
            &session,
            session.tester(),
            "addr1",
            &json!({ "add_reward": {} }),
            funds,
        )
        .await
        .unwrap();
    }

    let calls = client.calls();
    assert_eq!(calls.len(), 3);
    for call in calls {
        match call {
            Call::Execute {
                sender,
                funds,
                memo,
                fee,
                ..
            } => {
                assert_eq!(sender, "wasm1tester");
                assert!(funds.is_empty());
                assert_eq!(memo, "execute a message");
                assert_eq!(fee, FeeSelection::Auto);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }
}

#[tokio::test]
async fn execute_with_funds_sends_exactly_one_coin() {
    let (session, client) = session(Script::default());

    execute(
        &session,
        session.tester(),
        "addr1",
        &json!({ "stake_nfts": { "token_ids": ["1"] } }),
        session.native_funds(1_000),
    )
    .await
    .unwrap();
    execute(
        &session,
        session.deployer(),
        "addr1",
        &json!({}),
        Some(Coin::new(7, "uatom")),
    )
    .await
    .unwrap();

    let funds: Vec<Vec<Coin>> = client
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Execute { funds, .. } => Some(funds),
            _ => None,
        })
        .collect();
    assert_eq!(
        funds,
        vec![
            vec![Coin::new(1_000, "ustake")],
            vec![Coin::new(7, "uatom")],
        ]
    );
}

#[tokio::test]
async fn contract_rejection_is_distinct_from_transport() {
    let script = Script {
        execute: Err(ClientError::rejected("insufficient funds")),
        ..Script::default()
    };
    let deployer = RecordingClient::new(Some("deployer-key"), Script::default());
    let tester = RecordingClient::new(Some("tester-key"), script);
    let session = session_with(deployer, tester);

    let err = execute(&session, session.tester(), "addr1", &json!({}), None)
        .await
        .unwrap_err();

    match &err {
        DeployError::ContractRejected { contract, message } => {
            assert_eq!(contract, "addr1");
            assert_eq!(message, "insufficient funds");
        }
        other => panic!("expected ContractRejected, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::ContractRejected);
    assert_ne!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn sdk_rejection_is_chain_rejection_not_contract() {
    let cases = [
        (32, "account sequence mismatch, expected 7, got 6: incorrect account sequence"),
        (13, "insufficient fees; got: 10ustake required: 5000ustake: insufficient fee"),
        (11, "out of gas in location: WritePerByte; gasWanted: 200000, gasUsed: 201337: out of gas"),
    ];
    for (code, log) in cases {
        let script = Script {
            execute: Err(ClientError::sdk_rejected(code, log)),
            ..Script::default()
        };
        let deployer = RecordingClient::new(Some("deployer-key"), Script::default());
        let tester = RecordingClient::new(Some("tester-key"), script);
        let session = session_with(deployer, tester);

        let err = execute(&session, session.tester(), "addr1", &json!({}), None)
            .await
            .unwrap_err();
        match &err {
            DeployError::ExecuteFailure { contract, cause } => {
                assert_eq!(contract, "addr1");
                assert!(cause.is_sdk_rejection());
            }
            other => panic!("code {code}: expected ExecuteFailure, got {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::ChainRejection);
        assert_eq!(err.step(), Some(Step::Execute));
    }
}

#[tokio::test]
async fn wasm_rejection_with_codespace_stays_contract_rejection() {
    let script = Script {
        execute: Err(ClientError::Rejected {
            codespace: Some("wasm".into()),
            code: Some(5),
            log: "Unauthorized".into(),
        }),
        ..Script::default()
    };
    let deployer = RecordingClient::new(Some("deployer-key"), Script::default());
    let tester = RecordingClient::new(Some("tester-key"), script);
    let session = session_with(deployer, tester);

    let err = execute(&session, session.tester(), "addr1", &json!({}), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DeployError::ContractRejected { ref message, .. } if message == "Unauthorized"
    ));
}

#[tokio::test]
async fn execute_transport_failure_stays_execute_failure() {
    let script = Script {
        execute: Err(ClientError::Transport("post failed: 502".into())),
        ..Script::default()
    };
    let deployer = RecordingClient::new(Some("deployer-key"), Script::default());
    let tester = RecordingClient::new(Some("tester-key"), script);
    let session = session_with(deployer, tester);

    let err = execute(&session, session.tester(), "addr1", &json!({}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::ExecuteFailure { .. }));
    assert_eq!(err.kind(), ErrorKind::Transport);
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[tokio::test]
async fn query_works_without_signer() {
    let read_only = RecordingClient::new(None, Script::default());

    let response = query(&read_only, "addr1", &json!({ "config": {} }))
        .await
        .unwrap();

    assert_eq!(response, json!({ "owner": "wasm1deployer" }));
    assert_eq!(
        read_only.calls(),
        vec![Call::Query {
            contract: "addr1".into()
        }]
    );
}

#[tokio::test]
async fn query_failure_is_reported() {
    let client = RecordingClient::new(
        None,
        Script {
            query: Err(ClientError::rejected("contract: not found")),
            ..Script::default()
        },
    );

    let err = query(&client, "wasm1missing", &json!({ "config": {} }))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::QueryFailure { .. }));
    assert_eq!(err.step(), Some(Step::Query));
}

#[tokio::test]
async fn query_through_trait_object() {
    let client: Box<dyn ChainClient> = Box::new(RecordingClient::new(None, Script::default()));
    let response = query(client.as_ref(), "addr1", &json!({})).await.unwrap();
    assert!(response.get("owner").is_some());
}

// ---------------------------------------------------------------------------
// Sequencing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn same_account_transactions_never_overlap() {
    let deployer = RecordingClient::new(Some("deployer-key"), Script::default())
        .with_delay(Duration::from_millis(20));
    let tester = RecordingClient::new(Some("tester-key"), Script::default());
    let session = session_with(deployer.clone(), tester);

    let msg = json!({});
    let (a, b) = tokio::join!(
        execute(&session, session.deployer(), "addr1", &msg, None),
        execute(&session, session.deployer(), "addr1", &msg, None),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(deployer.max_in_flight(), 1);
}

#[tokio::test]
async fn different_accounts_may_overlap() {
    let deployer = RecordingClient::new(Some("deployer-key"), Script::default())
        .with_delay(Duration::from_millis(20));
    let tester = RecordingClient::new(Some("tester-key"), Script::default())
        .with_delay(Duration::from_millis(20))
        .sharing_with(&deployer);
    let session = session_with(deployer.clone(), tester);

    let msg = json!({});
    let (a, b) = tokio::join!(
        execute(&session, session.deployer(), "addr1", &msg, None),
        execute(&session, session.tester(), "addr1", &msg, None),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(deployer.max_in_flight(), 2);
}

// ---------------------------------------------------------------------------
// Session establishment
// ---------------------------------------------------------------------------

/// Derives a fake address from the first letters of each mnemonic word.
struct FakeProvider;

#[async_trait]
impl SignerProvider for FakeProvider {
    type Client = RecordingClient;

    async fn from_secret(
        &self,
        role: Role,
        secret: &str,
        address_prefix: &str,
    ) -> Result<Account, ClientError> {
        if secret.split_whitespace().count() < 3 {
            return Err(ClientError::Signature("invalid mnemonic".into()));
        }
        let body: String = secret
            .split_whitespace()
            .filter_map(|w| w.chars().next())
            .collect();
        Ok(Account {
            role,
            address: format!("{address_prefix}1{body}"),
            signer: SignerHandle(format!("cwdeploy-{role}")),
        })
    }

    async fn connect(&self, account: &Account) -> Result<RecordingClient, ClientError> {
        Ok(RecordingClient::new(
            Some(account.signer.as_str()),
            Script::default(),
        ))
    }

    fn connect_read_only(&self) -> RecordingClient {
        RecordingClient::new(None, Script::default())
    }
}

fn config_with(deployer: &'static str, tester: &'static str) -> DeployConfig {
    DeployConfig::default().with_secrets(move |key: &str| match key {
        "CWDEPLOY_DEPLOYER_MNEMONIC" => Some(deployer.to_string()),
        "CWDEPLOY_TESTER_MNEMONIC" => Some(tester.to_string()),
        _ => None,
    })
}

#[tokio::test]
async fn establish_derives_both_accounts() {
    let config = config_with("alpha bravo charlie", "delta echo foxtrot");

    let session = DeploySession::establish(&FakeProvider, &config).await.unwrap();

    assert_eq!(session.deployer().address(), "wasm1abc");
    assert_eq!(session.tester().address(), "wasm1def");
    assert_eq!(session.actor(Role::Tester).role(), Role::Tester);
    assert_eq!(session.gas_price().to_string(), "0.025ustake");
    assert_eq!(session.native_denom(), "ustake");
    assert_eq!(session.label(), "instantiation contract");
}

#[tokio::test]
async fn establish_is_deterministic() {
    let config = config_with("alpha bravo charlie", "delta echo foxtrot");
    let first = DeploySession::establish(&FakeProvider, &config).await.unwrap();
    let second = DeploySession::establish(&FakeProvider, &config).await.unwrap();
    assert_eq!(first.deployer().account(), second.deployer().account());
}

#[tokio::test]
async fn establish_reports_bad_identity() {
    let config = config_with("alpha bravo charlie", "delta");

    let err = match DeploySession::establish(&FakeProvider, &config).await {
        Ok(_) => panic!("expected identity failure"),
        Err(err) => err,
    };
    assert!(matches!(err, DeployError::Identity { role: Role::Tester, .. }));
    assert_eq!(err.kind(), ErrorKind::Signature);
}

#[tokio::test]
async fn establish_requires_mnemonics() {
    let config = DeployConfig::default();
    let err = match DeploySession::establish(&FakeProvider, &config).await {
        Ok(_) => panic!("expected config failure"),
        Err(err) => err,
    };
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn read_only_client_from_provider_can_query() {
    let client = FakeProvider.connect_read_only();
    assert!(query(&client, "addr1", &json!({})).await.is_ok());
    assert!(matches!(
        store_code(
            &session_with(FakeProvider.connect_read_only(), FakeProvider.connect_read_only()),
            &bytecode()
        )
        .await,
        Err(DeployError::StoreFailure(ClientError::Signature(_)))
    ));
}
