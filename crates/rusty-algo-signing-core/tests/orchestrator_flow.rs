mod common;

use std::str::FromStr;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rust_decimal::Decimal;
use rusty_algo_signing_core::builders::compose;
use rusty_algo_signing_core::{
    codec, Address, Arc59SendDraft, Arc59SendSummary, AssetInfo, CancellationToken, DraftNote,
    MicroAlgos, NetworkError, OptInAndSendDraft, PaymentDraft, PendingTransaction, Recipient,
    RunStatus, SignError, Signable, SigningFlow, TransactionDraft, TransactionError,
    TransactionEvent, TransportError,
};

use common::{account, drain, local_signer, new_orchestrator, params, MockGateway, StaticResolver};

fn payment(from: Address, to: Address, amount: &str) -> TransactionDraft {
    TransactionDraft::Payment(PaymentDraft {
        from: account(from, 10_000_000),
        to: Recipient::from(to),
        amount: Decimal::from_str(amount).expect("decimal"),
        is_max_transaction: false,
        note: DraftNote::default(),
        fee: None,
    })
}

fn usdc(creator: Address) -> AssetInfo {
    AssetInfo {
        id: 31566704,
        decimals: 6,
        creator,
        unit_name: Some("USDC".to_owned()),
    }
}

fn arc59_send(sender: Address, receiver: Address) -> TransactionDraft {
    TransactionDraft::Arc59Send(Arc59SendDraft {
        sender: account(sender, 20_000_000),
        receiver: Recipient::from(receiver),
        asset: usdc(sender),
        amount: Decimal::from_str("5").expect("decimal"),
        summary: Arc59SendSummary {
            app_id: 643020148,
            inbox_address: local_signer(7).address().to_string(),
            minimum_balance_requirement: MicroAlgos(228_100),
            inner_transaction_count: 4,
            is_arc59_opted_in: false,
            receiver_algo_needed_for_claim: MicroAlgos(0),
            protocol_fee: MicroAlgos(0),
        },
        note: DraftNote::default(),
    })
}

#[tokio::test]
async fn payment_completes_with_node_txid() {
    let alice = local_signer(1);
    let bob = local_signer(2).address();
    let (gateway, orch, mut rx) = new_orchestrator(
        MockGateway::new(params(1000, 0)).with_submit(Ok("txid-123".to_owned())),
        StaticResolver::default().with(alice.clone()),
    );

    let report = orch
        .run(payment(alice.address(), bob, "1.5"), CancellationToken::new())
        .await
        .expect("run");

    assert_eq!(report.txid, "txid-123");
    assert_eq!(report.fee, MicroAlgos(1000));
    assert_eq!(report.transaction_ids.len(), 1);
    assert_eq!(orch.status(), RunStatus::Completed);

    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, TransactionEvent::FeeRecalculated { .. })));
    let last_state = events.iter().rev().find_map(|e| match e {
        TransactionEvent::RunStateChanged(t) => Some(t.to),
        _ => None,
    });
    assert_eq!(last_state, Some(RunStatus::Completed));

    let submissions = gateway.submissions();
    assert_eq!(submissions.len(), 1);
    let signed = &submissions[0];
    let record = &orch.records()[0];
    assert_eq!(record.signed_bytes.as_ref(), Some(signed));

    // {"sig": bin64, "txn": ...}
    let signature: [u8; 64] = signed[7..71].try_into().expect("signature");
    let key = VerifyingKey::from_bytes(alice.address().as_bytes()).expect("key");
    key.verify(
        &codec::bytes_to_sign(&record.unsigned_bytes),
        &Signature::from_bytes(&signature),
    )
    .expect("valid signature");
    assert!(signed.ends_with(&record.unsigned_bytes));
}

#[tokio::test]
async fn params_failure_ends_in_compose_failed() {
    let alice = local_signer(1);
    let (_, orch, _rx) = new_orchestrator(
        MockGateway::failing_params(TransportError::Connectivity("offline".to_owned())),
        StaticResolver::default().with(alice.clone()),
    );

    let err = orch
        .run(
            payment(alice.address(), local_signer(2).address(), "1"),
            CancellationToken::new(),
        )
        .await
        .expect_err("must fail");

    assert_eq!(
        err,
        TransactionError::Network(NetworkError::ParamsFetchFailed(
            TransportError::Connectivity("offline".to_owned())
        ))
    );
    assert_eq!(orch.status(), RunStatus::ComposeFailed);
}

#[tokio::test]
async fn upload_failure_keeps_transport_error() {
    let alice = local_signer(1);
    let (_, orch, _rx) = new_orchestrator(
        MockGateway::new(params(1000, 0)).with_submit(Err(TransportError::Api {
            status: 400,
            message: "overspend".to_owned(),
        })),
        StaticResolver::default().with(alice.clone()),
    );

    let err = orch
        .run(
            payment(alice.address(), local_signer(2).address(), "1"),
            CancellationToken::new(),
        )
        .await
        .expect_err("must fail");

    match err {
        TransactionError::Network(NetworkError::UploadFailed(TransportError::Api {
            status, ..
        })) => assert_eq!(status, 400),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(orch.status(), RunStatus::UploadFailed);
    assert!(orch.records().is_empty());
}

#[tokio::test]
async fn unsigned_group_member_blocks_the_whole_group() {
    let sender = local_signer(1);
    let receiver = local_signer(2).address();
    let (gateway, orch, _rx) = new_orchestrator(
        MockGateway::new(params(1000, 0)),
        StaticResolver::default().with(sender.clone()),
    );
    let draft = TransactionDraft::OptInAndSend(OptInAndSendDraft {
        sender: account(sender.address(), 10_000_000),
        receiver: account(receiver, 1_000_000),
        asset: usdc(sender.address()),
        amount: Decimal::from_str("1").expect("decimal"),
        note: DraftNote::default(),
    });

    let err = orch
        .run(draft, CancellationToken::new())
        .await
        .expect_err("must fail");

    assert_eq!(err, TransactionError::Sign(SignError::NoSignerForAddress(receiver)));
    assert_eq!(orch.status(), RunStatus::SignFailed);
    assert!(orch.records().is_empty());
    assert!(gateway.submissions().is_empty());
}

#[tokio::test]
async fn group_members_upload_as_one_blob() {
    let sender = local_signer(1);
    let receiver = local_signer(2);
    let (gateway, orch, _rx) = new_orchestrator(
        MockGateway::new(params(1000, 0)),
        StaticResolver::default()
            .with(sender.clone())
            .with(receiver.clone()),
    );
    let draft = TransactionDraft::OptInAndSend(OptInAndSendDraft {
        sender: account(sender.address(), 10_000_000),
        receiver: account(receiver.address(), 1_000_000),
        asset: usdc(sender.address()),
        amount: Decimal::from_str("1").expect("decimal"),
        note: DraftNote::default(),
    });

    orch.run(draft, CancellationToken::new()).await.expect("run");

    let records = orch.records();
    let expected: Vec<u8> = records
        .iter()
        .flat_map(|r| r.signed_bytes.clone().expect("signed"))
        .collect();
    assert_eq!(gateway.submissions(), vec![expected]);
}

#[tokio::test]
async fn cancelled_run_never_uploads() {
    let alice = local_signer(1);
    let (gateway, orch, _rx) = new_orchestrator(
        MockGateway::new(params(1000, 0)),
        StaticResolver::default().with(alice.clone()),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orch
        .run(payment(alice.address(), local_signer(2).address(), "1"), cancel)
        .await
        .expect_err("must fail");

    assert_eq!(err, TransactionError::Cancelled);
    assert_eq!(orch.status(), RunStatus::Cancelled);
    assert!(orch.records().is_empty());
    assert!(gateway.submissions().is_empty());
}

#[tokio::test]
async fn next_run_starts_clean_after_failure() {
    let alice = local_signer(1);
    let (_, orch, _rx) = new_orchestrator(
        MockGateway::new(params(1000, 0)).with_submit(Err(TransportError::Connectivity(
            "reset by peer".to_owned(),
        ))),
        StaticResolver::default().with(alice.clone()),
    );
    let bob = local_signer(2).address();

    orch.run(payment(alice.address(), bob, "1"), CancellationToken::new())
        .await
        .expect_err("first run fails");
    assert_eq!(orch.status(), RunStatus::UploadFailed);

    let report = orch
        .run(payment(alice.address(), bob, "1"), CancellationToken::new())
        .await
        .expect("second run");
    assert_eq!(report.txid, "txid-2");
    assert_eq!(orch.status(), RunStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn arc59_send_confirms_each_batch_in_order() {
    let sender = local_signer(1);
    let (gateway, orch, mut rx) = new_orchestrator(
        MockGateway::new(params(1000, 0)),
        StaticResolver::default().with(sender.clone()),
    );

    let report = orch
        .run(
            arc59_send(sender.address(), local_signer(2).address()),
            CancellationToken::new(),
        )
        .await
        .expect("run");

    assert_eq!(orch.status(), RunStatus::Completed);
    assert_eq!(gateway.submissions().len(), 2);
    assert_eq!(report.txid, "txid-1");
    assert_eq!(report.confirmed_round, Some(101));
    let confirmed = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, TransactionEvent::Confirmed { .. }))
        .count();
    assert_eq!(confirmed, 2);
}

#[tokio::test(start_paused = true)]
async fn arc59_rejected_batch_aborts_dependents() {
    let sender = local_signer(1);
    let (gateway, orch, mut rx) = new_orchestrator(
        MockGateway::new(params(1000, 0)).with_pending(Ok(PendingTransaction {
            confirmed_round: None,
            pool_error: Some("asset not opted in".to_owned()),
        })),
        StaticResolver::default().with(sender.clone()),
    );

    let err = orch
        .run(
            arc59_send(sender.address(), local_signer(2).address()),
            CancellationToken::new(),
        )
        .await
        .expect_err("must fail");

    assert!(matches!(
        err,
        TransactionError::Network(NetworkError::TransactionRejectedByNode { .. })
    ));
    assert_eq!(orch.status(), RunStatus::TransactionRejected);
    assert_eq!(gateway.submissions().len(), 1);
    assert!(drain(&mut rx).contains(&TransactionEvent::GroupAborted {
        failed_batch: 0,
        skipped: 1,
    }));
}

#[tokio::test]
async fn external_transactions_are_signed_without_upload() {
    let alice = local_signer(1);
    let (gateway, orch, _rx) = new_orchestrator(
        MockGateway::new(params(1000, 0)),
        StaticResolver::default().with(alice.clone()),
    );
    let items = compose(
        &params(1000, 0),
        &payment(alice.address(), local_signer(2).address(), "2"),
    )
    .expect("compose");
    let unsigned = vec![items[0].raw_bytes.clone()];

    let signed = orch
        .sign_external(&unsigned, SigningFlow::WalletConnect, CancellationToken::new())
        .await
        .expect("sign");

    assert_eq!(signed.len(), 1);
    assert!(signed[0].ends_with(&unsigned[0]));
    assert_eq!(orch.status(), RunStatus::Completed);
    assert!(gateway.submissions().is_empty());
}

#[tokio::test]
async fn external_rekeyed_transaction_carries_auth_address() {
    let alice = local_signer(1).address();
    let auth = local_signer(5);
    let (_, orch, _rx) = new_orchestrator(
        MockGateway::new(params(1000, 0)),
        StaticResolver::default()
            .with(auth.clone())
            .with_auth(alice, auth.address()),
    );
    let items = compose(&params(1000, 0), &payment(alice, local_signer(2).address(), "1"))
        .expect("compose");

    let signed = orch
        .sign_external(
            &[items[0].raw_bytes.clone()],
            SigningFlow::WalletConnect,
            CancellationToken::new(),
        )
        .await
        .expect("sign");

    assert_eq!(&signed[0][1..6], b"\xa4sgnr");
    assert_eq!(&signed[0][8..40], &auth.address().as_bytes()[..]);
}
