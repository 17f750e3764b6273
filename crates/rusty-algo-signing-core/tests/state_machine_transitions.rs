use rusty_algo_signing_core::{
    ledger_transition, run_transition, LedgerAction, LedgerStatus, RunAction, RunStatus,
};

#[test]
fn run_happy_path_transitions() {
    let (s1, _) = run_transition(RunStatus::Idle, RunAction::Start).expect("idle -> fetching");
    assert_eq!(s1, RunStatus::FetchingParams);
    let (s2, _) = run_transition(s1, RunAction::ParamsFetched).expect("fetching -> composing");
    assert_eq!(s2, RunStatus::Composing);
    let (s3, _) = run_transition(s2, RunAction::Composed).expect("composing -> signing");
    assert_eq!(s3, RunStatus::Signing);
    let (s4, _) = run_transition(s3, RunAction::Reconcile).expect("signing -> reconciling");
    assert_eq!(s4, RunStatus::FeeReconciliation);
    let (s5, _) = run_transition(s4, RunAction::FeeAccepted).expect("reconciling -> signing");
    assert_eq!(s5, RunStatus::Signing);
    let (s6, _) = run_transition(s5, RunAction::AllSigned).expect("signing -> all signed");
    assert_eq!(s6, RunStatus::AllSigned);
    let (s7, _) = run_transition(s6, RunAction::Upload).expect("all signed -> uploading");
    assert_eq!(s7, RunStatus::Uploading);
    let (s8, _) = run_transition(s7, RunAction::AwaitConfirmation).expect("uploading -> confirming");
    assert_eq!(s8, RunStatus::Confirming);
    let (s9, t) = run_transition(s8, RunAction::Complete).expect("confirming -> completed");
    assert_eq!(s9, RunStatus::Completed);
    assert_eq!(t.from, RunStatus::Confirming);
    assert!(s9.is_terminal());
}

#[test]
fn fee_change_loops_back_to_composing() {
    let (s, _) = run_transition(RunStatus::FeeReconciliation, RunAction::Recompose)
        .expect("reconciling -> composing");
    assert_eq!(s, RunStatus::Composing);
}

#[test]
fn cancel_is_refused_once_upload_started() {
    let (s, _) = run_transition(RunStatus::Signing, RunAction::Cancel).expect("cancel signing");
    assert_eq!(s, RunStatus::Cancelled);

    let err = run_transition(RunStatus::Uploading, RunAction::Cancel).expect_err("must fail");
    assert!(err.to_string().contains("illegal run transition"));
}

#[test]
fn run_illegal_transition_is_rejected() {
    let err = run_transition(RunStatus::Idle, RunAction::Upload).expect_err("must fail");
    assert!(err.to_string().contains("illegal run transition"));
}

#[test]
fn terminal_states_reset_to_idle() {
    for status in [
        RunStatus::Completed,
        RunStatus::ComposeFailed,
        RunStatus::SignFailed,
        RunStatus::UploadFailed,
        RunStatus::TransactionRejected,
        RunStatus::Cancelled,
    ] {
        let (s, _) = run_transition(status, RunAction::Reset).expect("reset");
        assert_eq!(s, RunStatus::Idle);
    }
    assert!(run_transition(RunStatus::Signing, RunAction::Reset).is_err());
}

#[test]
fn ledger_timeout_path_returns_to_idle() {
    let (s1, _) = ledger_transition(LedgerStatus::Idle, LedgerAction::Scan).expect("scan");
    let (s2, _) = ledger_transition(s1, LedgerAction::Connect).expect("connect");
    let (s3, _) = ledger_transition(s2, LedgerAction::RequestSignature).expect("request");
    assert_eq!(s3, LedgerStatus::AwaitingSignature);
    let (s4, _) = ledger_transition(s3, LedgerAction::Timeout).expect("timeout");
    assert_eq!(s4, LedgerStatus::TimedOut);
    let (s5, _) = ledger_transition(s4, LedgerAction::Reset).expect("reset");
    assert_eq!(s5, LedgerStatus::Idle);
}

#[test]
fn ledger_cannot_scan_while_busy() {
    let err = ledger_transition(LedgerStatus::AwaitingSignature, LedgerAction::Scan)
        .expect_err("must fail");
    assert!(err.to_string().contains("illegal ledger transition"));
}
