//! Node plumbing check: `params`, `submit <signed-file>`, `status <txid>`.

use std::sync::Arc;

use eyre::{bail, eyre, WrapErr};

use rusty_algo_signing_adapters::{logging, AlgodAdapter, SigningAdapterConfig};
use rusty_algo_signing_core::{ConfirmationMonitor, SubmissionGateway};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    logging::init();

    let config = SigningAdapterConfig::from_env();
    tracing::info!(algod = %config.algod_url, "Starting rusty-algo-signing");
    let algod = Arc::new(AlgodAdapter::with_config(&config)?);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["params"] => {
            let params = algod.fetch_params().await?;
            println!(
                "{} round {} min fee {} fee/byte {}",
                params.genesis_id, params.last_round, params.min_fee, params.fee_per_byte
            );
        }
        ["submit", path] => {
            let signed = std::fs::read(path).wrap_err_with(|| format!("reading {path}"))?;
            let txid = algod.submit(&signed).await?;
            println!("{txid}");
        }
        ["status", txid] => {
            let monitor =
                ConfirmationMonitor::new(algod, config.orchestrator_settings().confirmation);
            let round = monitor
                .wait_for(txid)
                .await
                .map_err(|e| eyre!("{txid}: {e}"))?;
            println!("{txid} confirmed in round {round}");
        }
        _ => bail!("usage: rusty-algo-signing params | submit <signed-file> | status <txid>"),
    }
    Ok(())
}
