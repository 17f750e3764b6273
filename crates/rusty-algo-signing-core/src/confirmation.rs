use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::PendingTransaction;
use crate::error::{NetworkError, TransactionError};
use crate::events::{EventSink, TransactionEvent};
use crate::ports::SubmissionGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationSettings {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_attempts: 10,
        }
    }
}

pub struct ConfirmationMonitor<G> {
    gateway: Arc<G>,
    settings: ConfirmationSettings,
}

impl<G: SubmissionGateway> ConfirmationMonitor<G> {
    pub fn new(gateway: Arc<G>, settings: ConfirmationSettings) -> Self {
        Self { gateway, settings }
    }

    /// Polls until `txid` lands in a round. A pool error or a transaction
    /// the node no longer knows about counts as rejection.
    pub async fn wait_for(&self, txid: &str) -> Result<u64, NetworkError> {
        for attempt in 1..=self.settings.max_attempts {
            match self.gateway.pending_status(txid).await {
                Ok(PendingTransaction {
                    confirmed_round: Some(round),
                    ..
                }) if round > 0 => {
                    info!(txid, round, "transaction confirmed");
                    return Ok(round);
                }
                Ok(PendingTransaction {
                    pool_error: Some(reason),
                    ..
                }) if !reason.is_empty() => {
                    return Err(NetworkError::TransactionRejectedByNode {
                        id: txid.to_owned(),
                        reason,
                    });
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    return Err(NetworkError::TransactionRejectedByNode {
                        id: txid.to_owned(),
                        reason: "transaction dropped from pool".to_owned(),
                    });
                }
                Err(source) => {
                    return Err(NetworkError::StatusFetchFailed {
                        id: txid.to_owned(),
                        source,
                    });
                }
            }
            debug!(txid, attempt, "awaiting confirmation");
            tokio::time::sleep(self.settings.poll_interval).await;
        }
        Err(NetworkError::ConfirmationTimeout(txid.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupJob {
    pub batch: usize,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub batch: usize,
    pub txid: String,
    pub confirmed_round: u64,
}

/// Uploads batches in order on a worker task; each batch must confirm before
/// the next is sent. The first failure aborts every batch not yet started.
pub async fn submit_dependent<G>(
    gateway: Arc<G>,
    settings: ConfirmationSettings,
    jobs: Vec<GroupJob>,
    events: EventSink,
) -> Result<Vec<BatchReport>, TransactionError>
where
    G: SubmissionGateway + 'static,
{
    let worker = tokio::spawn(async move {
        let monitor = ConfirmationMonitor::new(Arc::clone(&gateway), settings);
        let total = jobs.len();
        let mut reports = Vec::with_capacity(total);

        for (done, job) in jobs.into_iter().enumerate() {
            let result = async {
                let txid = gateway
                    .submit(&job.payload)
                    .await
                    .map_err(NetworkError::UploadFailed)?;
                events.emit(TransactionEvent::Submitted {
                    batch: job.batch,
                    txid: txid.clone(),
                });
                let round = monitor.wait_for(&txid).await?;
                events.emit(TransactionEvent::Confirmed {
                    txid: txid.clone(),
                    round,
                });
                Ok::<_, NetworkError>(BatchReport {
                    batch: job.batch,
                    txid,
                    confirmed_round: round,
                })
            }
            .await;

            match result {
                Ok(report) => reports.push(report),
                Err(err) => {
                    let skipped = total - done - 1;
                    warn!(batch = job.batch, skipped, error = %err, "group submission aborted");
                    events.emit(TransactionEvent::GroupAborted {
                        failed_batch: job.batch,
                        skipped,
                    });
                    return Err(TransactionError::Network(err));
                }
            }
        }
        Ok(reports)
    });

    worker
        .await
        .map_err(|e| TransactionError::Worker(e.to_string()))?
}
