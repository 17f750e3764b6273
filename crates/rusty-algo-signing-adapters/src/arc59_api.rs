use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use rusty_algo_signing_core::{
    Address, Arc59InboxPort, Arc59InboxRequest, Arc59SendSummary, MicroAlgos, PortError,
    TransportError,
};

use crate::SigningAdapterConfig;

#[derive(Debug, Deserialize)]
struct SendSummaryResponse {
    app_id: u64,
    #[serde(default)]
    inbox_address: Option<String>,
    minimum_balance_requirement: u64,
    inner_tx_count: u64,
    is_arc59_opted_in: bool,
    #[serde(default)]
    algo_fund_amount: u64,
    #[serde(default)]
    protocol_fee: u64,
}

#[derive(Debug, Deserialize)]
struct RequestsResponse {
    results: Vec<InboxRequestResponse>,
}

#[derive(Debug, Deserialize)]
struct InboxRequestResponse {
    asset_id: u64,
    total_amount: u64,
    #[serde(default)]
    senders: Vec<String>,
}

/// Wallet backend client for the asset inbox.
#[derive(Debug, Clone)]
pub struct Arc59ApiAdapter {
    base_url: String,
    client: Client,
}

impl Arc59ApiAdapter {
    pub fn with_config(config: &SigningAdapterConfig) -> Result<Self, PortError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PortError::Transport(format!("inbox client init: {e}")))?;
        Ok(Self {
            base_url: config.arc59_api_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|e| TransportError::Connectivity(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Arc59InboxPort for Arc59ApiAdapter {
    async fn fetch_send_summary(
        &self,
        receiver: &Address,
        asset_id: u64,
    ) -> Result<Arc59SendSummary, TransportError> {
        let summary: SendSummaryResponse = self
            .get(&format!("/v1/asset-inbox/send-summary/{receiver}/{asset_id}/"))
            .await?;
        debug!(%receiver, asset_id, opted_in = summary.is_arc59_opted_in, "inbox send summary");

        Ok(Arc59SendSummary {
            app_id: summary.app_id,
            // No inbox yet: the router creates one on first send.
            inbox_address: summary
                .inbox_address
                .filter(|x| !x.is_empty())
                .unwrap_or_else(|| Address::ZERO.to_string()),
            minimum_balance_requirement: MicroAlgos(summary.minimum_balance_requirement),
            inner_transaction_count: summary.inner_tx_count,
            is_arc59_opted_in: summary.is_arc59_opted_in,
            receiver_algo_needed_for_claim: MicroAlgos(summary.algo_fund_amount),
            protocol_fee: MicroAlgos(summary.protocol_fee),
        })
    }

    async fn fetch_requests(
        &self,
        address: &Address,
    ) -> Result<Vec<Arc59InboxRequest>, TransportError> {
        let page: RequestsResponse = match self
            .get(&format!("/v1/asset-inbox/requests/{address}/"))
            .await
        {
            Ok(page) => page,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        page.results
            .into_iter()
            .map(|r| {
                let senders = r
                    .senders
                    .iter()
                    .map(|s| {
                        s.parse::<Address>()
                            .map_err(|e| TransportError::Decode(format!("inbox sender: {e}")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arc59InboxRequest {
                    asset_id: r.asset_id,
                    amount: r.total_amount,
                    senders,
                })
            })
            .collect()
    }
}
