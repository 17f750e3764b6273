#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;

use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use tiny_http::{Method, Response, Server, StatusCode};

use rusty_algo_signing_adapters::SigningAdapterConfig;

pub const GENESIS_HASH: [u8; 32] = [7u8; 32];
pub const INBOX_RECEIVER: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ";

/// Serves a fixed set of algod and inbox routes. Each call is recorded as
/// "METHOD path", plus "token:<value>" when the algod token header is sent.
pub fn spawn_mock_server(calls: Arc<Mutex<Vec<String>>>) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());

    let join = thread::spawn(move || {
        for _ in 0..16 {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            let method = req.method().clone();
            let path = req.url().to_owned();
            let token = req
                .headers()
                .iter()
                .find(|h| h.field.equiv("X-Algo-API-Token"))
                .map(|h| h.value.as_str().to_owned());
            let mut body = Vec::new();
            let _ = req.as_reader().read_to_end(&mut body);
            if let Ok(mut g) = calls.lock() {
                g.push(format!("{method} {path}"));
                if let Some(token) = token {
                    g.push(format!("token:{token}"));
                }
            }

            let (code, payload) = match (method, path.as_str()) {
                (Method::Get, "/v2/transactions/params") => (
                    200,
                    json!({
                        "consensus-version": "future",
                        "fee": 0,
                        "genesis-hash": general_purpose::STANDARD.encode(GENESIS_HASH),
                        "genesis-id": "testnet-v1.0",
                        "last-round": 4_200,
                        "min-fee": 1000
                    }),
                ),
                (Method::Post, "/v2/transactions") if body.is_empty() => {
                    (400, json!({"message": "empty transaction payload"}))
                }
                (Method::Post, "/v2/transactions") => (200, json!({"txId": "NODETXID"})),
                (Method::Get, "/v2/transactions/pending/CONFIRMED") => {
                    (200, json!({"confirmed-round": 4_201, "pool-error": ""}))
                }
                (Method::Get, "/v2/transactions/pending/QUEUED") => {
                    (200, json!({"pool-error": ""}))
                }
                (Method::Get, "/v2/transactions/pending/REJECTED") => {
                    (200, json!({"pool-error": "overspend"}))
                }
                (Method::Get, p) if p.starts_with("/v1/asset-inbox/send-summary/") => (
                    200,
                    json!({
                        "app_id": 643020148,
                        "inbox_address": null,
                        "minimum_balance_requirement": 228_100,
                        "inner_tx_count": 4,
                        "is_arc59_opted_in": true,
                        "algo_fund_amount": 0,
                        "warning_message": null
                    }),
                ),
                (Method::Get, p) if p == format!("/v1/asset-inbox/requests/{INBOX_RECEIVER}/") => (
                    200,
                    json!({
                        "results": [
                            {"asset_id": 31566704, "total_amount": 5_000_000, "senders": [INBOX_RECEIVER]}
                        ]
                    }),
                ),
                _ => (404, json!({"message": "not found"})),
            };

            let response =
                Response::from_string(payload.to_string()).with_status_code(StatusCode(code));
            let _ = req.respond(response);
        }
    });

    (addr, join)
}

pub fn config_for(base_url: &str) -> SigningAdapterConfig {
    SigningAdapterConfig {
        algod_url: base_url.to_owned(),
        algod_token: Some("test-token".to_owned()),
        arc59_api_url: base_url.to_owned(),
        request_timeout_ms: 5_000,
        ..SigningAdapterConfig::default()
    }
}
