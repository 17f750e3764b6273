use std::time::Duration;

use rusty_algo_signing_core::{ConfirmationSettings, OrchestratorSettings};

#[derive(Debug, Clone)]
pub struct SigningAdapterConfig {
    pub algod_url: String,
    pub algod_token: Option<String>,
    pub arc59_api_url: String,
    pub request_timeout_ms: u64,
    pub standard_watchdog_secs: u64,
    pub wallet_connect_watchdog_secs: u64,
    pub inbox_watchdog_secs: u64,
    pub max_fee_rounds: usize,
    pub confirmation_poll_interval_ms: u64,
    pub confirmation_max_attempts: u32,
    pub signing_request_ttl_ms: u64,
}

impl Default for SigningAdapterConfig {
    fn default() -> Self {
        Self {
            algod_url: "https://mainnet-api.algonode.cloud".to_owned(),
            algod_token: None,
            arc59_api_url: "https://mainnet.api.perawallet.app".to_owned(),
            request_timeout_ms: 15_000,
            standard_watchdog_secs: 20,
            wallet_connect_watchdog_secs: 50,
            inbox_watchdog_secs: 50,
            max_fee_rounds: 2,
            confirmation_poll_interval_ms: 1_000,
            confirmation_max_attempts: 10,
            signing_request_ttl_ms: 5 * 60 * 1000,
        }
    }
}

impl SigningAdapterConfig {
    /// Defaults overridden by any `ALGO_SIGNING_*`, `ALGOD_*` or `ARC59_*`
    /// variables present. Unparseable numbers keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(url) = lookup("ALGOD_URL").filter(|v| !v.trim().is_empty()) {
            cfg.algod_url = url.trim().trim_end_matches('/').to_owned();
        }
        if let Some(token) = lookup("ALGOD_TOKEN").filter(|v| !v.is_empty()) {
            cfg.algod_token = Some(token);
        }
        if let Some(url) = lookup("ARC59_API_URL").filter(|v| !v.trim().is_empty()) {
            cfg.arc59_api_url = url.trim().trim_end_matches('/').to_owned();
        }
        if let Some(v) = number("ALGO_SIGNING_REQUEST_TIMEOUT_MS") {
            cfg.request_timeout_ms = v;
        }
        if let Some(v) = number("ALGO_SIGNING_WATCHDOG_SECS") {
            cfg.standard_watchdog_secs = v;
        }
        if let Some(v) = number("ALGO_SIGNING_WC_WATCHDOG_SECS") {
            cfg.wallet_connect_watchdog_secs = v;
        }
        if let Some(v) = number("ALGO_SIGNING_INBOX_WATCHDOG_SECS") {
            cfg.inbox_watchdog_secs = v;
        }
        if let Some(v) = number("ALGO_SIGNING_CONFIRM_POLL_MS") {
            cfg.confirmation_poll_interval_ms = v;
        }
        if let Some(v) = number("ALGO_SIGNING_CONFIRM_ATTEMPTS").and_then(|v| u32::try_from(v).ok()) {
            cfg.confirmation_max_attempts = v;
        }
        if let Some(v) = number("ALGO_SIGNING_REQUEST_TTL_MS") {
            cfg.signing_request_ttl_ms = v;
        }
        cfg
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn signing_request_ttl(&self) -> Duration {
        Duration::from_millis(self.signing_request_ttl_ms)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            standard_watchdog: Duration::from_secs(self.standard_watchdog_secs),
            wallet_connect_watchdog: Duration::from_secs(self.wallet_connect_watchdog_secs),
            inbox_watchdog: Duration::from_secs(self.inbox_watchdog_secs),
            max_fee_rounds: self.max_fee_rounds,
            confirmation: ConfirmationSettings {
                poll_interval: Duration::from_millis(self.confirmation_poll_interval_ms),
                max_attempts: self.confirmation_max_attempts,
            },
        }
    }
}
