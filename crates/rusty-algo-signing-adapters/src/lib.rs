pub mod algod;
pub mod arc59_api;
pub mod config;
pub mod keystore;
pub mod logging;
pub mod wc;

pub use algod::AlgodAdapter;
pub use arc59_api::Arc59ApiAdapter;
pub use config::SigningAdapterConfig;
pub use keystore::KeyStoreAdapter;
pub use wc::{
    InboundOutcome, WalletConnectAdapter, WalletConnectRouter, WcResponse, WcRouterError,
    WcSignRequest,
};
