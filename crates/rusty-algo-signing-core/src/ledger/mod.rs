pub mod apdu;
mod bridge;
pub mod framing;

pub use bridge::{LedgerBridge, LedgerDevice, LedgerSignRequest, LedgerTransport};
