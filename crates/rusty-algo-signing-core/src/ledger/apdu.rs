//! Algorand Ledger app command set.

use crate::error::SignError;

pub const CLA: u8 = 0x80;
pub const INS_GET_PUBLIC_KEY: u8 = 0x03;
pub const INS_SIGN_MSGPACK: u8 = 0x08;

pub const P1_FIRST_WITH_ACCOUNT: u8 = 0x01;
pub const P1_MORE: u8 = 0x80;
pub const P2_MORE: u8 = 0x80;
pub const P2_LAST: u8 = 0x00;

pub const SW_OK: u16 = 0x9000;
pub const SW_USER_REJECTED: u16 = 0x6985;

pub const MAX_CHUNK: usize = 250;

fn build(ins: u8, p1: u8, p2: u8, data: &[u8]) -> Vec<u8> {
    let mut apdu = Vec::with_capacity(5 + data.len());
    apdu.extend_from_slice(&[CLA, ins, p1, p2, data.len() as u8]);
    apdu.extend_from_slice(data);
    apdu
}

pub fn get_public_key(account_index: u32) -> Vec<u8> {
    build(INS_GET_PUBLIC_KEY, 0x00, 0x00, &account_index.to_be_bytes())
}

/// Splits a msgpack transaction into signing commands. The first command
/// carries the account index ahead of the payload.
pub fn sign_msgpack(account_index: u32, payload: &[u8]) -> Vec<Vec<u8>> {
    let mut data = Vec::with_capacity(4 + payload.len());
    data.extend_from_slice(&account_index.to_be_bytes());
    data.extend_from_slice(payload);

    let chunks: Vec<&[u8]> = data.chunks(MAX_CHUNK).collect();
    let last = chunks.len().saturating_sub(1);
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let p1 = if i == 0 { P1_FIRST_WITH_ACCOUNT } else { P1_MORE };
            let p2 = if i == last { P2_LAST } else { P2_MORE };
            build(INS_SIGN_MSGPACK, p1, p2, chunk)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub status: u16,
}

impl ApduResponse {
    pub fn parse(raw: &[u8]) -> Result<Self, SignError> {
        if raw.len() < 2 {
            return Err(SignError::LedgerDeviceUnreachable(format!(
                "response of {} bytes has no status word",
                raw.len()
            )));
        }
        let (data, sw) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: data.to_vec(),
            status: u16::from_be_bytes([sw[0], sw[1]]),
        })
    }

    pub fn ensure_ok(self) -> Result<Vec<u8>, SignError> {
        match self.status {
            SW_OK => Ok(self.data),
            SW_USER_REJECTED => Err(SignError::LedgerRejected),
            other => Err(SignError::LedgerDeviceUnreachable(format!(
                "device returned status {other:#06x}"
            ))),
        }
    }
}
