//! Canonical msgpack wire forms: transaction ids, group ids, signed envelopes.

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use sha2::{Digest, Sha512_256};

use crate::domain::Address;
use crate::error::ComposeError;

const TX_TAG: &[u8] = b"TX";
const GROUP_TAG: &[u8] = b"TG";

pub const TYPE_PAYMENT: &str = "pay";
pub const TYPE_ASSET_TRANSFER: &str = "axfer";
pub const TYPE_KEY_REGISTRATION: &str = "keyreg";
pub const TYPE_APPLICATION_CALL: &str = "appl";

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// Transaction body. Fields are declared in key order so that named msgpack
/// output is canonical; zero values are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    #[serde(skip_serializing_if = "is_zero")]
    pub aamt: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aclose: Option<ByteBuf>,
    #[serde(skip_serializing_if = "is_zero")]
    pub amt: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apaa: Vec<ByteBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apas: Vec<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apat: Vec<ByteBuf>,
    #[serde(skip_serializing_if = "is_zero")]
    pub apid: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arcv: Option<ByteBuf>,
    #[serde(skip_serializing_if = "is_zero")]
    pub fee: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub fv: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gen: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gh: Option<ByteBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grp: Option<ByteBuf>,
    #[serde(skip_serializing_if = "is_zero")]
    pub lv: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<ByteBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rcv: Option<ByteBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rekey: Option<ByteBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selkey: Option<ByteBuf>,
    pub snd: ByteBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprfkey: Option<ByteBuf>,
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub votefst: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub votekd: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votekey: Option<ByteBuf>,
    #[serde(skip_serializing_if = "is_zero")]
    pub votelst: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub xaid: u64,
}

impl Transaction {
    pub fn sender(&self) -> Result<Address, ComposeError> {
        address_from_bytes(&self.snd)
    }

    pub fn receiver(&self) -> Result<Option<Address>, ComposeError> {
        self.rcv.as_deref().map(|b| address_from_bytes(b)).transpose()
    }

    pub fn asset_receiver(&self) -> Result<Option<Address>, ComposeError> {
        self.arcv.as_deref().map(|b| address_from_bytes(b)).transpose()
    }
}

pub fn address_bytes(address: &Address) -> ByteBuf {
    ByteBuf::from(address.as_bytes().to_vec())
}

pub fn address_from_bytes(bytes: &[u8]) -> Result<Address, ComposeError> {
    let key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ComposeError::SdkError(format!("address must be 32 bytes, got {}", bytes.len())))?;
    Ok(Address::new(key))
}

pub fn encode_transaction(txn: &Transaction) -> Result<Vec<u8>, ComposeError> {
    rmp_serde::to_vec_named(txn).map_err(|e| ComposeError::SdkError(e.to_string()))
}

pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction, ComposeError> {
    rmp_serde::from_slice(bytes).map_err(|e| ComposeError::SdkError(e.to_string()))
}

pub fn bytes_to_sign(raw_txn: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(TX_TAG.len() + raw_txn.len());
    out.extend_from_slice(TX_TAG);
    out.extend_from_slice(raw_txn);
    out
}

pub fn raw_transaction_id(raw_txn: &[u8]) -> [u8; 32] {
    Sha512_256::digest(bytes_to_sign(raw_txn)).into()
}

pub fn transaction_id(raw_txn: &[u8]) -> String {
    BASE32_NOPAD.encode(&raw_transaction_id(raw_txn))
}

/// Hash over `{"txlist": [txid, ...]}` binding the members of an atomic group.
pub fn group_id(raw_txids: &[[u8; 32]]) -> [u8; 32] {
    let mut body = Vec::with_capacity(16 + raw_txids.len() * 34);
    write_map_header(&mut body, 1);
    write_str(&mut body, "txlist");
    write_array_header(&mut body, raw_txids.len());
    for txid in raw_txids {
        write_bin(&mut body, txid);
    }

    let mut hasher = Sha512_256::new();
    hasher.update(GROUP_TAG);
    hasher.update(&body);
    hasher.finalize().into()
}

/// Wraps an encoded transaction in its signed envelope without re-encoding it.
pub fn encode_signed(raw_txn: &[u8], signature: &[u8; 64], auth: Option<&Address>) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw_txn.len() + 120);
    write_map_header(&mut out, if auth.is_some() { 3 } else { 2 });
    if let Some(signer) = auth {
        write_str(&mut out, "sgnr");
        write_bin(&mut out, signer.as_bytes());
    }
    write_str(&mut out, "sig");
    write_bin(&mut out, signature);
    write_str(&mut out, "txn");
    out.extend_from_slice(raw_txn);
    out
}

/// Length of the signed envelope for fee estimation; signature bytes do not
/// affect the size.
pub fn estimate_signed_size(raw_txn: &[u8], rekeyed: bool) -> usize {
    let placeholder = Address::ZERO;
    encode_signed(raw_txn, &[0u8; 64], rekeyed.then_some(&placeholder)).len()
}

/// ARC-4 method selector.
pub fn method_selector(signature: &str) -> [u8; 4] {
    let digest = Sha512_256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

pub fn abi_uint64(value: u64) -> ByteBuf {
    ByteBuf::from(value.to_be_bytes().to_vec())
}

fn write_map_header(out: &mut Vec<u8>, len: usize) {
    out.push(0x80 | (len as u8 & 0x0f));
}

fn write_array_header(out: &mut Vec<u8>, len: usize) {
    if len < 16 {
        out.push(0x90 | len as u8);
    } else {
        out.push(0xdc);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
}

fn write_str(out: &mut Vec<u8>, value: &str) {
    out.push(0xa0 | (value.len() as u8 & 0x1f));
    out.extend_from_slice(value.as_bytes());
}

fn write_bin(out: &mut Vec<u8>, value: &[u8]) {
    out.push(0xc4);
    out.push(value.len() as u8);
    out.extend_from_slice(value);
}
