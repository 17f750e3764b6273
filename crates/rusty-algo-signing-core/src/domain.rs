use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use rust_decimal::Decimal;
use sha2::{Digest, Sha512_256};

use crate::error::ComposeError;

pub const ALGO_DECIMALS: u32 = 6;
pub const MAX_NOTE_BYTES: usize = 1024;
pub const MAX_GROUP_SIZE: usize = 16;

const ADDRESS_TEXT_LEN: usize = 58;
const CHECKSUM_LEN: usize = 4;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    pub const ZERO: Address = Address([0u8; 32]);

    pub const fn new(public_key: [u8; 32]) -> Self {
        Self(public_key)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Escrow account controlled by an application.
    pub fn for_application(app_id: u64) -> Self {
        let mut hasher = Sha512_256::new();
        hasher.update(b"appID");
        hasher.update(app_id.to_be_bytes());
        Self(hasher.finalize().into())
    }

    fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        let digest = Sha512_256::digest(self.0);
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(&digest[32 - CHECKSUM_LEN..]);
        out
    }
}

impl FromStr for Address {
    type Err = ComposeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.len() != ADDRESS_TEXT_LEN {
            return Err(ComposeError::InvalidAddress(raw.to_owned()));
        }
        let decoded = BASE32_NOPAD
            .decode(trimmed.as_bytes())
            .map_err(|_| ComposeError::InvalidAddress(raw.to_owned()))?;
        if decoded.len() != 32 + CHECKSUM_LEN {
            return Err(ComposeError::InvalidAddress(raw.to_owned()));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&decoded[..32]);
        let address = Address(key);
        if address.checksum()[..] != decoded[32..] {
            return Err(ComposeError::InvalidAddress(raw.to_owned()));
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = Vec::with_capacity(32 + CHECKSUM_LEN);
        bytes.extend_from_slice(&self.0);
        bytes.extend_from_slice(&self.checksum());
        f.write_str(&BASE32_NOPAD.encode(&bytes))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MicroAlgos(pub u64);

impl MicroAlgos {
    pub const ZERO: MicroAlgos = MicroAlgos(0);

    pub fn checked_add(self, other: MicroAlgos) -> Option<MicroAlgos> {
        self.0.checked_add(other.0).map(MicroAlgos)
    }

    pub fn saturating_sub(self, other: MicroAlgos) -> MicroAlgos {
        MicroAlgos(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for MicroAlgos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} microalgos", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub id: u64,
    pub decimals: u32,
    pub creator: Address,
    pub unit_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub auth_address: Option<Address>,
    pub balance: MicroAlgos,
    pub min_balance: MicroAlgos,
}

impl Account {
    pub fn new(address: Address, balance: MicroAlgos, min_balance: MicroAlgos) -> Self {
        Self {
            address,
            auth_address: None,
            balance,
            min_balance,
        }
    }

    pub fn rekeyed_to(mut self, auth_address: Address) -> Self {
        self.auth_address = Some(auth_address);
        self
    }

    /// The key that must authorize transactions sent from this account.
    pub fn signer_address(&self) -> Address {
        self.auth_address.unwrap_or(self.address)
    }

    pub fn spendable(&self) -> MicroAlgos {
        self.balance.saturating_sub(self.min_balance)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub address: String,
}

/// Where a transfer goes. A draft holds exactly one of the two forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Address(String),
    Contact(Contact),
}

impl Recipient {
    pub fn resolve(&self) -> Result<Address, ComposeError> {
        match self {
            Recipient::Address(raw) => raw.parse(),
            Recipient::Contact(contact) => contact.address.parse(),
        }
    }
}

impl From<Address> for Recipient {
    fn from(address: Address) -> Self {
        Recipient::Address(address.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftNote {
    pub note: Option<String>,
    pub locked_note: Option<String>,
}

impl DraftNote {
    pub fn text(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            locked_note: None,
        }
    }

    pub fn locked(note: impl Into<String>) -> Self {
        Self {
            note: None,
            locked_note: Some(note.into()),
        }
    }

    pub fn encoded(&self) -> Result<Option<Vec<u8>>, ComposeError> {
        let chosen = self
            .locked_note
            .as_deref()
            .or(self.note.as_deref())
            .filter(|x| !x.is_empty());
        match chosen {
            None => Ok(None),
            Some(text) if text.len() > MAX_NOTE_BYTES => Err(ComposeError::InvalidDraft(format!(
                "note exceeds {MAX_NOTE_BYTES} bytes"
            ))),
            Some(text) => Ok(Some(text.as_bytes().to_vec())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDraft {
    pub from: Account,
    pub to: Recipient,
    pub amount: Decimal,
    pub is_max_transaction: bool,
    pub note: DraftNote,
    pub fee: Option<MicroAlgos>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTransferDraft {
    pub from: Account,
    pub to: Recipient,
    pub asset: AssetInfo,
    pub amount: Decimal,
    pub close_to: Option<String>,
    pub note: DraftNote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetOptInDraft {
    pub account: Account,
    pub asset_id: u64,
    pub note: DraftNote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetOptOutDraft {
    pub account: Account,
    pub asset: AssetInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RekeyDraft {
    pub account: Account,
    pub rekey_to: String,
    pub note: DraftNote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineKeys {
    pub vote_key: [u8; 32],
    pub selection_key: [u8; 32],
    pub state_proof_key: [u8; 64],
    pub vote_first: u64,
    pub vote_last: u64,
    pub key_dilution: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRegistration {
    Online(OnlineKeys),
    Offline,
}

impl KeyRegistration {
    /// Online when every participation field is present, offline when none is.
    pub fn from_parts(
        vote_key: Option<[u8; 32]>,
        selection_key: Option<[u8; 32]>,
        state_proof_key: Option<[u8; 64]>,
        vote_first: Option<u64>,
        vote_last: Option<u64>,
        key_dilution: Option<u64>,
    ) -> Result<Self, ComposeError> {
        match (
            vote_key,
            selection_key,
            state_proof_key,
            vote_first,
            vote_last,
            key_dilution,
        ) {
            (Some(vote_key), Some(selection_key), Some(state_proof_key), Some(vf), Some(vl), Some(kd)) => {
                if vl <= vf {
                    return Err(ComposeError::InvalidDraft(
                        "vote last round must be after vote first round".to_owned(),
                    ));
                }
                Ok(KeyRegistration::Online(OnlineKeys {
                    vote_key,
                    selection_key,
                    state_proof_key,
                    vote_first: vf,
                    vote_last: vl,
                    key_dilution: kd,
                }))
            }
            (None, None, None, None, None, None) => Ok(KeyRegistration::Offline),
            _ => Err(ComposeError::InvalidDraft(
                "key registration must set all participation fields or none".to_owned(),
            )),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, KeyRegistration::Online(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRegistrationDraft {
    pub account: Account,
    pub registration: KeyRegistration,
    pub fee: Option<MicroAlgos>,
    pub note: DraftNote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptInAndSendDraft {
    pub sender: Account,
    pub receiver: Account,
    pub asset: AssetInfo,
    pub amount: Decimal,
    pub note: DraftNote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arc59SendSummary {
    pub app_id: u64,
    pub inbox_address: String,
    pub minimum_balance_requirement: MicroAlgos,
    pub inner_transaction_count: u64,
    pub is_arc59_opted_in: bool,
    pub receiver_algo_needed_for_claim: MicroAlgos,
    pub protocol_fee: MicroAlgos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arc59SendDraft {
    pub sender: Account,
    pub receiver: Recipient,
    pub asset: AssetInfo,
    pub amount: Decimal,
    pub summary: Arc59SendSummary,
    pub note: DraftNote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arc59ClaimDraft {
    pub receiver: Account,
    pub app_id: u64,
    pub inbox_address: String,
    pub asset: AssetInfo,
    pub is_opted_in: bool,
    pub claim_algo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arc59RejectDraft {
    pub receiver: Account,
    pub app_id: u64,
    pub inbox_address: String,
    pub asset: AssetInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionDraft {
    Payment(PaymentDraft),
    AssetTransfer(AssetTransferDraft),
    OptIn(AssetOptInDraft),
    OptOut(AssetOptOutDraft),
    Rekey(RekeyDraft),
    KeyRegistration(KeyRegistrationDraft),
    OptInAndSend(OptInAndSendDraft),
    Arc59Send(Arc59SendDraft),
    Arc59Claim(Arc59ClaimDraft),
    Arc59Reject(Arc59RejectDraft),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKind {
    Payment,
    AssetTransfer,
    OptIn,
    OptOut,
    Rekey,
    KeyRegistration,
    OptInAndSend,
    Arc59Send,
    Arc59Claim,
    Arc59Reject,
}

impl TransactionDraft {
    pub fn kind(&self) -> DraftKind {
        match self {
            TransactionDraft::Payment(_) => DraftKind::Payment,
            TransactionDraft::AssetTransfer(_) => DraftKind::AssetTransfer,
            TransactionDraft::OptIn(_) => DraftKind::OptIn,
            TransactionDraft::OptOut(_) => DraftKind::OptOut,
            TransactionDraft::Rekey(_) => DraftKind::Rekey,
            TransactionDraft::KeyRegistration(_) => DraftKind::KeyRegistration,
            TransactionDraft::OptInAndSend(_) => DraftKind::OptInAndSend,
            TransactionDraft::Arc59Send(_) => DraftKind::Arc59Send,
            TransactionDraft::Arc59Claim(_) => DraftKind::Arc59Claim,
            TransactionDraft::Arc59Reject(_) => DraftKind::Arc59Reject,
        }
    }

    pub fn sender(&self) -> &Account {
        match self {
            TransactionDraft::Payment(d) => &d.from,
            TransactionDraft::AssetTransfer(d) => &d.from,
            TransactionDraft::OptIn(d) => &d.account,
            TransactionDraft::OptOut(d) => &d.account,
            TransactionDraft::Rekey(d) => &d.account,
            TransactionDraft::KeyRegistration(d) => &d.account,
            TransactionDraft::OptInAndSend(d) => &d.sender,
            TransactionDraft::Arc59Send(d) => &d.sender,
            TransactionDraft::Arc59Claim(d) => &d.receiver,
            TransactionDraft::Arc59Reject(d) => &d.receiver,
        }
    }

    /// Only plain payments re-derive their fee from the signed size.
    pub fn reconciles_fee(&self) -> bool {
        matches!(self, TransactionDraft::Payment(_))
    }

    pub fn set_fee_override(&mut self, fee: MicroAlgos) {
        if let TransactionDraft::Payment(d) = self {
            d.fee = Some(fee);
        }
    }

    pub fn signing_flow(&self) -> SigningFlow {
        match self {
            TransactionDraft::Arc59Send(_)
            | TransactionDraft::Arc59Claim(_)
            | TransactionDraft::Arc59Reject(_) => SigningFlow::Inbox,
            _ => SigningFlow::Standard,
        }
    }

    /// Group sends wait for network acceptance of every batch.
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, TransactionDraft::Arc59Send(_))
    }
}

/// Which watchdog budget applies while a hardware device is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningFlow {
    Standard,
    WalletConnect,
    Inbox,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub last_round: u64,
    pub fee_per_byte: u64,
    pub min_fee: MicroAlgos,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransactionItem {
    pub sender: Address,
    pub signer: Address,
    pub raw_bytes: Vec<u8>,
    pub group_index: usize,
    pub txid: String,
    pub fee: MicroAlgos,
}

impl UnsignedTransactionItem {
    pub fn is_rekeyed(&self) -> bool {
        self.sender != self.signer
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub index: usize,
    pub sender: Address,
    pub signer: Address,
    pub unsigned_bytes: Vec<u8>,
    pub signed_bytes: Option<Vec<u8>>,
}

impl TransactionRecord {
    pub fn from_item(index: usize, item: &UnsignedTransactionItem) -> Self {
        Self {
            index,
            sender: item.sender,
            signer: item.signer,
            unsigned_bytes: item.raw_bytes.clone(),
            signed_bytes: None,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signed_bytes.is_some()
    }

    pub fn attach_signature(&mut self, signed: Vec<u8>) -> Result<(), crate::error::SignError> {
        if self.signed_bytes.is_some() {
            return Err(crate::error::SignError::AlreadySigned(self.index));
        }
        self.signed_bytes = Some(signed);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningOutcome {
    Success(Vec<u8>),
    Failure(crate::error::SignError),
    LedgerApprovalRequested(String),
    LedgerRejected,
    LedgerTimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub confirmed_round: Option<u64>,
    pub pool_error: Option<String>,
}
