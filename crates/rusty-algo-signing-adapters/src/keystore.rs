use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use rusty_algo_signing_core::{
    Address, LedgerBridge, LedgerSigner, LocalSigner, PortError, Signable, SignerResolver,
};

/// In-memory signer registry keyed by address, with the rekey map the
/// orchestrator consults for externally supplied transactions.
#[derive(Clone, Default)]
pub struct KeyStoreAdapter {
    inner: Arc<Mutex<KeyStoreState>>,
}

#[derive(Default)]
struct KeyStoreState {
    signers: HashMap<Address, Arc<dyn Signable>>,
    auth: HashMap<Address, Address>,
}

impl KeyStoreAdapter {
    fn with_state<T>(&self, f: impl FnOnce(&mut KeyStoreState) -> T) -> Result<T, PortError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("keystore lock poisoned: {e}")))?;
        Ok(f(&mut g))
    }

    pub fn register(&self, signer: Arc<dyn Signable>) -> Result<Address, PortError> {
        let address = signer.address();
        let hardware = signer.is_hardware();
        self.with_state(|s| s.signers.insert(address, signer))?;
        info!(%address, hardware, "signer registered");
        Ok(address)
    }

    pub fn register_local(&self, seed: &[u8; 32]) -> Result<Address, PortError> {
        self.register(Arc::new(LocalSigner::from_seed(seed)))
    }

    pub fn register_ledger(
        &self,
        bridge: Arc<LedgerBridge>,
        account_index: u32,
        address: Address,
    ) -> Result<Address, PortError> {
        self.register(Arc::new(LedgerSigner::new(bridge, account_index, address)))
    }

    /// Records that `account` is now controlled by `auth`. Passing the
    /// account itself clears the entry.
    pub fn set_auth_address(&self, account: Address, auth: Address) -> Result<(), PortError> {
        self.with_state(|s| {
            if account == auth {
                s.auth.remove(&account);
            } else {
                s.auth.insert(account, auth);
            }
        })
    }

    pub fn remove(&self, address: &Address) -> Result<bool, PortError> {
        self.with_state(|s| {
            s.auth.remove(address);
            s.signers.remove(address).is_some()
        })
    }
}

impl SignerResolver for KeyStoreAdapter {
    fn signer_for(&self, address: &Address) -> Option<Arc<dyn Signable>> {
        let g = self.inner.lock().ok()?;
        g.signers.get(address).cloned()
    }

    fn auth_address_of(&self, address: &Address) -> Option<Address> {
        let g = self.inner.lock().ok()?;
        g.auth.get(address).copied()
    }
}
