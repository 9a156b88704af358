// src/services/dispatcher.rs
//! Transaction dispatch on behalf of wallet identities.
//!
//! Access to the ledger is gated on the wallet: a label must resolve to a
//! stored identity before any gateway call is made.

use crate::blockchain::gateway::{LedgerGateway, Transaction};
use crate::error::{WalletError, WalletResult};
use crate::wallet::CredentialStore;
use bytes::Bytes;
use std::sync::Arc;

/// Submits and evaluates chaincode functions through a [`LedgerGateway`].
#[derive(Clone)]
pub struct TransactionDispatcher {
    gateway: Arc<dyn LedgerGateway>,
}

impl TransactionDispatcher {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self { gateway }
    }

    /// Submits `transaction` as `label`.
    ///
    /// # Errors
    /// - `NotFound` if `label` is not in the wallet (register the user first)
    /// - `Transaction` if the gateway or chaincode rejects the call
    pub async fn submit(
        &self,
        store: &dyn CredentialStore,
        label: &str,
        transaction: &Transaction,
    ) -> WalletResult<Bytes> {
        let identity = store.get(label).await?;
        let result = self
            .gateway
            .submit(label, &identity, transaction)
            .await
            .map_err(WalletError::Transaction)?;
        log::info!(
            "Transaction {}.{} has been submitted by \"{}\" on {}",
            transaction.contract,
            transaction.function,
            label,
            transaction.channel
        );
        Ok(result)
    }

    /// Evaluates `transaction` as `label` without committing it.
    pub async fn evaluate(
        &self,
        store: &dyn CredentialStore,
        label: &str,
        transaction: &Transaction,
    ) -> WalletResult<Bytes> {
        let identity = store.get(label).await?;
        self.gateway
            .evaluate(label, &identity, transaction)
            .await
            .map_err(WalletError::Transaction)
    }
}
