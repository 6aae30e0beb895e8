use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use wp_api_types::{RequestKind, RequestPhase, RequestResult, RequestStatusResponse, SessionSnapshot};
use wp_chain_client::{ChainRpc, TestTransaction};
use wp_crypto::{decode_hex, hash_personal_message, quantity_to_hex, verify_signature};
use wp_session::SessionManager;

use crate::RequestError;

/// Gas limit of a plain value transfer.
pub const GAS_LIMIT_TRANSFER: u64 = 21_000;

/// Fixed payload for the personal-sign test request.
pub const TEST_MESSAGE: &str = "My email is john@doe.com - 1537836206101";

#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    Idle,
    Pending(RequestKind),
    Approved(RequestResult),
    Rejected(RequestKind),
}

/// Drives the one in-flight wallet request.
///
/// Reads session state through the shared manager but never mutates it;
/// session mutation stays with the event consumer.
pub struct RequestOrchestrator {
    rpc: Arc<dyn ChainRpc>,
    session: Arc<RwLock<SessionManager>>,
    state: RwLock<RequestState>,
}

impl RequestOrchestrator {
    pub fn new(rpc: Arc<dyn ChainRpc>, session: Arc<RwLock<SessionManager>>) -> Self {
        Self {
            rpc,
            session,
            state: RwLock::new(RequestState::Idle),
        }
    }

    pub async fn send_transaction(&self) -> Result<RequestResult, RequestError> {
        let snapshot = self.begin(RequestKind::SendTransaction).await?;
        let outcome = self.run_send(&snapshot).await;
        self.finish(RequestKind::SendTransaction, snapshot.epoch, outcome)
            .await
    }

    pub async fn sign_transaction(&self) -> Result<RequestResult, RequestError> {
        let snapshot = self.begin(RequestKind::SignTransaction).await?;
        let outcome = self.run_sign(&snapshot).await;
        self.finish(RequestKind::SignTransaction, snapshot.epoch, outcome)
            .await
    }

    pub async fn sign_personal_message(&self) -> Result<RequestResult, RequestError> {
        let snapshot = self.begin(RequestKind::PersonalSign).await?;
        let outcome = self.run_personal_sign(&snapshot).await;
        self.finish(RequestKind::PersonalSign, snapshot.epoch, outcome)
            .await
    }

    /// Current state and result, for whatever is displaying them.
    pub async fn status(&self) -> RequestStatusResponse {
        match &*self.state.read().await {
            RequestState::Idle => RequestStatusResponse {
                state: RequestPhase::Idle,
                method: None,
                result: None,
            },
            RequestState::Pending(kind) => RequestStatusResponse {
                state: RequestPhase::Pending,
                method: Some(kind.method().to_owned()),
                result: None,
            },
            RequestState::Approved(result) => RequestStatusResponse {
                state: RequestPhase::Approved,
                method: Some(result.kind().method().to_owned()),
                result: Some(result.clone()),
            },
            RequestState::Rejected(kind) => RequestStatusResponse {
                state: RequestPhase::Rejected,
                method: Some(kind.method().to_owned()),
                result: None,
            },
        }
    }

    pub async fn state(&self) -> RequestState {
        self.state.read().await.clone()
    }

    /// Dismiss a terminal result, returning to `Idle`. A pending request
    /// cannot be dismissed; it resolves or the session ends.
    pub async fn dismiss(&self) -> Result<(), RequestError> {
        let mut state = self.state.write().await;
        match *state {
            RequestState::Pending(_) => Err(RequestError::Busy),
            _ => {
                *state = RequestState::Idle;
                Ok(())
            }
        }
    }

    /// Session ended: a request still awaiting the wallet can never
    /// resolve, so it is forced to `Rejected`.
    pub async fn handle_disconnect(&self) {
        let mut state = self.state.write().await;
        if let RequestState::Pending(kind) = *state {
            warn!(
                method = kind.method(),
                "forcing pending request to rejected after disconnect"
            );
            *state = RequestState::Rejected(kind);
        }
    }

    async fn begin(&self, kind: RequestKind) -> Result<SessionSnapshot, RequestError> {
        let snapshot = self.session.read().await.snapshot();
        if !snapshot.connected || snapshot.address.is_empty() {
            return Err(RequestError::NoSession);
        }

        let mut state = self.state.write().await;
        if !matches!(*state, RequestState::Idle) {
            return Err(RequestError::Busy);
        }
        *state = RequestState::Pending(kind);
        info!(method = kind.method(), "wallet request opened");
        Ok(snapshot)
    }

    async fn finish(
        &self,
        kind: RequestKind,
        started_epoch: u64,
        outcome: anyhow::Result<RequestResult>,
    ) -> Result<RequestResult, RequestError> {
        let current_epoch = self.session.read().await.snapshot().epoch;
        let mut state = self.state.write().await;

        match outcome {
            Ok(result) => {
                if current_epoch != started_epoch {
                    // The session disconnected while the wallet was
                    // deciding; the forced rejection stands.
                    *state = RequestState::Rejected(kind);
                    return Err(RequestError::Rejected(
                        "session disconnected before completion".to_owned(),
                    ));
                }
                info!(method = kind.method(), "wallet request approved");
                *state = RequestState::Approved(result.clone());
                Ok(result)
            }
            Err(err) => {
                warn!(method = kind.method(), "wallet request failed: {err:#}");
                *state = RequestState::Rejected(kind);
                Err(RequestError::Rejected(err.to_string()))
            }
        }
    }

    async fn run_send(&self, snapshot: &SessionSnapshot) -> anyhow::Result<RequestResult> {
        let tx = self.build_test_transaction(&snapshot.address).await?;
        let tx_hash = self.rpc.send_transaction(&tx).await?;
        Ok(RequestResult::SendTransaction {
            tx_hash,
            from: snapshot.address.clone(),
            to: snapshot.address.clone(),
            value: "0 ETH".to_owned(),
        })
    }

    async fn run_sign(&self, snapshot: &SessionSnapshot) -> anyhow::Result<RequestResult> {
        let tx = self.build_test_transaction(&snapshot.address).await?;
        let signed_transaction = self.rpc.sign_transaction(&tx).await?;
        Ok(RequestResult::SignTransaction { signed_transaction })
    }

    async fn run_personal_sign(&self, snapshot: &SessionSnapshot) -> anyhow::Result<RequestResult> {
        let signature = self.rpc.personal_sign(TEST_MESSAGE, &snapshot.address).await?;

        let hash = hash_personal_message(TEST_MESSAGE);
        let valid = match decode_hex(&signature) {
            Ok(bytes) => verify_signature(&snapshot.address, &bytes, &hash, snapshot.chain_id),
            Err(err) => {
                warn!("wallet returned an undecodable signature: {err}");
                false
            }
        };

        Ok(RequestResult::PersonalSign {
            address: snapshot.address.clone(),
            valid,
            signature,
        })
    }

    /// Zero-value self-transfer: nonce and gas price from the node, the
    /// rest constant.
    async fn build_test_transaction(&self, address: &str) -> anyhow::Result<TestTransaction> {
        let nonce = self.rpc.get_transaction_count(address).await?;
        let gas_price = self.rpc.get_gas_price().await?;

        Ok(TestTransaction {
            from: address.to_owned(),
            to: address.to_owned(),
            nonce: quantity_to_hex(i128::from(nonce))?,
            gas_price,
            gas: quantity_to_hex(i128::from(GAS_LIMIT_TRANSFER))?,
            value: quantity_to_hex(0)?,
            data: "0x".to_owned(),
        })
    }
}
