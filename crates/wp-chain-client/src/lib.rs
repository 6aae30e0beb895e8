use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The fixed-shape transaction used for wallet test requests.
///
/// All quantity fields are `0x` hex strings, matching the JSON-RPC wire
/// encoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestTransaction {
    pub from: String,
    pub to: String,
    pub nonce: String,
    pub gas_price: String,
    pub gas: String,
    pub value: String,
    pub data: String,
}

/// Boundary to the chain RPC collaborator.
///
/// Balance reads go to the node directly; the transaction and signing calls
/// are routed to whatever holds the account keys (the linked wallet, or an
/// unlocked node standing in for one).
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Native balance of `address` in base units, as a decimal string.
    async fn get_balance(&self, address: &str) -> Result<String>;
    async fn get_transaction_count(&self, address: &str) -> Result<u64>;
    /// Current gas price as a `0x` quantity string.
    async fn get_gas_price(&self) -> Result<String>;
    /// Broadcast; returns the transaction hash.
    async fn send_transaction(&self, tx: &TestTransaction) -> Result<String>;
    /// Sign without broadcasting; returns the signed payload.
    async fn sign_transaction(&self, tx: &TestTransaction) -> Result<String>;
    /// EIP-191 personal sign; returns the hex signature.
    async fn personal_sign(&self, message: &str, address: &str) -> Result<String>;
}
