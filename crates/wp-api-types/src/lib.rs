use serde::{Deserialize, Serialize};

/// Chain id assumed before the wallet reports one.
pub const MAINNET_CHAIN_ID: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainId(pub u64);

impl Default for ChainId {
    fn default() -> Self {
        Self(MAINNET_CHAIN_ID)
    }
}

/// One balance line item. `contract_address` is empty for the native asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub contract_address: String,
    pub balance: String,
}

/// The three wallet test requests the probe can issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    SendTransaction,
    SignTransaction,
    PersonalSign,
}

impl RequestKind {
    pub fn method(&self) -> &'static str {
        match self {
            Self::SendTransaction => "eth_sendTransaction",
            Self::SignTransaction => "eth_signTransaction",
            Self::PersonalSign => "personal_sign",
        }
    }
}

/// Wallet reply recorded for display once a request is approved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method")]
pub enum RequestResult {
    #[serde(rename = "eth_sendTransaction", rename_all = "camelCase")]
    SendTransaction {
        tx_hash: String,
        from: String,
        to: String,
        value: String,
    },
    #[serde(rename = "eth_signTransaction", rename_all = "camelCase")]
    SignTransaction { signed_transaction: String },
    #[serde(rename = "personal_sign")]
    PersonalSign {
        address: String,
        valid: bool,
        signature: String,
    },
}

impl RequestResult {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::SendTransaction { .. } => RequestKind::SendTransaction,
            Self::SignTransaction { .. } => RequestKind::SignTransaction,
            Self::PersonalSign { .. } => RequestKind::PersonalSign,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    Idle,
    Pending,
    Approved,
    Rejected,
}

/// Read-only view of the wallet session, safe to hand to any consumer.
///
/// `epoch` increments on every disconnect; a request result carrying a stale
/// epoch must not overwrite post-disconnect state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub connected: bool,
    pub address: String,
    pub chain_id: u64,
    pub epoch: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsResponse {
    pub fetching: bool,
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestStatusResponse {
    pub state: RequestPhase,
    pub method: Option<String>,
    pub result: Option<RequestResult>,
}
