//! HTTP JSON-RPC adapter for an Ethereum-style node.
//!
//! Reads `WALLETPROBE_RPC_URL` from the environment at construction time
//! (default: `http://localhost:8545`).

mod node_provider;

pub use node_provider::NodeWalletProvider;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use wp_chain_client::{ChainRpc, TestTransaction};
use wp_crypto::{encode_hex, parse_hex_quantity};

pub struct JsonRpcClient {
    endpoint: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl Default for JsonRpcClient {
    fn default() -> Self {
        Self::new(None)
    }
}

impl JsonRpcClient {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("WALLETPROBE_RPC_URL").ok())
            .unwrap_or_else(|| "http://localhost:8545".to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("{method} transport"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("{method} HTTP {status}: {text}");
        }

        let body: RpcResponse = response
            .json()
            .await
            .with_context(|| format!("{method} parse"))?;

        if let Some(err) = body.error {
            bail!("{method} rejected by node: {} (code {})", err.message, err.code);
        }

        body.result
            .ok_or_else(|| anyhow::anyhow!("{method} returned neither result nor error"))
    }

    pub(crate) async fn call_text(&self, method: &str, params: Value) -> Result<String> {
        match self.call(method, params).await? {
            Value::String(text) => Ok(text),
            other => bail!("{method} returned non-string result: {other}"),
        }
    }
}

// ── JSON-RPC 2.0 wire types ─────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'a str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[async_trait::async_trait]
impl ChainRpc for JsonRpcClient {
    async fn get_balance(&self, address: &str) -> Result<String> {
        let hex = self
            .call_text("eth_getBalance", json!([address, "latest"]))
            .await?;
        let wei = parse_hex_quantity(&hex).context("eth_getBalance quantity")?;
        Ok(wei.to_string())
    }

    async fn get_transaction_count(&self, address: &str) -> Result<u64> {
        let hex = self
            .call_text("eth_getTransactionCount", json!([address, "latest"]))
            .await?;
        let count = parse_hex_quantity(&hex).context("eth_getTransactionCount quantity")?;
        u64::try_from(count).context("transaction count overflow")
    }

    async fn get_gas_price(&self) -> Result<String> {
        self.call_text("eth_gasPrice", json!([])).await
    }

    async fn send_transaction(&self, tx: &TestTransaction) -> Result<String> {
        self.call_text("eth_sendTransaction", json!([tx])).await
    }

    async fn sign_transaction(&self, tx: &TestTransaction) -> Result<String> {
        // Nodes disagree on the reply shape: geth wraps the raw payload in
        // an object, others return the hex string bare.
        match self.call("eth_signTransaction", json!([tx])).await? {
            Value::String(raw) => Ok(raw),
            Value::Object(fields) => match fields.get("raw") {
                Some(Value::String(raw)) => Ok(raw.clone()),
                _ => bail!("eth_signTransaction returned an unrecognised object"),
            },
            other => bail!("eth_signTransaction returned an unrecognised result: {other}"),
        }
    }

    async fn personal_sign(&self, message: &str, address: &str) -> Result<String> {
        let data = format!("0x{}", encode_hex(message.as_bytes()));
        self.call_text("personal_sign", json!([data, address])).await
    }
}
