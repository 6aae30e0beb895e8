//! Node-backed wallet session provider.
//!
//! Stands in for a relay-based session transport by treating an unlocked
//! node's accounts as the linked wallet: pairing reads the account and
//! chain from the node and replays them as lifecycle events.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;
use wp_crypto::parse_hex_quantity;
use wp_session::{ProviderConfig, WalletEvent, WalletProvider};

use crate::JsonRpcClient;

pub struct NodeWalletProvider {
    config: ProviderConfig,
    rpc: Arc<JsonRpcClient>,
    sender: UnboundedSender<WalletEvent>,
    receiver: Mutex<Option<UnboundedReceiver<WalletEvent>>>,
}

impl NodeWalletProvider {
    pub fn new(config: ProviderConfig, rpc: Arc<JsonRpcClient>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            config,
            rpc,
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }
}

#[async_trait]
impl WalletProvider for NodeWalletProvider {
    async fn enable(&self) -> Result<()> {
        let accounts: Vec<String> = serde_json::from_value(
            self.rpc.call("eth_accounts", json!([])).await?,
        )
        .context("eth_accounts parse")?;
        if accounts.is_empty() {
            bail!("node exposes no unlocked accounts");
        }

        let chain_hex = self.rpc.call_text("eth_chainId", json!([])).await?;
        let chain_id = parse_hex_quantity(&chain_hex).context("eth_chainId quantity")?;
        let chain_id = u64::try_from(chain_id).context("chain id overflow")?;

        info!(
            project = %redact(&self.config.project_id),
            chain_id,
            "node wallet pairing established"
        );

        // Chain before accounts, so the asset refresh triggered by the
        // account event already sees the right chain.
        let _ = self.sender.send(WalletEvent::Connect);
        let _ = self.sender.send(WalletEvent::ChainChanged(chain_id));
        let _ = self.sender.send(WalletEvent::AccountsChanged(accounts));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let _ = self.sender.send(WalletEvent::Disconnect {
            code: 1000,
            reason: "user disconnect".to_owned(),
        });
        Ok(())
    }

    fn subscribe(&self) -> Option<UnboundedReceiver<WalletEvent>> {
        self.receiver.lock().ok()?.take()
    }
}

/// Credentials never land in logs whole.
fn redact(credential: &str) -> String {
    match credential.char_indices().nth(4) {
        Some((idx, _)) => format!("{}…", &credential[..idx]),
        None => "****".to_owned(),
    }
}
