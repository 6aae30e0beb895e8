use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{info, warn};
use wp_api_types::Asset;
use wp_chain_client::ChainRpc;

use crate::AssetFetchError;

/// Queries the native balance for an address. No caching; every call goes
/// back to the node.
pub struct AssetFetcher {
    rpc: Arc<dyn ChainRpc>,
}

impl AssetFetcher {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }

    pub async fn fetch_assets(&self, address: &str) -> Result<Vec<Asset>, AssetFetchError> {
        let balance = self
            .rpc
            .get_balance(address)
            .await
            .map_err(AssetFetchError)?;

        Ok(vec![Asset {
            symbol: "ETH".to_owned(),
            name: "Ether".to_owned(),
            decimals: 18,
            contract_address: String::new(),
            balance,
        }])
    }
}

/// The asset set held for the current account.
///
/// A refresh replaces the whole set on success and leaves it untouched on
/// failure; the `fetching` flag is cleared either way.
pub struct AccountAssets {
    fetcher: AssetFetcher,
    assets: RwLock<Vec<Asset>>,
    fetching: AtomicBool,
}

impl AccountAssets {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            fetcher: AssetFetcher::new(rpc),
            assets: RwLock::new(Vec::new()),
            fetching: AtomicBool::new(false),
        }
    }

    pub async fn refresh(&self, address: &str) -> Result<(), AssetFetchError> {
        self.fetching.store(true, Ordering::SeqCst);
        let outcome = self.fetcher.fetch_assets(address).await;
        self.fetching.store(false, Ordering::SeqCst);

        match outcome {
            Ok(assets) => {
                info!(%address, "asset set refreshed");
                *self.assets.write().await = assets;
                Ok(())
            }
            Err(err) => {
                warn!(%address, "asset refresh failed: {err}");
                Err(err)
            }
        }
    }

    pub async fn current(&self) -> Vec<Asset> {
        self.assets.read().await.clone()
    }

    pub fn fetching(&self) -> bool {
        self.fetching.load(Ordering::SeqCst)
    }

    /// Disconnect wipes the asset set along with the rest of the session.
    pub async fn clear(&self) {
        self.assets.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use wp_chain_client::TestTransaction;

    struct BalanceRpc {
        balance: String,
        fail: AtomicBool,
    }

    impl BalanceRpc {
        fn new(balance: &str) -> Self {
            Self {
                balance: balance.to_owned(),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ChainRpc for BalanceRpc {
        async fn get_balance(&self, _address: &str) -> anyhow::Result<String> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("node unreachable");
            }
            Ok(self.balance.clone())
        }

        async fn get_transaction_count(&self, _address: &str) -> anyhow::Result<u64> {
            unimplemented!("not used by asset fetching")
        }

        async fn get_gas_price(&self) -> anyhow::Result<String> {
            unimplemented!("not used by asset fetching")
        }

        async fn send_transaction(&self, _tx: &TestTransaction) -> anyhow::Result<String> {
            unimplemented!("not used by asset fetching")
        }

        async fn sign_transaction(&self, _tx: &TestTransaction) -> anyhow::Result<String> {
            unimplemented!("not used by asset fetching")
        }

        async fn personal_sign(&self, _message: &str, _address: &str) -> anyhow::Result<String> {
            unimplemented!("not used by asset fetching")
        }
    }

    #[tokio::test]
    async fn fetch_returns_the_single_native_asset() {
        let fetcher = AssetFetcher::new(Arc::new(BalanceRpc::new("1000000000000000000")));

        let assets = fetcher.fetch_assets("0xabc").await.expect("fetch");

        assert_eq!(
            assets,
            vec![Asset {
                symbol: "ETH".to_owned(),
                name: "Ether".to_owned(),
                decimals: 18,
                contract_address: String::new(),
                balance: "1000000000000000000".to_owned(),
            }]
        );
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_previous_assets() {
        let rpc = Arc::new(BalanceRpc::new("42"));
        let assets = AccountAssets::new(rpc.clone());

        assets.refresh("0xabc").await.expect("first refresh");
        let before = assets.current().await;
        assert_eq!(before.len(), 1);

        rpc.fail.store(true, Ordering::SeqCst);
        let err = assets.refresh("0xabc").await.unwrap_err();

        assert!(err.to_string().contains("asset fetch failed"));
        assert_eq!(assets.current().await, before);
        assert!(!assets.fetching(), "fetching must clear after a failure");
    }

    #[tokio::test]
    async fn clear_empties_the_asset_set() {
        let assets = AccountAssets::new(Arc::new(BalanceRpc::new("42")));
        assets.refresh("0xabc").await.expect("refresh");

        assets.clear().await;

        assert!(assets.current().await.is_empty());
    }
}
