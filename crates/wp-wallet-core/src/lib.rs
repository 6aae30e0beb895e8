//! Asset fetching and wallet request orchestration.

mod assets;
mod request;

pub use assets::{AccountAssets, AssetFetcher};
pub use request::{GAS_LIMIT_TRANSFER, RequestOrchestrator, RequestState, TEST_MESSAGE};

use thiserror::Error;

/// Balance query failure. The caller keeps whatever asset set it already
/// holds.
#[derive(Debug, Error)]
#[error("asset fetch failed: {0}")]
pub struct AssetFetchError(#[source] pub anyhow::Error);

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("no connected wallet session")]
    NoSession,
    #[error("another request is already pending")]
    Busy,
    #[error("request rejected: {0}")]
    Rejected(String),
}
