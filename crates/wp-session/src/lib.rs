//! Wallet session lifecycle.
//!
//! The session provider pushes lifecycle events into an unbounded channel;
//! one consumer applies them, in arrival order, through
//! [`SessionManager::apply_event`]. That is the only place the session is
//! mutated; everything else reads a [`SessionSnapshot`].

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use wp_api_types::{ChainId, SessionSnapshot, WalletAddress};

/// Lifecycle notifications from the wallet session provider, delivered
/// out-of-band from any in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    Connect,
    AccountsChanged(Vec<String>),
    ChainChanged(u64),
    Disconnect { code: u16, reason: String },
}

/// Configuration handed to the wallet session provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub project_id: String,
}

impl ProviderConfig {
    /// A blank credential is refused up front; an unauthenticated pairing
    /// would only fail later, inside the relay handshake.
    pub fn new(project_id: impl Into<String>) -> Result<Self, SessionError> {
        let project_id = project_id.into();
        if project_id.trim().is_empty() {
            return Err(SessionError::MissingCredential);
        }
        Ok(Self { project_id })
    }
}

/// Boundary to the wallet session provider (WalletConnect-style).
///
/// Pairing transport (QR/URI exchange, relay, encryption) is entirely the
/// provider's concern.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Begin pairing. Lifecycle events start flowing once the user approves
    /// on the wallet device.
    async fn enable(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    /// Single-subscriber event stream; `None` once claimed.
    fn subscribe(&self) -> Option<UnboundedReceiver<WalletEvent>>;
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("wallet provider credential is missing")]
    MissingCredential,
    #[error("a session is already active")]
    AlreadyActive,
    #[error("pairing failed: {0}")]
    Pairing(#[source] anyhow::Error),
    #[error("no active session")]
    NotConnected,
    #[error("disconnect failed: {0}")]
    Terminate(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    Connected,
}

/// One logical wallet connection. The address is non-empty exactly when the
/// session is connected and the wallet has reported an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub connected: bool,
    pub address: WalletAddress,
    pub chain_id: ChainId,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            connected: false,
            address: WalletAddress::empty(),
            chain_id: ChainId::default(),
        }
    }
}

/// Outcome of applying one wallet event, for the caller to act on
/// (refresh assets, force-reject a pending request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    AddressChanged(String),
    ChainChanged(u64),
    Disconnected { code: u16, reason: String },
}

/// Owns the lifecycle of one wallet connection.
///
/// There is no automatic reconnection: after a disconnect the manager is
/// back at `Disconnected` and a fresh [`SessionManager::initiate`] is
/// required.
pub struct SessionManager {
    phase: SessionPhase,
    session: Session,
    epoch: u64,
    provider: Option<Arc<dyn WalletProvider>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Disconnected,
            session: Session::default(),
            epoch: 0,
            provider: None,
        }
    }

    /// Start pairing with the given provider and hand back its event
    /// stream. On failure the manager stays `Disconnected`.
    pub async fn initiate(
        &mut self,
        provider: Arc<dyn WalletProvider>,
    ) -> Result<UnboundedReceiver<WalletEvent>, SessionError> {
        if self.phase != SessionPhase::Disconnected {
            return Err(SessionError::AlreadyActive);
        }

        let Some(events) = provider.subscribe() else {
            return Err(SessionError::Pairing(anyhow::anyhow!(
                "provider event stream already claimed"
            )));
        };

        self.phase = SessionPhase::Connecting;
        if let Err(err) = provider.enable().await {
            self.phase = SessionPhase::Disconnected;
            return Err(SessionError::Pairing(err));
        }

        info!("wallet pairing initiated");
        self.provider = Some(provider);
        Ok(events)
    }

    /// Apply one lifecycle event. Events arriving with no active pairing
    /// (a provider torn down mid-flight) are dropped.
    pub fn apply_event(&mut self, event: WalletEvent) -> Option<SessionUpdate> {
        match event {
            WalletEvent::Connect => {
                info!("wallet transport connected");
                None
            }
            WalletEvent::AccountsChanged(accounts) => {
                let Some(address) = accounts.into_iter().next() else {
                    warn!("accountsChanged carried no accounts; ignoring");
                    return None;
                };
                if self.phase == SessionPhase::Disconnected {
                    warn!("accountsChanged with no active pairing; ignoring");
                    return None;
                }
                self.phase = SessionPhase::Connected;
                self.session.connected = true;
                self.session.address = WalletAddress(address.clone());
                info!(%address, "session account updated");
                Some(SessionUpdate::AddressChanged(address))
            }
            WalletEvent::ChainChanged(chain_id) => {
                if self.phase == SessionPhase::Disconnected {
                    warn!(chain_id, "chainChanged with no active pairing; ignoring");
                    return None;
                }
                self.session.chain_id = ChainId(chain_id);
                info!(chain_id, "session chain updated");
                Some(SessionUpdate::ChainChanged(chain_id))
            }
            WalletEvent::Disconnect { code, reason } => self.reset_disconnected(code, &reason),
        }
    }

    /// User-driven disconnect: tell the provider, then reset locally
    /// without waiting for the echoed disconnect event.
    pub async fn terminate(&mut self) -> Result<(), SessionError> {
        let Some(provider) = self.provider.clone() else {
            return Err(SessionError::NotConnected);
        };

        provider.disconnect().await.map_err(SessionError::Terminate)?;
        self.reset_disconnected(1000, "user disconnect");
        Ok(())
    }

    fn reset_disconnected(&mut self, code: u16, reason: &str) -> Option<SessionUpdate> {
        if self.phase == SessionPhase::Disconnected {
            return None;
        }

        warn!(code, reason, "wallet session disconnected");
        self.phase = SessionPhase::Disconnected;
        self.session = Session::default();
        self.epoch += 1;
        self.provider = None;
        Some(SessionUpdate::Disconnected {
            code,
            reason: reason.to_owned(),
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connected: self.session.connected,
            address: self.session.address.0.clone(),
            chain_id: self.session.chain_id.0,
            epoch: self.epoch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc::{self, UnboundedSender};

    struct StubProvider {
        events: Mutex<Option<UnboundedReceiver<WalletEvent>>>,
        disconnect_called: AtomicBool,
        fail_enable: bool,
    }

    impl StubProvider {
        fn create() -> (Arc<Self>, UnboundedSender<WalletEvent>) {
            Self::create_with(false)
        }

        fn create_with(fail_enable: bool) -> (Arc<Self>, UnboundedSender<WalletEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let provider = Arc::new(Self {
                events: Mutex::new(Some(rx)),
                disconnect_called: AtomicBool::new(false),
                fail_enable,
            });
            (provider, tx)
        }
    }

    #[async_trait]
    impl WalletProvider for StubProvider {
        async fn enable(&self) -> Result<()> {
            if self.fail_enable {
                anyhow::bail!("relay unreachable");
            }
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            self.disconnect_called.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn subscribe(&self) -> Option<UnboundedReceiver<WalletEvent>> {
            self.events.lock().unwrap().take()
        }
    }

    #[tokio::test]
    async fn accounts_changed_connects_the_session() {
        let (provider, _tx) = StubProvider::create();
        let mut manager = SessionManager::new();
        manager.initiate(provider).await.unwrap();
        assert_eq!(manager.phase(), SessionPhase::Connecting);

        let update =
            manager.apply_event(WalletEvent::AccountsChanged(vec!["0xABC123".to_owned()]));

        assert_eq!(
            update,
            Some(SessionUpdate::AddressChanged("0xABC123".to_owned()))
        );
        assert_eq!(manager.phase(), SessionPhase::Connected);

        let snapshot = manager.snapshot();
        assert!(snapshot.connected);
        assert_eq!(snapshot.address, "0xABC123");
        assert_eq!(snapshot.chain_id, 1);
    }

    #[tokio::test]
    async fn events_apply_in_arrival_order() {
        let (provider, _tx) = StubProvider::create();
        let mut manager = SessionManager::new();
        manager.initiate(provider).await.unwrap();

        manager.apply_event(WalletEvent::Connect);
        manager.apply_event(WalletEvent::ChainChanged(5));
        manager.apply_event(WalletEvent::AccountsChanged(vec!["0xabc".to_owned()]));
        manager.apply_event(WalletEvent::AccountsChanged(vec!["0xdef".to_owned()]));

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.chain_id, 5);
        assert_eq!(snapshot.address, "0xdef");
    }

    #[tokio::test]
    async fn disconnect_resets_to_the_default_session() {
        let (provider, _tx) = StubProvider::create();
        let mut manager = SessionManager::new();
        manager.initiate(provider).await.unwrap();
        manager.apply_event(WalletEvent::AccountsChanged(vec!["0xabc".to_owned()]));
        manager.apply_event(WalletEvent::ChainChanged(137));
        let before = manager.snapshot().epoch;

        let update = manager.apply_event(WalletEvent::Disconnect {
            code: 1000,
            reason: "user".to_owned(),
        });

        assert_eq!(
            update,
            Some(SessionUpdate::Disconnected {
                code: 1000,
                reason: "user".to_owned()
            })
        );
        assert_eq!(manager.phase(), SessionPhase::Disconnected);
        assert_eq!(*manager.session(), Session::default());
        assert_eq!(manager.snapshot().epoch, before + 1);

        // A second disconnect is a no-op.
        let again = manager.apply_event(WalletEvent::Disconnect {
            code: 1000,
            reason: "user".to_owned(),
        });
        assert_eq!(again, None);
        assert_eq!(manager.snapshot().epoch, before + 1);
    }

    #[tokio::test]
    async fn empty_accounts_payload_is_ignored() {
        let (provider, _tx) = StubProvider::create();
        let mut manager = SessionManager::new();
        manager.initiate(provider).await.unwrap();

        let update = manager.apply_event(WalletEvent::AccountsChanged(Vec::new()));

        assert_eq!(update, None);
        assert!(!manager.snapshot().connected);
        assert_eq!(manager.phase(), SessionPhase::Connecting);
    }

    #[tokio::test]
    async fn initiate_twice_is_rejected() {
        let (provider, _tx) = StubProvider::create();
        let mut manager = SessionManager::new();
        manager.initiate(provider).await.unwrap();

        let (second, _tx2) = StubProvider::create();
        let err = manager.initiate(second).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyActive));
    }

    #[tokio::test]
    async fn failed_pairing_leaves_the_manager_disconnected() {
        let (provider, _tx) = StubProvider::create_with(true);
        let mut manager = SessionManager::new();

        let err = manager.initiate(provider).await.unwrap_err();

        assert!(matches!(err, SessionError::Pairing(_)));
        assert_eq!(manager.phase(), SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn terminate_disconnects_the_provider_and_resets() {
        let (provider, _tx) = StubProvider::create();
        let mut manager = SessionManager::new();
        manager.initiate(provider.clone()).await.unwrap();
        manager.apply_event(WalletEvent::AccountsChanged(vec!["0xabc".to_owned()]));

        manager.terminate().await.unwrap();

        assert!(provider.disconnect_called.load(Ordering::SeqCst));
        assert_eq!(manager.phase(), SessionPhase::Disconnected);
        assert_eq!(*manager.session(), Session::default());

        // A fresh initiate is required after termination.
        let err = manager.terminate().await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[test]
    fn blank_credential_is_rejected() {
        assert!(matches!(
            ProviderConfig::new("   "),
            Err(SessionError::MissingCredential)
        ));
        assert!(ProviderConfig::new("2f05a7cde2bb14d478f6e45d4ddbbb01").is_ok());
    }
}
