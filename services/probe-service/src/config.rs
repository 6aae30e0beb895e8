use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("WALLETPROBE_PROJECT_ID is required and cannot be blank")]
    MissingProjectId,
    #[error("WALLETPROBE_LISTEN_ADDR is not a valid socket address: {0}")]
    InvalidListenAddr(String),
}

/// Service configuration, read from the environment at startup.
///
/// A missing project credential is fatal: the wallet session provider must
/// never be driven unauthenticated.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) project_id: String,
    pub(crate) rpc_url: String,
    pub(crate) listen_addr: SocketAddr,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(
            std::env::var("WALLETPROBE_PROJECT_ID").ok(),
            std::env::var("WALLETPROBE_RPC_URL").ok(),
            std::env::var("WALLETPROBE_LISTEN_ADDR").ok(),
        )
    }

    fn from_values(
        project_id: Option<String>,
        rpc_url: Option<String>,
        listen_addr: Option<String>,
    ) -> Result<Self, ConfigError> {
        let project_id = project_id.unwrap_or_default();
        if project_id.trim().is_empty() {
            return Err(ConfigError::MissingProjectId);
        }

        let rpc_url = rpc_url.unwrap_or_else(|| "http://localhost:8545".to_owned());

        let listen_addr = listen_addr.unwrap_or_else(|| "0.0.0.0:8080".to_owned());
        let listen_addr = listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(listen_addr))?;

        Ok(Self {
            project_id,
            rpc_url,
            listen_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_is_fatal() {
        let err = Config::from_values(None, None, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingProjectId));

        let err = Config::from_values(Some("   ".to_owned()), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingProjectId));
    }

    #[test]
    fn defaults_fill_the_optional_values() {
        let config =
            Config::from_values(Some("2f05a7cde2bb14d478f6e45d4ddbbb01".to_owned()), None, None)
                .unwrap();

        assert_eq!(config.rpc_url, "http://localhost:8545");
        assert_eq!(config.listen_addr, "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn bad_listen_addr_is_reported() {
        let err = Config::from_values(
            Some("2f05a7cde2bb14d478f6e45d4ddbbb01".to_owned()),
            None,
            Some("not-an-addr".to_owned()),
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidListenAddr(_)));
    }
}
