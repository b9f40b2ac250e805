//! Startup dependency checks gating readiness.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::error::LifecycleError;

/// A dependency the service needs before it can report ready. Run once at startup.
#[async_trait]
pub trait DependencyCheck: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> Result<(), LifecycleError>;
}

/// Placeholder check that always passes.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysReady;

#[async_trait]
impl DependencyCheck for AlwaysReady {
    fn name(&self) -> &str {
        "always_ready"
    }

    async fn check(&self) -> Result<(), LifecycleError> {
        Ok(())
    }
}

/// Passes if a TCP connection to `address` can be opened within `timeout`.
#[derive(Clone, Debug)]
pub struct TcpCheck {
    name: String,
    address: String,
    timeout: Duration,
}

impl TcpCheck {
    pub fn new(name: impl Into<String>, address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            timeout,
        }
    }

    fn unavailable(&self, reason: String) -> LifecycleError {
        LifecycleError::DependencyUnavailable {
            check: self.name.clone(),
            reason,
        }
    }
}

#[async_trait]
impl DependencyCheck for TcpCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<(), LifecycleError> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(self.unavailable(format!("connect to {}: {e}", self.address))),
            Err(_) => Err(self.unavailable(format!(
                "connect to {} timed out after {:?}",
                self.address, self.timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn tcp_check_passes_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let check = TcpCheck::new("db", address, Duration::from_secs(1));
        assert!(check.check().await.is_ok());
    }

    #[tokio::test]
    async fn tcp_check_fails_when_nothing_listens() {
        // Bind then drop to get a port that is very likely closed
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let check = TcpCheck::new("db", address, Duration::from_secs(1));
        match check.check().await {
            Err(LifecycleError::DependencyUnavailable { check, .. }) => assert_eq!(check, "db"),
            other => panic!("expected DependencyUnavailable, got {other:?}"),
        }
    }
}
