//! Live IRC sessions, by configured server name.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::SessionError;

/// Outbound side of a connected IRC session.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Configured server name (first segment of offer paths).
    fn server(&self) -> &str;

    fn is_connected(&self) -> bool;

    /// Send a PRIVMSG.
    async fn send_message(&self, target: &str, text: &str) -> Result<(), SessionError>;

    async fn join(&self, channel: &str) -> Result<(), SessionError>;

    /// Send QUIT and close the link.
    async fn disconnect(&self, reason: &str) -> Result<(), SessionError>;
}

/// Sessions that finished registration and can carry requests.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<dyn SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: Arc<dyn SessionHandle>) {
        self.sessions.insert(handle.server().to_string(), handle);
    }

    pub fn unregister(&self, server: &str) {
        self.sessions.remove(server);
    }

    /// The session for `server`, if it is registered and still connected.
    pub fn get(&self, server: &str) -> Option<Arc<dyn SessionHandle>> {
        self.sessions
            .get(server)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|handle| handle.is_connected())
    }

    /// Names of connected servers, sorted.
    pub fn servers(&self) -> Vec<String> {
        let mut servers: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_connected())
            .map(|entry| entry.key().clone())
            .collect();
        servers.sort();
        servers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Stub {
        name: String,
        connected: AtomicBool,
    }

    #[async_trait]
    impl SessionHandle for Stub {
        fn server(&self) -> &str {
            &self.name
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Relaxed)
        }

        async fn send_message(&self, _target: &str, _text: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn join(&self, _channel: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn disconnect(&self, _reason: &str) -> Result<(), SessionError> {
            self.connected.store(false, Ordering::Relaxed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn disconnected_sessions_are_hidden() {
        let registry = SessionRegistry::new();
        let stub = Arc::new(Stub {
            name: "net".into(),
            connected: AtomicBool::new(true),
        });
        registry.register(stub.clone());

        assert!(registry.get("net").is_some());
        assert_eq!(registry.servers(), vec!["net"]);

        stub.disconnect("bye").await.unwrap();
        assert!(registry.get("net").is_none());
        assert!(registry.servers().is_empty());

        registry.unregister("net");
        assert!(registry.get("other").is_none());
    }
}
