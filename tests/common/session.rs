//! Session handle that records what it was asked to send.

use async_trait::async_trait;
use downer::error::SessionError;
use downer::network::SessionHandle;
use std::sync::Mutex;

pub struct RecordingSession {
    server: String,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSession {
    pub fn new(server: &str) -> Self {
        Self {
            server: server.to_string(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// `(target, text)` of every PRIVMSG so far.
    #[allow(dead_code)]
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SessionHandle for RecordingSession {
    fn server(&self) -> &str {
        &self.server
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn send_message(&self, target: &str, text: &str) -> Result<(), SessionError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((target.to_string(), text.to_string()));
        }
        Ok(())
    }

    async fn join(&self, _channel: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn disconnect(&self, _reason: &str) -> Result<(), SessionError> {
        Ok(())
    }
}
