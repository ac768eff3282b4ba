//! Integration test common infrastructure.
//!
//! Provides a scripted IRC server, a fake XDCC bot serving DCC streams,
//! a recording session handle, a temporary daemon stack, and polling
//! helpers.

pub mod irc;
pub mod peer;
pub mod session;
pub mod stack;

#[allow(unused_imports)]
pub use irc::{FakeIrcServer, FakeLink};
#[allow(unused_imports)]
pub use peer::DccPeer;
#[allow(unused_imports)]
pub use session::RecordingSession;
#[allow(unused_imports)]
pub use stack::TestStack;

use std::time::Duration;

/// Poll `check` every 20ms until it returns `Some`, failing after 5s.
#[allow(dead_code)]
pub async fn eventually<T, F>(what: &str, mut check: F) -> T
where
    F: FnMut() -> Option<T>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(value) = check() {
            return value;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
