//! Network module.
//!
//! Contains the IRC line codec, the client session loop and the registry
//! the request tracker looks sessions up in.

mod codec;
mod registry;
mod session;

pub use codec::IrcCodec;
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{IrcHandle, Session, SessionContext};
