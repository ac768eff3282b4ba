//! # xdcc-proto
//!
//! Protocol pieces for harvesting XDCC offers from IRC channels and
//! negotiating DCC transfers. Everything in this crate is pure parsing and
//! data modelling; sockets, storage and timers live in the daemon.
//!
//! ## Quick Start
//!
//! ```rust
//! use xdcc_proto::{classify, XdccEvent};
//!
//! let event = classify("#12  45x [1.4G] Some.Show.S01E01.mkv", "bot", "#chan");
//! match event {
//!     Some(XdccEvent::Package(pack)) => {
//!         assert_eq!(pack.slot, 12);
//!         assert_eq!(pack.size, "1.4G");
//!     }
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```
//!
//! ```rust
//! use xdcc_proto::Message;
//!
//! let msg: Message = ":bot!x@host PRIVMSG #chan :hello".parse().unwrap();
//! assert_eq!(msg.source_nick(), Some("bot"));
//! ```

#![deny(clippy::all)]

pub mod colors;
pub mod ctcp;
pub mod error;
pub mod message;
pub mod model;
pub mod path;
pub mod xdcc;

pub use self::colors::strip_control;
pub use self::ctcp::{Ctcp, CtcpKind, DccSend};
pub use self::error::{MessageParseError, ProtocolError};
pub use self::message::Message;
pub use self::model::{Bot, Package, PackageRecord, Request, RequestStatus};
pub use self::path::PackPath;
pub use self::xdcc::{classify, classify_at, BandwidthNotice, OfferSummary, XdccEvent};
