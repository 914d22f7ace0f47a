//! Dispatch and safety layer for the rfd Telegram bot.
//!
//! Decides whether a registered handler runs for an inbound message or callback
//! (command matching, permission/throttle/staleness guards), and delivers
//! results safely (length-bounded chunks, memoized expensive lookups,
//! persistent flags). The transport itself lives behind [`messaging::port`].

pub mod audit;
pub mod chunking;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod guards;
pub mod logging;
pub mod matchers;
pub mod memo;
pub mod messaging;
pub mod shutdown;
pub mod store;

pub use errors::{Error, ErrorKind, Result};
