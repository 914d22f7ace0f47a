//! Messaging-platform boundary: the port the core calls, plus helpers built on it.

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod outbound;
pub mod port;
pub mod types;
