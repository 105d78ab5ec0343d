//! ICMP probing.
//!
//! One echo request per call, with the outcome returned as a value.

mod ping;

pub use ping::*;

use std::time::Duration;

use async_trait::async_trait;

/// Outcome of a single probe attempt.
///
/// Failure is a first-class outcome consumed by pattern matching, never
/// an error unwound across component boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    /// A reply arrived within the timeout; round-trip time in milliseconds.
    Success(u64),
    /// No reply within the timeout.
    Timeout,
    /// The network reported the destination as unreachable.
    Unreachable,
    /// Any other failure, carrying a human-readable diagnostic.
    Error(String),
}

impl PingOutcome {
    /// Round-trip time in milliseconds; present only on success.
    pub fn rtt_ms(&self) -> Option<u64> {
        match self {
            PingOutcome::Success(ms) => Some(*ms),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PingOutcome::Success(_))
    }
}

/// Issues a single ICMP echo request against a host with a bounded timeout.
///
/// Each call is an independent probe: no internal retry, at most one
/// ICMP exchange per call.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, host: &str, timeout: Duration) -> PingOutcome;
}
