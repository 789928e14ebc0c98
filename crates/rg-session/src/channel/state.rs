//! Channel lifecycle states

use std::fmt;

/// Lifecycle state of a session channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// No connection; initial state and the state after retries run out
    Disconnected,
    /// Connection and health-check handshake in progress
    Connecting,
    Healthy,
    /// A transport error or timeout happened; the next call reconnects first
    Degraded,
    /// Terminal
    Closed,
}

impl ChannelState {
    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: ChannelState) -> bool {
        use ChannelState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Healthy) | (Connecting, Disconnected) => true,
            (Healthy, Degraded) => true,
            (Degraded, Healthy) | (Degraded, Disconnected) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "Disconnected",
            ChannelState::Connecting => "Connecting",
            ChannelState::Healthy => "Healthy",
            ChannelState::Degraded => "Degraded",
            ChannelState::Closed => "Closed",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
