//! Port operational state.
//!
//! The client keeps a cached copy of each port's state. The server is the
//! source of truth; the cache is only advanced after a confirmed response
//! or overwritten wholesale by a sync snapshot.
//!
//! ```text
//!   ┌──────┐  add_stream   ┌────────────┐   start    ┌──────────────┐
//!   │ Idle │──────────────▶│ HasStreams │───────────▶│ Transmitting │
//!   └──────┘◀──────────────└────────────┘◀───────────└──────────────┘
//!            remove (all)        ▲  ▲         stop
//!                                │  │ stop    ┌────────┐
//!                                │  └─────────│ Paused │
//!                                │            └────────┘
//!   ┌──────┐                     │
//!   │ Down │  (only sync leaves) ┘
//!   └──────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Operational state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(u8)]
pub enum PortState {
    /// Link is down; only a sync can move the port out of this state.
    Down = 0,
    /// No streams attached.
    Idle = 1,
    /// At least one stream attached, not transmitting.
    HasStreams = 2,
    /// Traffic is running.
    Transmitting = 3,
    /// Traffic is paused.
    Paused = 4,
}

/// A state tag from the server that does not map to any [`PortState`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bad state received from server '{tag}'")]
pub struct ParseStateError {
    /// The tag as received.
    pub tag: String,
}

impl PortState {
    /// Return the tag the server uses for this state.
    #[must_use]
    pub const fn as_tag(self) -> &'static str {
        match self {
            Self::Down => "DOWN",
            Self::Idle => "IDLE",
            Self::HasStreams => "STREAMS",
            Self::Transmitting => "TX",
            Self::Paused => "PAUSE",
        }
    }

    /// Map a server tag to a state.
    ///
    /// # Errors
    ///
    /// Returns `ParseStateError` for any tag outside the closed set
    /// `DOWN`, `IDLE`, `STREAMS`, `TX`, `PAUSE`.
    pub fn from_tag(tag: &str) -> Result<Self, ParseStateError> {
        match tag {
            "DOWN" => Ok(Self::Down),
            "IDLE" => Ok(Self::Idle),
            "STREAMS" => Ok(Self::HasStreams),
            "TX" => Ok(Self::Transmitting),
            "PAUSE" => Ok(Self::Paused),
            other => Err(ParseStateError {
                tag: other.to_string(),
            }),
        }
    }

    /// Returns true if streams may be added or removed in this state.
    #[must_use]
    pub const fn is_writeable(self) -> bool {
        matches!(self, Self::Idle | Self::HasStreams)
    }

    /// Returns true if traffic is running or paused.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Transmitting | Self::Paused)
    }

    /// Returns true if a port in this state may carry attached streams.
    #[must_use]
    pub const fn may_hold_streams(self) -> bool {
        matches!(self, Self::HasStreams | Self::Transmitting | Self::Paused)
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for PortState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s)
    }
}

impl TryFrom<String> for PortState {
    type Error = ParseStateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_tag(&value)
    }
}

impl From<PortState> for String {
    fn from(state: PortState) -> Self {
        state.as_tag().to_string()
    }
}
