//! Control layer for a traffic-generation server.
//!
//! This crate tracks the ownership and operational state of every port on
//! a server and refuses illegal commands locally, before they reach the
//! wire. Multi-port operations are folded into a single [`CmdResult`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Console / CLI (tgen-cli)                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StatelessClient                         │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  Session    │ │  Fan-out    │ │  Composite          │    │
//! │  │  bootstrap  │ │  + selector │ │  reset/start/stop   │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │  Port 0  │   │  Port 1  │   │  Port N  │
//!        └──────────┘   └──────────┘   └──────────┘
//!               │              │              │
//!               └──────────────┼──────────────┘
//!                              ▼
//!                    ┌──────────────────┐
//!                    │  RpcLink (shared)│
//!                    └──────────────────┘
//! ```
//!
//! Ports hold the link, not the client, so ownership stays a tree.
//!
//! # Usage
//!
//! ```no_run
//! use tgen_control::{ClientConfig, StatelessClient, StreamDescriptor, StreamPack};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = StatelessClient::new(ClientConfig::new("bob"));
//!
//! let rc = client.connect().await?;
//! if rc.bad() {
//!     eprintln!("{rc}");
//!     return Ok(());
//! }
//!
//! let streams = vec![StreamPack::new(1, StreamDescriptor::new(json!({"pps": 1000})))];
//! let rc = client.start(vec![0u32, 1], &streams, 1.0, false).await?;
//! println!("start: {rc}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod commands;
pub mod error;
pub mod port;
pub mod result;
pub mod selector;
pub mod telemetry;
pub mod types;

pub use client::StatelessClient;
pub use error::{ClientError, Result};
pub use port::Port;
pub use result::{CmdResult, Outcome, Reporter, TracingReporter};
pub use selector::PortSelector;
pub use telemetry::{NullTelemetry, SharedTelemetry, TelemetrySource};
pub use types::{ClientConfig, Handler, PortSnapshot, StreamDescriptor, StreamId, StreamPack, SystemInfo};

// Re-export commonly used types from dependencies for convenience
pub use tgen_core::{PortId, PortState};
pub use tgen_rpc::{LinkConfig, RpcCommand, RpcLink, RpcReply};
