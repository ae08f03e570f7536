//! Core types for the tgen control client.
//!
//! This crate provides the foundational types shared by the transport link
//! and the control layer:
//!
//! - **Identifiers**: [`PortId`], the stable index of a port on the server
//! - **Port state**: [`PortState`] and its total mapping from server tags
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use tgen_core::{PortId, PortState};
//!
//! let port = PortId::new(3);
//! assert_eq!(port.index(), 3);
//!
//! let state: PortState = "TX".parse().unwrap();
//! assert_eq!(state, PortState::Transmitting);
//! assert!("FOO".parse::<PortState>().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod state;

pub use error::{CoreError, Result};
pub use ids::PortId;
pub use state::{ParseStateError, PortState};
