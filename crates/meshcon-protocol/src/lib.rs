//! Mesh gateway line protocol
//!
//! This crate provides the types used to talk to a mesh gateway over its
//! serial line interface, and the grammar of the operator console that sits
//! in front of it. Everything on the wire is newline-delimited ASCII.
//!
//! # Protocol Overview
//!
//! - **Status** (gateway → host): `sta <status-body>`, unsolicited telemetry
//! - **Reply** (gateway → host): `rep <code> <detail...>`, answer to the last request
//! - **Request** (host → gateway): `req <text>`, at most one outstanding at a time
//!
//! Any other leading tag is an unexpected message and is reported by the caller.
//!
//! # Status Bodies
//!
//! - `health <addr> <ttl> <rssi> <[fault-hex]>`
//! - `battery <addr> <ttl> <rssi> <raw-adc>`
//! - `onoff <addr> <ttl> <rssi> <0|1>`
//! - `log <text>`
//! - `address_book_capacity <free> <total>`
//!
//! # Example
//!
//! ```rust
//! use meshcon_protocol::{InboundMessage, StatusMessage};
//!
//! let message = InboundMessage::parse("sta onoff 000D 3 -71.5 1").unwrap();
//! match message {
//!     InboundMessage::Status(StatusMessage::OnOff { on, .. }) => assert!(on),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

mod address;
mod codec;
mod console;
mod error;
mod inbound;
mod status;
mod timestamp;

pub use address::*;
pub use codec::*;
pub use console::*;
pub use error::*;
pub use inbound::*;
pub use status::*;
pub use timestamp::*;
