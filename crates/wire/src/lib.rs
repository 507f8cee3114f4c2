// SPDX-License-Identifier: MIT

//! Length-prefixed JSON IPC protocol between the CLI and the service.
//!
//! Wire format: 4-byte length prefix (little-endian) + UTF-8 JSON payload.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod request;
mod response;
mod wire;

pub use request::{Action, Request};
pub use response::{ResponseStatus, Response};
pub use wire::{read_message, write_message, ProtocolError, MAX_FRAME_BYTES};
