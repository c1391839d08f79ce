//! Third-party streaming-catalog API client.
//!
//! This module provides an authenticated, retry-enabled client over a
//! substitutable transport, plus the filter and response types it speaks.

pub mod client;
pub mod transport;
pub mod types;

pub use client::KodikClient;
pub use transport::{HttpTransport, Transport, TransportResponse};
pub use types::*;
