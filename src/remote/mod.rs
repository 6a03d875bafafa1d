//! Remote API access.
//!
//! This module provides:
//! - The [`Transport`] trait every engine component calls through
//! - An HTTP/JSON implementation
//! - A simulated in-memory remote for demos and tests
//! - Retry of transient failures

mod http;
mod retry;
mod simulated;
mod transport;

pub use http::{HttpTransport, OPERATION_HEADER};
pub use retry::{RetryBackoff, RetryPolicy};
pub use simulated::{NOT_FOUND_CODE, SimulatedCloud, SimulationScript};
pub use transport::{Transport, TransportError};

#[cfg(test)]
pub use transport::MockTransport;
