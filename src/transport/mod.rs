//! HTTP transport for the remote inference endpoints.

mod http;

pub use http::{HttpTransport, TransportError};
