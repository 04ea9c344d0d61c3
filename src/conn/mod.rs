//! Connection setup: parameters, transport, and authentication.

mod authentication;
mod connection;
mod params;
mod tcp_client;

pub use connection::Connection;
pub use params::{ConnectParams, ConnectParamsBuilder, Tls};
