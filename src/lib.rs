//! A pure-Rust, synchronous driver for MongoDB's legacy `OP_COMMAND` /
//! `OP_COMMANDREPLY` wire protocol, as spoken by MongoDB 3.2 through
//! 3.6.
//!
//! This crate does not implement `OP_MSG` (MongoDB's newer compressed,
//! streaming wire format), connection pooling, replica-set discovery,
//! or GSSAPI/x.509 authentication; see `DESIGN.md` for the full list
//! of scoped-out concerns.

#![deny(missing_debug_implementations)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
extern crate log;

pub mod bson;
mod collection;
mod command;
mod conn;
mod cursor;
mod database;
pub mod error;
mod wire;

pub use bson::{Decimal128, Document, ObjectId, Value};
pub use collection::Collection;
pub use conn::{ConnectParams, ConnectParamsBuilder, Connection, Tls};
pub use cursor::Cursor;
pub use database::Database;
pub use error::{MdbError, MdbResult};

/// Connects to a MongoDB server and, if `user` is given, authenticates
/// with SCRAM-SHA-1 against the `admin` database.
///
/// This is a thin convenience wrapper over [`ConnectParamsBuilder`] /
/// [`Connection::connect`] for the common case; build a
/// [`ConnectParams`] directly for finer control (read/write timeouts,
/// a custom CA bundle, …).
pub fn connect(
    host: impl Into<String>,
    database: impl Into<String>,
    user: Option<&str>,
    password: impl Into<String>,
    port: u16,
    use_ssl: bool,
    ssl_ca_certs: Option<&str>,
) -> MdbResult<Connection> {
    let mut builder = ConnectParamsBuilder::new()
        .hostname(host)
        .dbname(database)
        .port(port)
        .password(password);
    if let Some(user) = user {
        builder = builder.user(user);
    }
    if use_ssl {
        builder = builder.tls(Tls::Secure {
            ca_certs_path: ssl_ca_certs.map(ToOwned::to_owned),
        });
    }
    let params = builder.build()?;
    Connection::connect(&params)
}
