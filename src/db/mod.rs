//! Database layer - connection, schema generation and table writes

pub mod connection;
pub mod schema;
pub mod writer;

pub use connection::{ConnectArgs, ConnectArgsBuilder, Connection};
pub use writer::{TableSink, TableWriter};
