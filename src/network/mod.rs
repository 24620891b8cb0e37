//! Network Module
//!
//! TCP server and connection handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - One OS thread per client connection (blocking I/O)
//! - Requests dispatched against the shared table directory

mod connection;
mod server;

pub use connection::Connection;
pub use server::Server;
