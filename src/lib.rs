//! # stackstore
//!
//! A network-accessible transactional key-value store:
//! - Named tables with exclusive per-table locks
//! - Shadow-write transactions (atomicity + isolation)
//! - Per-connection operand stack driving reads, writes, and arithmetic
//! - Line-oriented text protocol over TCP
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │             (one thread per connection)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Connection Handler                           │
//! │    (login state, operand stack, open transaction)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Directory  │          │    Table    │
//!   │  (one lock) │          │ (lock + two │
//!   └─────────────┘          │    maps)    │
//!                            └─────────────┘
//! ```
//!
//! Non-transactional GET/SET take a table's lock for one operation.
//! Transactions `try_lock` tables instead, hold them across requests, and
//! buffer writes in a proposed map that becomes visible only on COMMIT.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod client;
pub mod directory;
pub mod network;
pub mod protocol;
pub mod stack;
pub mod table;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::Client;
pub use config::Config;
pub use directory::TableDirectory;
pub use error::{Result, StoreError};
pub use network::Server;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of stackstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
