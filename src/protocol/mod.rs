//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (line-oriented text)
//!
//! One message per line, UTF-8, terminated by `\n`:
//!
//! ```text
//! <TYPE> [arg1] [arg2] ...\n
//! ```
//!
//! Arguments are whitespace-separated tokens, except for `ERROR` and
//! `FAILED` whose single argument is free text delimited by a pair of
//! double quotes (it may contain spaces).
//!
//! ### Requests
//! - `LOGIN <user>`
//! - `CREATE <table>`
//! - `BEGIN` / `COMMIT`
//! - `PUSH <value>` / `POP` / `TOP`
//! - `ADD` / `SUB` / `MUL` / `DIV`
//! - `SET <table> <key>` / `GET <table> <key>`
//! - `BYE`
//!
//! ### Responses
//! - `OK`
//! - `DATA <value>` (payload for TOP)
//! - `FAILED "<message>"` (recoverable)
//! - `ERROR "<message>"` (fatal, connection closes after sending)
//!
//! Table, key and username arguments are identifiers: a letter followed by
//! letters, digits, or underscores. An encoded line may be at most
//! [`MAX_ENCODED_LEN`] bytes.

mod codec;
mod message;

pub use codec::{decode, encode, read_message, write_message, MAX_ENCODED_LEN};
pub use message::{Message, MessageType};
