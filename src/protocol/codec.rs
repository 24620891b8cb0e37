//! Protocol codec
//!
//! Encoding and decoding functions for the line-oriented wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! <TYPE> [arg1] [arg2] ...\n
//! ```
//!
//! Arguments are whitespace-separated tokens. `FAILED` and `ERROR` carry a
//! single free-text argument delimited by double quotes instead, since the
//! text may contain spaces:
//!
//! ```text
//! FAILED "no such table"\n
//! ```
//!
//! A decoded or encoded line may be at most [`MAX_ENCODED_LEN`] bytes,
//! newline included. Oversized or malformed lines are unrecoverable
//! protocol errors.

use std::io::{BufRead, Read, Write};

use crate::error::{Result, StoreError};

use super::{Message, MessageType};

/// Maximum length of an encoded message line, newline included
pub const MAX_ENCODED_LEN: usize = 1024;

// =============================================================================
// Encoding/Decoding
// =============================================================================

/// Encode a message to its wire line (newline included)
pub fn encode(message: &Message) -> Result<String> {
    if !message.is_valid() {
        return Err(StoreError::protocol(format!(
            "cannot encode invalid {} message",
            message.message_type().as_str()
        )));
    }

    let mut encoded = String::from(message.message_type().as_str());

    if message.message_type().has_quoted_arg() {
        // Single free-text argument, quoted because it may contain spaces
        encoded.push_str(" \"");
        encoded.push_str(message.args()[0].as_str());
        encoded.push('"');
    } else {
        for arg in message.args() {
            encoded.push(' ');
            encoded.push_str(arg);
        }
    }

    encoded.push('\n');

    if encoded.len() > MAX_ENCODED_LEN {
        return Err(StoreError::protocol("message is too long"));
    }

    Ok(encoded)
}

/// Decode one wire line (must be newline-terminated) into a message
pub fn decode(encoded: &str) -> Result<Message> {
    if encoded.len() > MAX_ENCODED_LEN {
        return Err(StoreError::protocol("message is too long"));
    }

    if !encoded.ends_with('\n') {
        return Err(StoreError::protocol("encoded message is missing a newline"));
    }

    let body = encoded.trim_end_matches(['\n', '\r']).trim_start();

    let keyword = body.split_whitespace().next().unwrap_or("");
    let message_type = MessageType::from_keyword(keyword)
        .ok_or_else(|| StoreError::protocol(format!("unknown message type: {keyword:?}")))?;

    let rest = &body[keyword.len()..];

    let args = if message_type.has_quoted_arg() {
        vec![extract_quoted_text(rest)?]
    } else {
        rest.split_whitespace().map(str::to_string).collect()
    };

    let message = Message::new(message_type, args);
    if !message.is_valid() {
        return Err(StoreError::protocol(format!(
            "invalid arguments for {} message",
            message_type.as_str()
        )));
    }

    Ok(message)
}

/// Extract the free text between the first and last double quote
fn extract_quoted_text(rest: &str) -> Result<String> {
    let open = rest.find('"');
    let close = rest.rfind('"');

    match (open, close) {
        (Some(open), Some(close)) if open < close => {
            Ok(rest[open + 1..close].to_string())
        }
        _ => Err(StoreError::protocol(
            "message requires a quoted text argument",
        )),
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one message line from a stream
///
/// Blocks until a full line is received. Returns an `UnexpectedEof` I/O
/// error if the peer closes the connection, and a protocol error for a line
/// exceeding [`MAX_ENCODED_LEN`] (the read is bounded, so an unterminated
/// line cannot grow the buffer without limit).
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Message> {
    let mut line = String::new();
    let n = reader
        .by_ref()
        .take(MAX_ENCODED_LEN as u64 + 1)
        .read_line(&mut line)?;

    if n == 0 {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed by peer",
        )));
    }

    if !line.ends_with('\n') {
        if line.len() > MAX_ENCODED_LEN {
            return Err(StoreError::protocol("message is too long"));
        }
        // Peer closed mid-line
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed mid-message",
        )));
    }

    decode(&line)
}

/// Write one message line to a stream and flush it
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    let encoded = encode(message)?;
    writer.write_all(encoded.as_bytes())?;
    writer.flush()?;
    Ok(())
}
