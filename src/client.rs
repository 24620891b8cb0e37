//! Blocking client
//!
//! A thin synchronous client for the wire protocol: each call encodes one
//! request, reads exactly one response, and maps `FAILED`/`ERROR` responses
//! to recoverable and fatal errors respectively. Used by the command-line
//! utilities and by the integration tests.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{Result, StoreError};
use crate::protocol::{read_message, write_message, Message, MessageType};

/// A blocking connection to a stackstore server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Send one request and read its response
    ///
    /// `FAILED` comes back as [`StoreError::Failed`] and `ERROR` as
    /// [`StoreError::Protocol`]; any other response is returned as-is.
    pub fn request(&mut self, request: &Message) -> Result<Message> {
        write_message(&mut self.writer, request)?;
        let response = read_message(&mut self.reader)?;

        match response.message_type() {
            MessageType::Failed => Err(StoreError::Failed(
                response.quoted_text().unwrap_or_default().to_string(),
            )),
            MessageType::Error => Err(StoreError::Protocol(
                response.quoted_text().unwrap_or_default().to_string(),
            )),
            _ => Ok(response),
        }
    }

    /// Send a request whose only acceptable response is `OK`
    fn expect_ok(&mut self, request: &Message) -> Result<()> {
        let response = self.request(request)?;
        if response.message_type() != MessageType::Ok {
            return Err(StoreError::protocol(format!(
                "unexpected {} response to {}",
                response.message_type().as_str(),
                request.message_type().as_str()
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// `LOGIN <username>`
    pub fn login(&mut self, username: &str) -> Result<()> {
        self.expect_ok(&Message::new(MessageType::Login, vec![username.to_string()]))
    }

    /// `CREATE <table>`
    pub fn create(&mut self, table: &str) -> Result<()> {
        self.expect_ok(&Message::new(MessageType::Create, vec![table.to_string()]))
    }

    /// `BEGIN`
    pub fn begin(&mut self) -> Result<()> {
        self.expect_ok(&Message::new(MessageType::Begin, Vec::new()))
    }

    /// `COMMIT`
    pub fn commit(&mut self) -> Result<()> {
        self.expect_ok(&Message::new(MessageType::Commit, Vec::new()))
    }

    /// `PUSH <value>`
    pub fn push(&mut self, value: &str) -> Result<()> {
        self.expect_ok(&Message::new(MessageType::Push, vec![value.to_string()]))
    }

    /// `POP`
    pub fn pop(&mut self) -> Result<()> {
        self.expect_ok(&Message::new(MessageType::Pop, Vec::new()))
    }

    /// `TOP`; returns the `DATA` payload
    pub fn top(&mut self) -> Result<String> {
        let response = self.request(&Message::new(MessageType::Top, Vec::new()))?;
        match response.message_type() {
            MessageType::Data => Ok(response.value().unwrap_or_default().to_string()),
            other => Err(StoreError::protocol(format!(
                "unexpected {} response to TOP",
                other.as_str()
            ))),
        }
    }

    /// `ADD`
    pub fn add(&mut self) -> Result<()> {
        self.expect_ok(&Message::new(MessageType::Add, Vec::new()))
    }

    /// `SUB`
    pub fn sub(&mut self) -> Result<()> {
        self.expect_ok(&Message::new(MessageType::Sub, Vec::new()))
    }

    /// `MUL`
    pub fn mul(&mut self) -> Result<()> {
        self.expect_ok(&Message::new(MessageType::Mul, Vec::new()))
    }

    /// `DIV`
    pub fn div(&mut self) -> Result<()> {
        self.expect_ok(&Message::new(MessageType::Div, Vec::new()))
    }

    /// `SET <table> <key>` (value comes from the operand stack)
    pub fn set(&mut self, table: &str, key: &str) -> Result<()> {
        self.expect_ok(&Message::new(
            MessageType::Set,
            vec![table.to_string(), key.to_string()],
        ))
    }

    /// `GET <table> <key>` (pushes the value onto the operand stack)
    pub fn get(&mut self, table: &str, key: &str) -> Result<()> {
        self.expect_ok(&Message::new(
            MessageType::Get,
            vec![table.to_string(), key.to_string()],
        ))
    }

    /// `BYE`; the server closes the connection after responding
    pub fn bye(&mut self) -> Result<()> {
        self.expect_ok(&Message::new(MessageType::Bye, Vec::new()))
    }
}
