//! Connection Handler
//!
//! The per-client protocol state machine: enforces login-first, decodes
//! requests, dispatches them to command handlers, tracks the connection's
//! open transaction and the tables it holds locked, and encodes responses.
//!
//! ## Failure Policy
//!
//! - Protocol-invalid input (bad syntax, unknown type, oversized line) is
//!   fatal: the client gets `ERROR` and the socket closes.
//! - Application failures (stack underflow, missing table/key, duplicate
//!   name, non-integer operand) are recoverable: the client gets `FAILED`
//!   and, as a safety measure, any open transaction is rolled back.
//! - Lock contention inside a transaction is recoverable and leaves the
//!   transaction open with the tables it already holds; only the attempted
//!   acquisition is abandoned.
//! - On disconnect or any fatal error, an open transaction is rolled back
//!   and every held table released before the handler returns.
//!
//! Handlers signal failures up to the session loop, which alone decides
//! `FAILED` vs `ERROR` and whether to abort the transaction. Table locks
//! are owned guards, so release is tied to drops rather than manual
//! unlock calls.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::directory::TableDirectory;
use crate::error::{Result, StoreError};
use crate::protocol::{read_message, write_message, Message, MessageType};
use crate::stack::ValueStack;
use crate::table::TableGuard;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Shared table directory
    directory: Arc<TableDirectory>,

    /// Peer address for logging
    peer_addr: String,

    /// Per-connection operand stack
    stack: ValueStack,

    /// Tables held locked by the open transaction, keyed by name.
    /// Non-empty only while `in_transaction` is true; a table appears at
    /// most once and is reused rather than relocked.
    locked_tables: HashMap<String, TableGuard>,

    /// True while a transaction is open
    in_transaction: bool,

    /// True after a successful LOGIN
    logged_in: bool,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O on a cloned stream pair.
    pub fn new(stream: TcpStream, directory: Arc<TableDirectory>) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            directory,
            peer_addr,
            stack: ValueStack::new(),
            locked_tables: HashMap::new(),
            in_transaction: false,
            logged_in: false,
        })
    }

    /// Configure connection timeouts (0 disables)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read_stream = self.reader.get_ref();
        let write_stream = self.writer.get_ref();

        if read_ms > 0 {
            read_stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            write_stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Runs the session loop, then rolls back any transaction still open on
    /// the way out so no table stays locked past the connection's lifetime.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        let result = self.session_loop();

        if self.in_transaction {
            tracing::debug!(
                "Rolling back open transaction for disconnected client {}",
                self.peer_addr
            );
            self.fail_transaction();
        }

        result
    }

    /// Read/dispatch/respond until the client leaves or a fatal error
    fn session_loop(&mut self) -> Result<()> {
        loop {
            let request = match read_message(&mut self.reader) {
                Ok(msg) => msg,
                Err(StoreError::Io(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(StoreError::Io(ref e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::ConnectionReset
                            | std::io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("Connection reset by client {}", self.peer_addr);
                    return Ok(());
                }
                Err(StoreError::Protocol(text)) => {
                    // Malformed or oversized line: report and close
                    tracing::debug!("Protocol error from {}: {}", self.peer_addr, text);
                    let _ = self.send(&Message::error(text));
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            tracing::trace!("Received request from {}: {:?}", self.peer_addr, request);

            // Login-first: the very first request must be LOGIN
            if !self.logged_in {
                if request.message_type() == MessageType::Login {
                    self.logged_in = true;
                    self.send(&Message::ok())?;
                    continue;
                }
                let _ = self.send(&Message::error("first request must be LOGIN"));
                return Ok(());
            }

            let response = match self.dispatch(&request) {
                Ok(response) => response,
                Err(StoreError::Failed(text)) => {
                    // Any open transaction is aborted on an application
                    // failure, whether or not the command was
                    // transaction-related
                    if self.in_transaction {
                        tracing::debug!(
                            "Aborting transaction for {} after failure: {}",
                            self.peer_addr,
                            text
                        );
                        self.fail_transaction();
                    }
                    Message::failed(text)
                }
                Err(StoreError::Contention(text)) => {
                    // The transaction keeps the tables it already holds
                    Message::failed(text)
                }
                Err(StoreError::Protocol(text)) => {
                    let _ = self.send(&Message::error(text));
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            if let Err(e) = self.send(&response) {
                // The client may vanish before the response lands; treat
                // that as a normal disconnect rather than a server error
                if let StoreError::Io(ref io_err) = e {
                    if matches!(
                        io_err.kind(),
                        std::io::ErrorKind::BrokenPipe
                            | std::io::ErrorKind::ConnectionReset
                            | std::io::ErrorKind::ConnectionAborted
                    ) {
                        tracing::debug!(
                            "Client {} disconnected before response could be sent",
                            self.peer_addr
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }

            if request.message_type() == MessageType::Bye {
                tracing::debug!("Client {} closed the session", self.peer_addr);
                return Ok(());
            }
        }
    }

    /// Dispatch one logged-in request to its handler
    fn dispatch(&mut self, request: &Message) -> Result<Message> {
        match request.message_type() {
            MessageType::Login => Err(StoreError::failed("already logged in")),
            MessageType::Create => self.handle_create(request),
            MessageType::Begin => self.handle_begin(),
            MessageType::Commit => self.handle_commit(),
            MessageType::Push => self.handle_push(request),
            MessageType::Pop => self.handle_pop(),
            MessageType::Top => self.handle_top(),
            MessageType::Add
            | MessageType::Sub
            | MessageType::Mul
            | MessageType::Div => self.handle_arithmetic(request.message_type()),
            MessageType::Set => self.handle_set(request),
            MessageType::Get => self.handle_get(request),
            MessageType::Bye => Ok(Message::ok()),
            // Response types are never valid as requests
            MessageType::Ok
            | MessageType::Data
            | MessageType::Failed
            | MessageType::Error => Err(StoreError::failed(format!(
                "{} is not a request",
                request.message_type().as_str()
            ))),
        }
    }

    // =========================================================================
    // Command Handlers
    // =========================================================================

    fn handle_create(&mut self, request: &Message) -> Result<Message> {
        let name = required_arg(request, 0)?;
        self.directory.create_table(name)?;
        tracing::debug!("Client {} created table {}", self.peer_addr, name);
        Ok(Message::ok())
    }

    fn handle_begin(&mut self) -> Result<Message> {
        if self.in_transaction {
            // Nesting is not supported; the open transaction keeps its locks
            return Err(StoreError::Contention(
                "a transaction is already open".to_string(),
            ));
        }
        self.in_transaction = true;
        Ok(Message::ok())
    }

    fn handle_commit(&mut self) -> Result<Message> {
        if !self.in_transaction {
            return Err(StoreError::Contention(
                "no transaction is open".to_string(),
            ));
        }

        // Tables are mutually independent, so iteration order is irrelevant;
        // each guard unlocks its table when dropped by the drain
        for (_, mut guard) in self.locked_tables.drain() {
            guard.commit();
        }
        self.in_transaction = false;

        tracing::debug!("Client {} committed a transaction", self.peer_addr);
        Ok(Message::ok())
    }

    fn handle_push(&mut self, request: &Message) -> Result<Message> {
        let value = required_arg(request, 0)?;
        self.stack.push(value);
        Ok(Message::ok())
    }

    fn handle_pop(&mut self) -> Result<Message> {
        self.stack
            .pop()
            .ok_or_else(|| StoreError::failed("operand stack is empty"))?;
        Ok(Message::ok())
    }

    fn handle_top(&mut self) -> Result<Message> {
        let value = self
            .stack
            .top()
            .ok_or_else(|| StoreError::failed("operand stack is empty"))?;
        Ok(Message::data(value))
    }

    /// ADD/SUB/MUL/DIV: pop right then left, compute `left OP right`
    ///
    /// On any failure the operands are pushed back, so the stack's pre-call
    /// contents are preserved exactly and only the operation is abandoned.
    fn handle_arithmetic(&mut self, op: MessageType) -> Result<Message> {
        let right = self
            .stack
            .pop()
            .ok_or_else(|| StoreError::failed("operand stack is empty"))?;

        let left = match self.stack.pop() {
            Some(value) => value,
            None => {
                self.stack.push(right);
                return Err(StoreError::failed(
                    "arithmetic requires two operand stack values",
                ));
            }
        };

        let (lhs, rhs) = match (left.parse::<i64>(), right.parse::<i64>()) {
            (Ok(lhs), Ok(rhs)) => (lhs, rhs),
            _ => {
                self.stack.push(left);
                self.stack.push(right);
                return Err(StoreError::failed("operands must be integers"));
            }
        };

        let result = match op {
            MessageType::Add => lhs.checked_add(rhs),
            MessageType::Sub => lhs.checked_sub(rhs),
            MessageType::Mul => lhs.checked_mul(rhs),
            MessageType::Div if rhs == 0 => {
                self.stack.push(left);
                self.stack.push(right);
                return Err(StoreError::failed("division by zero"));
            }
            MessageType::Div => lhs.checked_div(rhs),
            _ => None,
        };

        match result {
            Some(value) => {
                self.stack.push(value.to_string());
                Ok(Message::ok())
            }
            None => {
                self.stack.push(left);
                self.stack.push(right);
                Err(StoreError::failed("arithmetic overflow"))
            }
        }
    }

    fn handle_set(&mut self, request: &Message) -> Result<Message> {
        let name = required_arg(request, 0)?.to_string();
        let key = required_arg(request, 1)?.to_string();

        if self.stack.is_empty() {
            return Err(StoreError::failed("operand stack is empty"));
        }

        let table = self
            .directory
            .find_table(&name)
            .ok_or_else(|| StoreError::failed(format!("no such table: {name}")))?;

        if self.in_transaction {
            self.hold_table(&name, &table)?;
            let value = self
                .stack
                .pop()
                .ok_or_else(|| StoreError::failed("operand stack is empty"))?;
            let guard = self
                .locked_tables
                .get_mut(&name)
                .ok_or_else(|| StoreError::failed(format!("table {name} is not held")))?;
            guard.propose_set(key, value);
        } else {
            // Single-operation atomicity: the write commits as soon as the
            // scoped guard drops
            let mut guard = table.lock();
            let value = self
                .stack
                .pop()
                .ok_or_else(|| StoreError::failed("operand stack is empty"))?;
            guard.set(key, value);
        }

        Ok(Message::ok())
    }

    fn handle_get(&mut self, request: &Message) -> Result<Message> {
        let name = required_arg(request, 0)?.to_string();
        let key = required_arg(request, 1)?.to_string();

        let table = self
            .directory
            .find_table(&name)
            .ok_or_else(|| StoreError::failed(format!("no such table: {name}")))?;

        let value = if self.in_transaction {
            // The table stays held until commit or rollback
            self.hold_table(&name, &table)?;
            self.locked_tables
                .get(&name)
                .and_then(|guard| guard.get(&key).map(str::to_string))
        } else {
            let guard = table.lock();
            guard.get(&key).map(str::to_string)
        };

        let value = value.ok_or_else(|| {
            StoreError::failed(format!("table {name} has no key {key}"))
        })?;
        self.stack.push(value);

        Ok(Message::ok())
    }

    // =========================================================================
    // Transaction Helpers
    // =========================================================================

    /// Ensure the open transaction holds the named table
    ///
    /// A table already in the locked set is reused, not relocked. A denied
    /// `try_lock` is a contention failure: the transaction stays open with
    /// whatever it already holds.
    fn hold_table(&mut self, name: &str, table: &crate::table::Table) -> Result<()> {
        if self.locked_tables.contains_key(name) {
            return Ok(());
        }

        let guard = table.try_lock().ok_or_else(|| {
            StoreError::Contention(format!("table {name} is locked by another transaction"))
        })?;
        self.locked_tables.insert(name.to_string(), guard);
        Ok(())
    }

    /// Roll back and release every held table and close the transaction
    ///
    /// The one place transaction teardown happens, so the locked-table set
    /// is always emptied and each table unlocked exactly once.
    fn fail_transaction(&mut self) {
        for (_, mut guard) in self.locked_tables.drain() {
            guard.rollback();
        }
        self.in_transaction = false;
    }

    // =========================================================================
    // I/O
    // =========================================================================

    /// Send one response to the client
    fn send(&mut self, response: &Message) -> Result<()> {
        tracing::trace!("Sending response to {}: {:?}", self.peer_addr, response);
        write_message(&mut self.writer, response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Fetch a request argument the decoder has already validated
fn required_arg(request: &Message, index: usize) -> Result<&str> {
    request.arg(index).ok_or_else(|| {
        StoreError::protocol(format!(
            "{} request is missing argument {}",
            request.message_type().as_str(),
            index
        ))
    })
}
