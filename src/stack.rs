//! Operand stack
//!
//! Per-connection LIFO of string-encoded values. Commands like PUSH, POP
//! and the arithmetic operations work against this stack. It is owned
//! exclusively by one connection handler and needs no locking of its own.

/// A LIFO stack of string operands
#[derive(Debug, Default)]
pub struct ValueStack {
    values: Vec<String>,
}

impl ValueStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    /// Pop the top value; `None` if the stack is empty
    pub fn pop(&mut self) -> Option<String> {
        self.values.pop()
    }

    /// Peek at the top value without removing it; `None` if empty
    pub fn top(&self) -> Option<&str> {
        self.values.last().map(String::as_str)
    }

    /// Number of values on the stack
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the stack holds no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
