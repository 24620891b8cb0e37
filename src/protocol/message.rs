//! Message definitions
//!
//! A message is a type tag plus an ordered list of string arguments. The
//! same shape represents requests and responses; [`Message::is_valid`]
//! enforces the per-type argument-count and identifier rules.

/// Message types, requests and responses alike
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    // Requests
    Login,
    Create,
    Push,
    Pop,
    Top,
    Set,
    Get,
    Add,
    Sub,
    Mul,
    Div,
    Begin,
    Commit,
    Bye,
    // Responses
    Ok,
    Failed,
    Error,
    Data,
}

impl MessageType {
    /// The wire keyword for this type
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Login => "LOGIN",
            MessageType::Create => "CREATE",
            MessageType::Push => "PUSH",
            MessageType::Pop => "POP",
            MessageType::Top => "TOP",
            MessageType::Set => "SET",
            MessageType::Get => "GET",
            MessageType::Add => "ADD",
            MessageType::Sub => "SUB",
            MessageType::Mul => "MUL",
            MessageType::Div => "DIV",
            MessageType::Begin => "BEGIN",
            MessageType::Commit => "COMMIT",
            MessageType::Bye => "BYE",
            MessageType::Ok => "OK",
            MessageType::Failed => "FAILED",
            MessageType::Error => "ERROR",
            MessageType::Data => "DATA",
        }
    }

    /// Parse a wire keyword; `None` for unknown keywords
    pub fn from_keyword(word: &str) -> Option<Self> {
        let mtype = match word {
            "LOGIN" => MessageType::Login,
            "CREATE" => MessageType::Create,
            "PUSH" => MessageType::Push,
            "POP" => MessageType::Pop,
            "TOP" => MessageType::Top,
            "SET" => MessageType::Set,
            "GET" => MessageType::Get,
            "ADD" => MessageType::Add,
            "SUB" => MessageType::Sub,
            "MUL" => MessageType::Mul,
            "DIV" => MessageType::Div,
            "BEGIN" => MessageType::Begin,
            "COMMIT" => MessageType::Commit,
            "BYE" => MessageType::Bye,
            "OK" => MessageType::Ok,
            "FAILED" => MessageType::Failed,
            "ERROR" => MessageType::Error,
            "DATA" => MessageType::Data,
            _ => return None,
        };
        Some(mtype)
    }

    /// True for FAILED/ERROR, whose single argument is quoted free text
    pub fn has_quoted_arg(&self) -> bool {
        matches!(self, MessageType::Failed | MessageType::Error)
    }
}

/// A protocol message: type tag + ordered string arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    message_type: MessageType,
    args: Vec<String>,
}

impl Message {
    /// Create a message from a type and argument list
    pub fn new(message_type: MessageType, args: Vec<String>) -> Self {
        Self { message_type, args }
    }

    // =========================================================================
    // Response Constructors
    // =========================================================================

    /// An `OK` response
    pub fn ok() -> Self {
        Self::new(MessageType::Ok, Vec::new())
    }

    /// A `DATA <value>` response (payload for TOP)
    pub fn data(value: impl Into<String>) -> Self {
        Self::new(MessageType::Data, vec![value.into()])
    }

    /// A `FAILED "<message>"` response (recoverable)
    pub fn failed(text: impl Into<String>) -> Self {
        Self::new(MessageType::Failed, vec![text.into()])
    }

    /// An `ERROR "<message>"` response (fatal)
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(MessageType::Error, vec![text.into()])
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Username argument (LOGIN)
    pub fn username(&self) -> Option<&str> {
        self.arg(0)
    }

    /// Table argument (CREATE, SET, GET)
    pub fn table(&self) -> Option<&str> {
        self.arg(0)
    }

    /// Key argument (SET, GET)
    pub fn key(&self) -> Option<&str> {
        self.arg(1)
    }

    /// Value argument (PUSH, DATA)
    pub fn value(&self) -> Option<&str> {
        self.arg(0)
    }

    /// Quoted-text argument (FAILED, ERROR)
    pub fn quoted_text(&self) -> Option<&str> {
        self.arg(0)
    }

    // =========================================================================
    // Validity
    // =========================================================================

    /// Check the per-type argument-count and identifier rules
    pub fn is_valid(&self) -> bool {
        match self.message_type {
            // Zero-argument types
            MessageType::Pop
            | MessageType::Top
            | MessageType::Add
            | MessageType::Sub
            | MessageType::Mul
            | MessageType::Div
            | MessageType::Begin
            | MessageType::Commit
            | MessageType::Bye
            | MessageType::Ok => self.args.is_empty(),

            // One identifier argument
            MessageType::Login | MessageType::Create => {
                self.args.len() == 1 && is_identifier(&self.args[0])
            }

            // One value argument with at least one non-whitespace character
            MessageType::Push | MessageType::Data => {
                self.args.len() == 1 && !self.args[0].trim().is_empty()
            }

            // Two identifier arguments (table, key)
            MessageType::Set | MessageType::Get => {
                self.args.len() == 2
                    && is_identifier(&self.args[0])
                    && is_identifier(&self.args[1])
            }

            // One free-text argument
            MessageType::Failed | MessageType::Error => self.args.len() == 1,
        }
    }
}

/// True if `s` is a valid identifier: a letter followed by letters, digits,
/// or underscores
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_rules() {
        assert!(is_identifier("Table_1"));
        assert!(is_identifier("a"));
        assert!(!is_identifier("1table"));
        assert!(!is_identifier("_x"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("has space"));
    }

    #[test]
    fn argument_counts() {
        assert!(Message::new(MessageType::Begin, vec![]).is_valid());
        assert!(!Message::new(MessageType::Begin, vec!["x".into()]).is_valid());
        assert!(Message::new(MessageType::Login, vec!["alice".into()]).is_valid());
        assert!(!Message::new(MessageType::Login, vec![]).is_valid());
        assert!(Message::new(MessageType::Get, vec!["t".into(), "k".into()]).is_valid());
        assert!(!Message::new(MessageType::Get, vec!["t".into()]).is_valid());
    }

    #[test]
    fn push_requires_non_whitespace_value() {
        assert!(Message::new(MessageType::Push, vec!["100".into()]).is_valid());
        assert!(!Message::new(MessageType::Push, vec!["   ".into()]).is_valid());
    }
}
