//! Discovery wire protocol.
//!
//! Requests are ASCII, whitespace-tokenized:
//!
//! ```text
//! REGISTER SIGNAL <topic>
//! REGISTER COMMAND <topic>
//! QUERY SIGNALS
//! QUERY COMMANDS
//! ```
//!
//! Replies are plain text: a confirmation, a space-separated topic listing
//! (each topic followed by one space, so an empty registry replies with an
//! empty string), or an error line. Tokens past the ones a request needs are
//! ignored.

use std::fmt;

use thiserror::Error;

use crate::topic::Topic;

const REGISTER: &str = "REGISTER";
const QUERY: &str = "QUERY";

/// Topic category tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Signal,
    Command,
}

impl Category {
    /// Token used in `REGISTER` requests.
    pub fn register_token(self) -> &'static str {
        match self {
            Self::Signal => "SIGNAL",
            Self::Command => "COMMAND",
        }
    }

    /// Token used in `QUERY` requests.
    pub fn query_token(self) -> &'static str {
        match self {
            Self::Signal => "SIGNALS",
            Self::Command => "COMMANDS",
        }
    }

    fn from_register_token(token: &str) -> Option<Self> {
        match token {
            "SIGNAL" => Some(Self::Signal),
            "COMMAND" => Some(Self::Command),
            _ => None,
        }
    }

    fn from_query_token(token: &str) -> Option<Self> {
        match token {
            "SIGNALS" => Some(Self::Signal),
            "COMMANDS" => Some(Self::Command),
            _ => None,
        }
    }
}

/// A malformed or unrecognized discovery request.
///
/// The `Display` text of each variant is exactly what the registry replies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed request: empty request")]
    Empty,

    #[error("Malformed request: missing category")]
    MissingCategory,

    #[error("Malformed request: missing topic")]
    MissingTopic,

    #[error("Malformed request: not UTF-8")]
    NotUtf8,

    #[error("Unknown registration type")]
    UnknownRegistrationType,

    #[error("Unknown query type")]
    UnknownQueryType,

    #[error("Unknown command")]
    UnknownCommand,
}

/// A parsed discovery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Register { category: Category, topic: Topic },
    Query { category: Category },
}

impl Request {
    pub fn register(category: Category, topic: Topic) -> Self {
        Self::Register { category, topic }
    }

    pub fn query(category: Category) -> Self {
        Self::Query { category }
    }

    /// Parse a raw request. Topics are UTF-8, so any other bytes are rejected
    /// rather than rewritten.
    pub fn parse_bytes(raw: &[u8]) -> Result<Self, ProtocolError> {
        let line = std::str::from_utf8(raw).map_err(|_| ProtocolError::NotUtf8)?;
        Self::parse(line)
    }

    /// Parse a request line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            None => Err(ProtocolError::Empty),
            Some(REGISTER) => {
                let category = tokens.next().ok_or(ProtocolError::MissingCategory)?;
                let category = Category::from_register_token(category)
                    .ok_or(ProtocolError::UnknownRegistrationType)?;
                let topic = tokens
                    .next()
                    .and_then(|token| Topic::new(token).ok())
                    .ok_or(ProtocolError::MissingTopic)?;
                Ok(Self::Register { category, topic })
            }
            Some(QUERY) => {
                let category = tokens.next().ok_or(ProtocolError::MissingCategory)?;
                let category =
                    Category::from_query_token(category).ok_or(ProtocolError::UnknownQueryType)?;
                Ok(Self::Query { category })
            }
            Some(_) => Err(ProtocolError::UnknownCommand),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register { category, topic } => {
                write!(f, "{REGISTER} {} {topic}", category.register_token())
            }
            Self::Query { category } => write!(f, "{QUERY} {}", category.query_token()),
        }
    }
}

/// A successful discovery reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Registered { category: Category, topic: Topic },
    Topics(Vec<Topic>),
}

impl Response {
    /// Split a topic listing back into topics.
    ///
    /// Tokens that are not valid topics cannot occur in a listing and are
    /// skipped.
    pub fn parse_topics(listing: &str) -> Vec<Topic> {
        listing
            .split_whitespace()
            .filter_map(|token| Topic::new(token).ok())
            .collect()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered { category, topic } => {
                write!(f, "Registered {}: {topic}", category.register_token())
            }
            Self::Topics(topics) => {
                for topic in topics {
                    write!(f, "{topic} ")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> Topic {
        Topic::new(name).unwrap()
    }

    #[test]
    fn parse_register() {
        assert_eq!(
            Request::parse("REGISTER SIGNAL engine/temperature").unwrap(),
            Request::register(Category::Signal, topic("engine/temperature"))
        );
        assert_eq!(
            Request::parse("  REGISTER\tCOMMAND cmd  ").unwrap(),
            Request::register(Category::Command, topic("cmd"))
        );
    }

    #[test]
    fn parse_query() {
        assert_eq!(
            Request::parse("QUERY SIGNALS").unwrap(),
            Request::query(Category::Signal)
        );
        assert_eq!(
            Request::parse("QUERY COMMANDS").unwrap(),
            Request::query(Category::Command)
        );
    }

    #[test]
    fn extra_tokens_are_ignored() {
        assert_eq!(
            Request::parse("REGISTER SIGNAL a b c").unwrap(),
            Request::register(Category::Signal, topic("a"))
        );
        assert_eq!(
            Request::parse("QUERY SIGNALS please").unwrap(),
            Request::query(Category::Signal)
        );
    }

    #[test]
    fn malformed_requests() {
        assert_eq!(Request::parse(""), Err(ProtocolError::Empty));
        assert_eq!(Request::parse("   "), Err(ProtocolError::Empty));
        assert_eq!(Request::parse("REGISTER"), Err(ProtocolError::MissingCategory));
        assert_eq!(Request::parse("REGISTER SIGNAL"), Err(ProtocolError::MissingTopic));
        assert_eq!(Request::parse("QUERY"), Err(ProtocolError::MissingCategory));
        assert_eq!(Request::parse_bytes(b"QUERY SIGNALS\xfe"), Err(ProtocolError::NotUtf8));
        assert_eq!(
            Request::parse_bytes(b"QUERY SIGNALS"),
            Ok(Request::query(Category::Signal))
        );
    }

    #[test]
    fn unknown_tokens() {
        assert_eq!(
            Request::parse("REGISTER SIGNALS x"),
            Err(ProtocolError::UnknownRegistrationType)
        );
        assert_eq!(
            Request::parse("QUERY SIGNAL"),
            Err(ProtocolError::UnknownQueryType)
        );
        assert_eq!(Request::parse("register SIGNAL x"), Err(ProtocolError::UnknownCommand));
        assert_eq!(Request::parse("DELETE SIGNAL x"), Err(ProtocolError::UnknownCommand));
    }

    #[test]
    fn error_text_is_reply_text() {
        assert_eq!(
            ProtocolError::UnknownRegistrationType.to_string(),
            "Unknown registration type"
        );
        assert_eq!(ProtocolError::UnknownQueryType.to_string(), "Unknown query type");
        assert_eq!(ProtocolError::UnknownCommand.to_string(), "Unknown command");
    }

    #[test]
    fn request_display_parses_back() {
        for request in [
            Request::register(Category::Signal, topic("oil/level")),
            Request::register(Category::Command, topic("cmd")),
            Request::query(Category::Signal),
            Request::query(Category::Command),
        ] {
            assert_eq!(Request::parse(&request.to_string()).unwrap(), request);
        }
        assert_eq!(
            Request::register(Category::Signal, topic("x")).to_string(),
            "REGISTER SIGNAL x"
        );
    }

    #[test]
    fn response_text() {
        let registered = Response::Registered {
            category: Category::Command,
            topic: topic("cmd"),
        };
        assert_eq!(registered.to_string(), "Registered COMMAND: cmd");

        let listing = Response::Topics(vec![topic("a"), topic("b")]);
        assert_eq!(listing.to_string(), "a b ");
        assert_eq!(Response::Topics(Vec::new()).to_string(), "");
    }

    #[test]
    fn parse_topics_from_listing() {
        let topics = Response::parse_topics("engine/temperature oil/level ");
        assert_eq!(topics, vec![topic("engine/temperature"), topic("oil/level")]);
        assert!(Response::parse_topics("").is_empty());
    }
}
