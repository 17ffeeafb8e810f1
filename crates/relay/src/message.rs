use std::borrow::Cow;

use bytes::{Bytes, BytesMut};

use crate::topic::{self, Topic};

/// An opaque relayed payload.
///
/// By convention the payload reads `<topic><space><content>`, but nothing in
/// the relay enforces or parses that shape. The helpers here exist for
/// participants that build or inspect messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    bytes: Bytes,
}

impl RelayMessage {
    /// Wrap raw bytes without interpretation.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Build `<topic> <content>`.
    pub fn compose(topic: &Topic, content: &str) -> Self {
        Self::new(format!("{topic} {content}"))
    }

    /// A producer signal: `<topic> <producer-id> value #<counter>`.
    pub fn signal(topic: &Topic, producer_id: &str, counter: u64) -> Self {
        Self::compose(topic, &format!("{producer_id} value #{counter}"))
    }

    /// A consumer command: `<topic> <client-id> command #<counter>`.
    pub fn command(topic: &Topic, client_id: &str, counter: u64) -> Self {
        Self::compose(topic, &format!("{client_id} command #{counter}"))
    }

    /// Reassemble a message from transport frames.
    ///
    /// Participants send single-frame messages; anything multi-frame is
    /// concatenated in order.
    pub fn from_frames(frames: Vec<Bytes>) -> Self {
        match frames.len() {
            0 => Self::new(Bytes::new()),
            1 => Self::new(frames.into_iter().next().unwrap_or_default()),
            _ => {
                let mut buf = BytesMut::with_capacity(frames.iter().map(Bytes::len).sum());
                for frame in &frames {
                    buf.extend_from_slice(frame);
                }
                Self::new(buf.freeze())
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Leading bytes up to the first space (the whole payload if none).
    pub fn topic_token(&self) -> &[u8] {
        let end = self
            .bytes
            .iter()
            .position(|b| *b == b' ')
            .unwrap_or(self.bytes.len());
        &self.bytes[..end]
    }

    /// Bytes after the first space, if there is one.
    pub fn content(&self) -> Option<&[u8]> {
        self.bytes
            .iter()
            .position(|b| *b == b' ')
            .map(|idx| &self.bytes[idx + 1..])
    }

    /// Lossy UTF-8 view for logging.
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Whether a subscriber holding `filters` would receive this message.
    pub fn matches(&self, filters: &[Topic]) -> bool {
        topic::accepts(filters, &self.bytes)
    }
}

impl From<&str> for RelayMessage {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

impl From<String> for RelayMessage {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Vec<u8>> for RelayMessage {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_shape() {
        let topic = Topic::new("engine/temperature").unwrap();
        let msg = RelayMessage::signal(&topic, "actorA", 0);
        assert_eq!(msg.as_bytes(), b"engine/temperature actorA value #0");
        assert_eq!(msg.topic_token(), b"engine/temperature");
        assert_eq!(msg.content(), Some(&b"actorA value #0"[..]));
    }

    #[test]
    fn command_shape() {
        let topic = Topic::new("cmd").unwrap();
        let msg = RelayMessage::command(&topic, "clientA", 7);
        assert_eq!(msg.as_text(), "cmd clientA command #7");
    }

    #[test]
    fn topic_token_without_space_is_whole_payload() {
        let msg = RelayMessage::from("heartbeat");
        assert_eq!(msg.topic_token(), b"heartbeat");
        assert_eq!(msg.content(), None);
    }

    #[test]
    fn matches_uses_raw_prefix() {
        let msg = RelayMessage::from("engineX 1");
        assert!(msg.matches(&Topic::parse_list("engine")));
        assert!(!msg.matches(&Topic::parse_list("engine/")));
        assert!(msg.matches(&[]));
    }

    #[test]
    fn from_frames_concatenates() {
        let msg = RelayMessage::from_frames(vec![
            Bytes::from_static(b"cmd"),
            Bytes::from_static(b" payload"),
        ]);
        assert_eq!(msg.as_bytes(), b"cmd payload");
        assert!(RelayMessage::from_frames(Vec::new()).is_empty());
    }

    #[test]
    fn opaque_binary_payload_is_preserved() {
        let raw = vec![0u8, 159, 146, 150, b' ', 0xff];
        let msg = RelayMessage::from(raw.clone());
        assert_eq!(msg.as_bytes(), raw.as_slice());
        assert_eq!(msg.len(), 6);
    }
}
