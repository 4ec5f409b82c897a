//! Classification of lines received from the gateway.

use std::fmt;

use crate::error::{ProtocolError, ProtocolResult};
use crate::status::StatusMessage;

/// Tag of unsolicited telemetry lines.
pub const STATUS_TAG: &str = "sta";
/// Tag of replies to the outstanding request.
pub const REPLY_TAG: &str = "rep";
/// Tag of requests sent to the gateway.
pub const REQUEST_TAG: &str = "req";

/// A line received from the gateway, classified by its tag.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Decoded `sta` body.
    Status(StatusMessage),
    /// Raw `rep` body, decoded by whoever issued the request.
    Reply(String),
}

impl InboundMessage {
    /// Classify and decode one gateway line.
    pub fn parse(line: &str) -> ProtocolResult<InboundMessage> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (tag, body) = line.split_once(' ').unwrap_or((line, ""));

        match tag {
            "" => Err(ProtocolError::Empty),
            STATUS_TAG => StatusMessage::parse(body).map(InboundMessage::Status),
            REPLY_TAG => Ok(InboundMessage::Reply(body.to_string())),
            _ => Err(ProtocolError::UnexpectedTag(line.to_string())),
        }
    }

    /// Whether a raw line carries the reply tag, without decoding it.
    pub fn is_reply_line(line: &str) -> bool {
        line.split_once(' ').map(|(tag, _)| tag).unwrap_or(line) == REPLY_TAG
    }
}

/// Reply to a request, `<code> <detail...>`.
///
/// Code `0` is success; any other value is an application-level error whose
/// detail tokens are a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Status code returned by the gateway.
    pub code: i64,
    /// Remaining tokens joined by single spaces.
    pub detail: String,
}

impl Reply {
    /// Decode a reply body.
    pub fn parse(body: &str) -> ProtocolResult<Reply> {
        let mut tokens = body.split_whitespace();
        let code_token = tokens.next().ok_or(ProtocolError::MissingField {
            op: "reply",
            field: "code",
        })?;
        let code = code_token.parse().map_err(|_| ProtocolError::InvalidField {
            op: "reply",
            field: "code",
            value: code_token.to_string(),
        })?;
        let detail = tokens.collect::<Vec<_>>().join(" ");
        Ok(Reply { code, detail })
    }

    /// Check if the gateway reported success.
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            write!(f, "Success: {}", self.detail)
        } else {
            write!(f, "Error {}: {}", self.code, self.detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::NodeAddress;

    #[test]
    fn test_classify_status() {
        let message = InboundMessage::parse("sta address_book_capacity 3 8\r").unwrap();
        assert_eq!(
            message,
            InboundMessage::Status(StatusMessage::AddressBookCapacity { free: 3, total: 8 })
        );
    }

    #[test]
    fn test_classify_reply_keeps_body() {
        let message = InboundMessage::parse("rep 0 ok").unwrap();
        assert_eq!(message, InboundMessage::Reply("0 ok".to_string()));
        assert!(InboundMessage::is_reply_line("rep 0 ok"));
        assert!(!InboundMessage::is_reply_line("sta log rep"));
    }

    #[test]
    fn test_unexpected_tag() {
        assert_eq!(
            InboundMessage::parse("hello there"),
            Err(ProtocolError::UnexpectedTag("hello there".to_string()))
        );
        assert_eq!(InboundMessage::parse(""), Err(ProtocolError::Empty));
    }

    #[test]
    fn test_status_errors_propagate() {
        assert!(matches!(
            InboundMessage::parse("sta onoff 0001 x -50 1"),
            Err(ProtocolError::InvalidField { field: "ttl", .. })
        ));
        let ok = InboundMessage::parse("sta onoff 0001 1 -50 1").unwrap();
        assert!(matches!(
            ok,
            InboundMessage::Status(StatusMessage::OnOff { address: NodeAddress(1), .. })
        ));
    }

    #[test]
    fn test_reply_success() {
        let reply = Reply::parse("0 ok").unwrap();
        assert!(reply.is_success());
        assert_eq!(reply.detail, "ok");
        assert_eq!(reply.to_string(), "Success: ok");
    }

    #[test]
    fn test_reply_error() {
        let reply = Reply::parse("8 last request still pending").unwrap();
        assert_eq!(reply.code, 8);
        assert_eq!(reply.to_string(), "Error 8: last request still pending");
    }

    #[test]
    fn test_reply_malformed() {
        assert!(Reply::parse("").is_err());
        assert!(matches!(
            Reply::parse("ok 0"),
            Err(ProtocolError::InvalidField { field: "code", .. })
        ));
    }
}
