//! Signaling message parsing
//!
//! Turns a raw frame into an [`Inbound`] message. Only the routing fields
//! (`type`, `clientId`, `target`) are looked at; the payload is opaque.

use serde_json::Value;

use crate::error::MessageError;
use crate::protocol::messages::{Addressed, Inbound, RELAY_KINDS, SIGNAL_KINDS};

/// Parse a text frame.
pub fn parse_message(raw: &str) -> Result<Inbound, MessageError> {
    let body = match serde_json::from_str::<Value>(raw)? {
        Value::Object(body) => body,
        _ => return Err(MessageError::NotAnObject),
    };

    let kind = match body.get("type").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        None => return Err(MessageError::MissingType),
    };

    if kind == "register" {
        return match non_empty_str(&body, "clientId") {
            Some(client_id) => Ok(Inbound::Register { client_id }),
            None => Err(MessageError::MissingField("clientId")),
        };
    }

    if RELAY_KINDS.contains(&kind.as_str()) {
        return Ok(Inbound::Unrecognized { kind });
    }

    match non_empty_str(&body, "target") {
        Some(target) => Ok(Inbound::Addressed(Addressed::new(kind, target, body))),
        None if SIGNAL_KINDS.contains(&kind.as_str()) => Err(MessageError::MissingField("target")),
        None => Ok(Inbound::Unrecognized { kind }),
    }
}

/// Parse a binary frame holding UTF-8 JSON.
pub fn parse_binary(raw: &[u8]) -> Result<Inbound, MessageError> {
    let text = std::str::from_utf8(raw).map_err(|_| MessageError::InvalidUtf8)?;
    parse_message(text)
}

fn non_empty_str(body: &serde_json::Map<String, Value>, field: &str) -> Option<String> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_register() {
        assert_eq!(
            parse_message(r#"{"type":"register","clientId":"teacher_7_1000"}"#).unwrap(),
            Inbound::Register {
                client_id: "teacher_7_1000".to_string()
            }
        );
    }

    #[test]
    fn test_register_needs_client_id() {
        for raw in [
            r#"{"type":"register"}"#,
            r#"{"type":"register","clientId":""}"#,
            r#"{"type":"register","clientId":42}"#,
        ] {
            assert!(matches!(
                parse_message(raw),
                Err(MessageError::MissingField("clientId"))
            ));
        }
    }

    #[test]
    fn test_parse_signal_kinds() {
        for kind in ["offer", "answer", "ice-candidate"] {
            let raw = format!(r#"{{"type":"{kind}","target":"student_3_2000","x":1}}"#);
            match parse_message(&raw).unwrap() {
                Inbound::Addressed(msg) => {
                    assert_eq!(msg.kind(), kind);
                    assert_eq!(msg.target(), "student_3_2000");
                }
                other => panic!("expected addressed message, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_signal_without_target_is_malformed() {
        assert!(matches!(
            parse_message(r#"{"type":"offer","offer":{}}"#),
            Err(MessageError::MissingField("target"))
        ));
    }

    #[test]
    fn test_custom_kind_with_target_is_addressed() {
        let parsed = parse_message(r#"{"type":"hang-up","target":"a"}"#).unwrap();
        assert!(matches!(parsed, Inbound::Addressed(ref m) if m.kind() == "hang-up"));
    }

    #[test]
    fn test_unrecognized_kinds() {
        assert_eq!(
            parse_message(r#"{"type":"ping"}"#).unwrap(),
            Inbound::Unrecognized {
                kind: "ping".to_string()
            }
        );
        // relay-generated kinds are never forwarded, even with a target
        assert_eq!(
            parse_message(r#"{"type":"user-left","clientId":"x","target":"y"}"#).unwrap(),
            Inbound::Unrecognized {
                kind: "user-left".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            parse_message("not json"),
            Err(MessageError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_message("[1,2,3]"),
            Err(MessageError::NotAnObject)
        ));
        assert!(matches!(
            parse_message(r#"{"clientId":"a"}"#),
            Err(MessageError::MissingType)
        ));
        assert!(matches!(
            parse_message(r#"{"type":7}"#),
            Err(MessageError::MissingType)
        ));
    }

    #[test]
    fn test_parse_binary() {
        assert!(matches!(
            parse_binary(br#"{"type":"register","clientId":"a"}"#),
            Ok(Inbound::Register { .. })
        ));
        assert!(matches!(
            parse_binary(&[0xff, 0xfe]),
            Err(MessageError::InvalidUtf8)
        ));
    }
}
