//! Module `messages`
//!
//! Inbound messages as the relay understands them, and the events the
//! relay itself emits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kinds the relay generates itself. Clients may not send these.
pub const RELAY_KINDS: [&str; 3] = ["clients", "user-joined", "user-left"];

/// Negotiation kinds every client is expected to send. They must carry a `target`.
pub const SIGNAL_KINDS: [&str; 3] = ["offer", "answer", "ice-candidate"];

/// A message received from a client.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    /// Claim an identity for this connection.
    Register { client_id: String },
    /// Anything carrying a `target`; forwarded untouched apart from `from`.
    Addressed(Addressed),
    /// Well-formed, but neither a registration nor addressed.
    Unrecognized { kind: String },
}

/// An addressed message, kept as the raw JSON object so the payload
/// passes through exactly as the sender wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct Addressed {
    kind: String,
    target: String,
    body: Map<String, Value>,
}

impl Addressed {
    pub(crate) fn new(kind: String, target: String, body: Map<String, Value>) -> Self {
        Self { kind, target, body }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Overwrite `from` with the sender identity and encode for the wire.
    /// Whatever the sender put in `from` is discarded.
    pub fn stamped(mut self, from: &str) -> String {
        self.body
            .insert("from".to_string(), Value::String(from.to_string()));
        Value::Object(self.body).to_string()
    }
}

/// Events produced by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Outbound {
    /// Sent once to a client right after it registers.
    Clients { clients: Vec<String> },
    UserJoined {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    UserLeft {
        #[serde(rename = "clientId")]
        client_id: String,
    },
}

impl Outbound {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clients_event_shape() {
        let event = Outbound::Clients {
            clients: vec!["teacher_7_1000".into()],
        };
        let value: Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "clients", "clients": ["teacher_7_1000"]})
        );
    }

    #[test]
    fn join_and_leave_use_client_id() {
        let joined = Outbound::UserJoined {
            client_id: "student_3_2000".into(),
        };
        let left = Outbound::UserLeft {
            client_id: "student_3_2000".into(),
        };
        let joined: Value = serde_json::from_str(&joined.encode().unwrap()).unwrap();
        let left: Value = serde_json::from_str(&left.encode().unwrap()).unwrap();
        assert_eq!(
            joined,
            json!({"type": "user-joined", "clientId": "student_3_2000"})
        );
        assert_eq!(
            left,
            json!({"type": "user-left", "clientId": "student_3_2000"})
        );
    }

    #[test]
    fn stamping_overwrites_claimed_sender() {
        let body = json!({
            "type": "answer",
            "target": "a",
            "from": "mallory",
            "answer": {"sdp": "v=0", "type": "answer"}
        });
        let Value::Object(body) = body else {
            unreachable!()
        };
        let msg = Addressed::new("answer".into(), "a".into(), body);
        let out: Value = serde_json::from_str(&msg.stamped("b")).unwrap();
        assert_eq!(out["from"], "b");
        assert_eq!(out["answer"]["sdp"], "v=0");
        assert_eq!(out["target"], "a");
    }
}
