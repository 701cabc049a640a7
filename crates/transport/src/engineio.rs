//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Only the default namespace and text frames are supported. Every frame is
//! an Engine.IO packet type digit followed by its data; Socket.IO packets
//! ride inside Engine.IO `message` packets (`4`), so an event on the default
//! namespace looks like `42["task:created",{...}]`.

use agora_core::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters the server announces in its Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

fn default_ping_interval() -> u64 {
    25_000
}
fn default_ping_timeout() -> u64 {
    20_000
}

impl OpenInfo {
    /// Longest silence tolerated before the connection is considered dead.
    pub fn silence_limit(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Noop,
    /// Namespace connect (client request, or server acknowledgement with its payload)
    Connect(Option<Value>),
    Disconnect,
    Event { topic: String, payload: Value },
    ConnectError(String),
    /// Frames this client does not act on (acks, binary events, other namespaces)
    Other(String),
}

impl Packet {
    pub fn event(topic: impl Into<String>, payload: Value) -> Self {
        Self::Event {
            topic: topic.into(),
            payload,
        }
    }

    pub fn decode(frame: &str) -> Result<Self, TransportError> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TransportError::Decode("empty frame".into()))?;
        let rest = chars.as_str();

        match kind {
            '0' => serde_json::from_str(rest)
                .map(Packet::Open)
                .map_err(|e| TransportError::Decode(format!("bad open packet: {e}"))),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '6' => Ok(Packet::Noop),
            '4' => Self::decode_socket(rest),
            other => Err(TransportError::Decode(format!(
                "unknown engine packet type '{other}'"
            ))),
        }
    }

    fn decode_socket(data: &str) -> Result<Self, TransportError> {
        let mut chars = data.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TransportError::Decode("empty socket packet".into()))?;
        let rest = chars.as_str();

        if rest.starts_with('/') {
            return Ok(Packet::Other(format!("4{data}")));
        }

        match kind {
            '0' => {
                if rest.is_empty() {
                    Ok(Packet::Connect(None))
                } else {
                    serde_json::from_str(rest)
                        .map(|v| Packet::Connect(Some(v)))
                        .map_err(|e| TransportError::Decode(format!("bad connect packet: {e}")))
                }
            }
            '1' => Ok(Packet::Disconnect),
            '2' => {
                // Optional ack id precedes the argument array.
                let args = rest.trim_start_matches(|c: char| c.is_ascii_digit());
                let mut values: Vec<Value> = serde_json::from_str(args)
                    .map_err(|e| TransportError::Decode(format!("bad event packet: {e}")))?;
                if values.is_empty() {
                    return Err(TransportError::Decode("event without a name".into()));
                }
                let payload = if values.len() > 1 {
                    values.swap_remove(1)
                } else {
                    Value::Null
                };
                match values.swap_remove(0) {
                    Value::String(topic) => Ok(Packet::Event { topic, payload }),
                    other => Err(TransportError::Decode(format!(
                        "event name must be a string, got {other}"
                    ))),
                }
            }
            '4' => {
                let message = serde_json::from_str::<Value>(rest)
                    .ok()
                    .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                    .unwrap_or_else(|| rest.to_string());
                Ok(Packet::ConnectError(message))
            }
            _ => Ok(Packet::Other(format!("4{data}"))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Packet::Open(info) => {
                format!("0{}", serde_json::to_string(info).unwrap_or_default())
            }
            Packet::Close => "1".into(),
            Packet::Ping => "2".into(),
            Packet::Pong => "3".into(),
            Packet::Noop => "6".into(),
            Packet::Connect(None) => "40".into(),
            Packet::Connect(Some(data)) => format!("40{data}"),
            Packet::Disconnect => "41".into(),
            Packet::Event { topic, payload } => {
                let args = if payload.is_null() {
                    serde_json::json!([topic])
                } else {
                    serde_json::json!([topic, payload])
                };
                format!("42{args}")
            }
            Packet::ConnectError(message) => {
                format!("44{}", serde_json::json!({ "message": message }))
            }
            Packet::Other(raw) => raw.clone(),
        }
    }
}

/// Turn a platform base URL into its Socket.IO websocket endpoint.
pub fn socket_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}/socket.io/?EIO=4&transport=websocket")
}
