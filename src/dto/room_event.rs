//! Wire representation of the room event log.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

/// Server-assigned, monotonic event identifier.
pub type EventId = i64;
/// Identifier of a room.
pub type RoomId = i64;

/// Immutable, server-ordered entry of a room's event log.
///
/// `kind` and `payload` are kept raw here; they are checked when the event is
/// decoded into a [`RoomEventBody`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomEvent {
    /// Monotonic identifier, unique across the log.
    pub id: EventId,
    /// RFC 3339 creation time.
    pub timestamp: String,
    /// Room the event belongs to.
    pub room_id: RoomId,
    /// Event type, e.g. `join` or `choose_clue`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload.
    #[schema(value_type = Object)]
    pub payload: Value,
}

/// Known event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomEventType {
    /// A player entered the room.
    Join,
    /// A player renamed themselves.
    ChangeName,
    /// The current round was started.
    StartRound,
    /// The player with board control picked a clue.
    ChooseClue,
}

impl RoomEventType {
    /// Wire name of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            RoomEventType::Join => "join",
            RoomEventType::ChangeName => "change_name",
            RoomEventType::StartRound => "start_round",
            RoomEventType::ChooseClue => "choose_clue",
        }
    }
}

impl fmt::Display for RoomEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when an event type string is not one of [`RoomEventType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown room event type `{0}`")]
pub struct UnknownEventType(pub String);

impl FromStr for RoomEventType {
    type Err = UnknownEventType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "join" => Ok(RoomEventType::Join),
            "change_name" => Ok(RoomEventType::ChangeName),
            "start_round" => Ok(RoomEventType::StartRound),
            "choose_clue" => Ok(RoomEventType::ChooseClue),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

/// Payload of `join` and `change_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPayload {
    /// Player identifier.
    pub user_id: String,
    /// Display name.
    pub name: String,
}

/// Payload of `start_round`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRoundPayload {
    /// Round being started.
    pub round: usize,
}

/// Payload of `choose_clue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChooseCluePayload {
    /// Player who picked the clue.
    pub user_id: String,
    /// Clue index within its category. Negative values are dropped, not rejected.
    pub i: i64,
    /// Category index.
    pub j: i64,
}

/// Typed body of a room event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEventBody {
    /// `join`
    Join(PlayerPayload),
    /// `change_name`
    ChangeName(PlayerPayload),
    /// `start_round`
    StartRound(StartRoundPayload),
    /// `choose_clue`
    ChooseClue(ChooseCluePayload),
}

/// Reasons a raw event cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The `type` field is not a known event type.
    #[error(transparent)]
    UnknownType(#[from] UnknownEventType),
    /// The payload does not carry the fields required by its type.
    #[error("malformed `{kind}` payload: {reason}")]
    MalformedPayload {
        /// Declared type of the event.
        kind: RoomEventType,
        /// Deserializer message describing the mismatch.
        reason: String,
    },
}

impl RoomEventBody {
    /// Decode a raw `type` + `payload` pair. Extra payload fields are ignored.
    pub fn decode(kind: &str, payload: &Value) -> Result<Self, DecodeError> {
        let kind: RoomEventType = kind.parse()?;
        let malformed = |err: serde_json::Error| DecodeError::MalformedPayload {
            kind,
            reason: err.to_string(),
        };

        let body = match kind {
            RoomEventType::Join => RoomEventBody::Join(parse(payload).map_err(malformed)?),
            RoomEventType::ChangeName => {
                RoomEventBody::ChangeName(parse(payload).map_err(malformed)?)
            }
            RoomEventType::StartRound => {
                RoomEventBody::StartRound(parse(payload).map_err(malformed)?)
            }
            RoomEventType::ChooseClue => {
                RoomEventBody::ChooseClue(parse(payload).map_err(malformed)?)
            }
        };

        Ok(body)
    }

    /// Event type of this body.
    pub fn kind(&self) -> RoomEventType {
        match self {
            RoomEventBody::Join(_) => RoomEventType::Join,
            RoomEventBody::ChangeName(_) => RoomEventType::ChangeName,
            RoomEventBody::StartRound(_) => RoomEventType::StartRound,
            RoomEventBody::ChooseClue(_) => RoomEventType::ChooseClue,
        }
    }

    /// Encode the payload as it is persisted in the log.
    pub fn payload(&self) -> serde_json::Result<Value> {
        match self {
            RoomEventBody::Join(payload) | RoomEventBody::ChangeName(payload) => {
                serde_json::to_value(payload)
            }
            RoomEventBody::StartRound(payload) => serde_json::to_value(payload),
            RoomEventBody::ChooseClue(payload) => serde_json::to_value(payload),
        }
    }
}

impl RoomEvent {
    /// Decode the typed body of this event.
    pub fn body(&self) -> Result<RoomEventBody, DecodeError> {
        RoomEventBody::decode(&self.kind, &self.payload)
    }
}

fn parse<T: serde::de::DeserializeOwned>(payload: &Value) -> serde_json::Result<T> {
    T::deserialize(payload)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn room_event_uses_camel_case_wire_names() {
        let event: RoomEvent = serde_json::from_value(json!({
            "id": 7,
            "timestamp": "2024-01-01T00:00:00Z",
            "roomId": 3,
            "type": "join",
            "payload": { "userId": "a", "name": "Alice" }
        }))
        .unwrap();

        assert_eq!(event.id, 7);
        assert_eq!(event.room_id, 3);
        assert_eq!(event.kind, "join");
        assert_eq!(
            event.body().unwrap(),
            RoomEventBody::Join(PlayerPayload {
                user_id: "a".into(),
                name: "Alice".into()
            })
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = RoomEventBody::decode("buzz", &json!({})).unwrap_err();
        assert_eq!(err, DecodeError::UnknownType(UnknownEventType("buzz".into())));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let err = RoomEventBody::decode("choose_clue", &json!({ "userId": "a", "i": 0 }))
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MalformedPayload {
                kind: RoomEventType::ChooseClue,
                ..
            }
        ));

        assert!(RoomEventBody::decode("start_round", &Value::Null).is_err());
        assert!(
            RoomEventBody::decode("choose_clue", &json!({ "userId": "a", "i": 0.5, "j": 0 }))
                .is_err()
        );
    }

    #[test]
    fn negative_indices_still_decode() {
        let body = RoomEventBody::decode("choose_clue", &json!({ "userId": "a", "i": -1, "j": 0 }))
            .unwrap();
        assert_eq!(
            body,
            RoomEventBody::ChooseClue(ChooseCluePayload {
                user_id: "a".into(),
                i: -1,
                j: 0,
            })
        );
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let body =
            RoomEventBody::decode("start_round", &json!({ "round": 2, "by": "a" })).unwrap();
        assert_eq!(body, RoomEventBody::StartRound(StartRoundPayload { round: 2 }));
    }

    #[test]
    fn payload_encoding_matches_decoding() {
        let body = RoomEventBody::ChooseClue(ChooseCluePayload {
            user_id: "a".into(),
            i: 1,
            j: 0,
        });
        let payload = body.payload().unwrap();
        assert_eq!(payload, json!({ "userId": "a", "i": 1, "j": 0 }));
        assert_eq!(RoomEventBody::decode(body.kind().as_str(), &payload).unwrap(), body);
    }
}
