//! # Domain Types and Constants
//!
//! The wire contract carries clock readings as [`proto::TimeResult`], with the
//! event id as a string and the time as a protobuf `Timestamp`. Clients work
//! with the decoded [`TimeEvent`] instead, so a malformed payload is rejected
//! once at the edge rather than at every use.
//!
//! ## Constants
//!
//! - [`DEFAULT_PORT`] - port the server listens on unless configured otherwise
//! - [`DEFAULT_ADDRESS`] - address the harness dials unless configured
//!   otherwise

use crate::{RpcError, proto};
use std::time::SystemTime;
use tonic::Code;
use uuid::Uuid;

/// Port the server binds by default.
pub const DEFAULT_PORT: u16 = 10042;

/// Address clients dial by default.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:10042";

/// A single clock reading produced by the server.
///
/// `id` is unique per event. Within one subscription, `time` never goes
/// backwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeEvent {
    pub id: Uuid,
    pub time: SystemTime,
}

impl TimeEvent {
    /// Creates an event stamped with `time` and a fresh random id.
    pub fn new(time: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            time,
        }
    }
}

impl From<TimeEvent> for proto::TimeResult {
    fn from(event: TimeEvent) -> Self {
        Self {
            id: event.id.hyphenated().to_string(),
            time: Some(event.time.into()),
        }
    }
}

impl TryFrom<proto::TimeResult> for TimeEvent {
    type Error = RpcError;

    fn try_from(result: proto::TimeResult) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&result.id).map_err(|e| {
            RpcError::transport(Code::Internal, format!("malformed event id: {e}"))
        })?;
        let timestamp = result
            .time
            .ok_or_else(|| RpcError::transport(Code::Internal, "event is missing its time"))?;
        let time = SystemTime::try_from(timestamp).map_err(|e| {
            RpcError::transport(Code::Internal, format!("malformed event time: {e}"))
        })?;

        Ok(Self { id, time })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn decodes_what_the_server_encodes() {
        let event = TimeEvent::new(SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_123));
        let decoded = TimeEvent::try_from(proto::TimeResult::from(event)).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn rejects_malformed_payloads() {
        let missing_time = proto::TimeResult {
            id: Uuid::new_v4().to_string(),
            time: None,
        };
        assert!(matches!(
            TimeEvent::try_from(missing_time),
            Err(RpcError::Transport {
                code: Code::Internal,
                ..
            })
        ));

        let bad_id = proto::TimeResult {
            id: "not-a-uuid".into(),
            time: Some(SystemTime::now().into()),
        };
        assert!(TimeEvent::try_from(bad_id).is_err());
    }

    #[test]
    fn ids_are_unique_per_event() {
        let now = SystemTime::now();
        assert_ne!(TimeEvent::new(now).id, TimeEvent::new(now).id);
    }
}
