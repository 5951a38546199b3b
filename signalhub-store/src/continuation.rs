use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Opaque pagination cursor. Encodes the `(timestamp, id)` of the last item
/// returned, matching the Store's primary ordering (spec §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    pub after_timestamp: DateTime<Utc>,
    pub after_id: Uuid,
}

impl Continuation {
    pub fn encode(&self) -> String {
        let raw = format!(
            "{}|{}",
            self.after_timestamp.timestamp_micros(),
            self.after_id
        );
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(token: &str) -> StoreResult<Continuation> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| StoreError::InvalidContinuation)?;
        let raw = String::from_utf8(raw).map_err(|_| StoreError::InvalidContinuation)?;
        let (ts, id) = raw.split_once('|').ok_or(StoreError::InvalidContinuation)?;
        let ts: i64 = ts.parse().map_err(|_| StoreError::InvalidContinuation)?;
        let after_timestamp =
            DateTime::from_timestamp_micros(ts).ok_or(StoreError::InvalidContinuation)?;
        let after_id = Uuid::parse_str(id).map_err(|_| StoreError::InvalidContinuation)?;
        Ok(Continuation {
            after_timestamp,
            after_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let c = Continuation {
            after_timestamp: Utc::now(),
            after_id: Uuid::now_v7(),
        };
        let token = c.encode();
        let back = Continuation::decode(&token).unwrap();
        assert_eq!(c.after_timestamp.timestamp_micros(), back.after_timestamp.timestamp_micros());
        assert_eq!(c.after_id, back.after_id);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Continuation::decode("not-a-token").is_err());
    }
}
