//! Addressable entry state.
//!
//! A client inside a room can be described by a short query string such as
//! `room=4f1c…&code=K7MQ2Z&host=1`. Putting it in a link or a URL lets a
//! reload (or a second tab) resume the same session.

use std::fmt;
use std::str::FromStr;

use turnroom_protocol::{DEFAULT_CODE_LENGTH, RoomCode, RoomId};
use url::form_urlencoded;

use crate::SessionError;

/// Which room a client is in, and whether it entered as host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub room_id: RoomId,
    pub code: RoomCode,
    pub is_host: bool,
}

impl SessionEntry {
    pub fn new(room_id: RoomId, code: RoomCode, is_host: bool) -> Self {
        Self {
            room_id,
            code,
            is_host,
        }
    }

    /// Renders `room=<id>&code=<code>&host=<0|1>`, form-urlencoded.
    pub fn to_query(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("room", self.room_id.as_str())
            .append_pair("code", self.code.as_str())
            .append_pair("host", if self.is_host { "1" } else { "0" })
            .finish()
    }

    /// Parses a query string, with or without a leading `?`, for rooms
    /// whose codes have `code_length` symbols.
    ///
    /// `room` and `code` are required; `host` defaults to `0`. Unknown
    /// keys are ignored. Values are percent-decoded.
    ///
    /// # Errors
    /// [`SessionError::InvalidEntry`] if a required key is missing or a
    /// value is malformed.
    pub fn from_query(query: &str, code_length: usize) -> Result<Self, SessionError> {
        let mut room_id = None;
        let mut code = None;
        let mut is_host = false;

        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "room" if !value.is_empty() => room_id = Some(RoomId::new(value.into_owned())),
                "room" => return Err(SessionError::InvalidEntry("empty room id".into())),
                "code" => {
                    let parsed = RoomCode::parse(&value, code_length)
                        .map_err(|e| SessionError::InvalidEntry(e.to_string()))?;
                    code = Some(parsed);
                }
                "host" => {
                    is_host = match value.as_ref() {
                        "1" | "true" => true,
                        "0" | "false" | "" => false,
                        other => {
                            return Err(SessionError::InvalidEntry(format!(
                                "host must be 0 or 1, got {other:?}"
                            )));
                        }
                    }
                }
                _ => {}
            }
        }

        let room_id = room_id.ok_or_else(|| SessionError::InvalidEntry("missing room".into()))?;
        let code = code.ok_or_else(|| SessionError::InvalidEntry("missing code".into()))?;
        Ok(Self::new(room_id, code, is_host))
    }
}

impl fmt::Display for SessionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query())
    }
}

impl FromStr for SessionEntry {
    type Err = SessionError;

    /// Parses a query string for codes of [`DEFAULT_CODE_LENGTH`] symbols.
    /// See [`SessionEntry::from_query`].
    fn from_str(query: &str) -> Result<Self, Self::Err> {
        Self::from_query(query, DEFAULT_CODE_LENGTH)
    }
}
