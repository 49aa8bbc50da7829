use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Error;

/// Identifier of a chat session.
///
/// New ids are derived from the creation time as `<unix seconds>.<microseconds>`, so they
/// sort chronologically and are unique for a single local process.  Ids typed by a user are
/// restricted to ASCII alphanumerics, `.`, `-` and `_` because they become part of file names
/// in the transcript store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChatSessionId(String);

impl ChatSessionId {
    /// Generates an id from the current wall-clock time.
    pub fn generate() -> Self {
        Self::from_time(OffsetDateTime::now_utc())
    }

    /// Generates the id a session created at `when` would receive.
    pub fn from_time(when: OffsetDateTime) -> Self {
        Self(format!(
            "{}.{:06}",
            when.unix_timestamp(),
            when.microsecond()
        ))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChatSessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::validation(
                "session id must not be empty",
                Some("session".to_string()),
            ));
        }
        if s.starts_with('.')
            || !s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(Error::validation(
                format!("invalid session id: {s}"),
                Some("session".to_string()),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ChatSessionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChatSessionId> for String {
    fn from(id: ChatSessionId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn id_from_time() {
        let id = ChatSessionId::from_time(datetime!(2024-03-01 12:00:00.25 UTC));
        assert_eq!(id.as_str(), "1709294400.250000");
    }

    #[test]
    fn generated_ids_parse_back() {
        let id = ChatSessionId::generate();
        let parsed: ChatSessionId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_path_like_ids() {
        assert!("../etc/passwd".parse::<ChatSessionId>().is_err());
        assert!("a/b".parse::<ChatSessionId>().is_err());
        assert!(".hidden".parse::<ChatSessionId>().is_err());
        assert!("   ".parse::<ChatSessionId>().is_err());
    }

    #[test]
    fn serde_is_a_plain_string() {
        let id: ChatSessionId = "1700000000.000001".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1700000000.000001\"");
        assert!(serde_json::from_str::<ChatSessionId>("\"x/y\"").is_err());
    }
}
