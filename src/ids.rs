use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Identifier of one pipeline run, attached to every [`Context`](crate::dispatcher::Context)
/// and to the log lines of that run.
///
/// Backed by a ULID, so ids sort by creation time. Serialized as its
/// 26-character string form.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RequestId(Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Reuse an id supplied by the caller (e.g. a correlation header or an
    /// environment variable) when it parses, otherwise start a new one.
    #[must_use]
    pub fn parse_or_new(supplied: Option<&str>) -> Self {
        supplied
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or_default()
    }

    /// Creation time, milliseconds since the Unix epoch
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Ulid> for RequestId {
    fn from(id: Ulid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0.to_string()
    }
}

impl TryFrom<String> for RequestId {
    type Error = ulid::DecodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse_round_trip() {
        let id = RequestId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 26);
        assert_eq!(text.parse::<RequestId>().unwrap(), id);
    }

    #[test]
    fn test_parse_or_new() {
        let id = RequestId::new();
        assert_eq!(RequestId::parse_or_new(Some(&id.to_string())), id);
        assert_ne!(RequestId::parse_or_new(Some("not-a-ulid")), id);
        assert_ne!(RequestId::parse_or_new(None), id);
    }

    #[test]
    fn test_serde_uses_string_form() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        assert_eq!(serde_json::from_str::<RequestId>(&json).unwrap(), id);
        assert!(serde_json::from_str::<RequestId>("\"nope\"").is_err());
    }

    #[test]
    fn test_ids_sort_by_creation() {
        let first = RequestId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = RequestId::new();
        assert!(first < second);
        assert!(first.timestamp_ms() <= second.timestamp_ms());
    }
}
