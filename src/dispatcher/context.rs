use serde::Serialize;
use serde_json::{json, Value};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::definition::Stage;
use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::router::{MatchResult, NoMatch, Routable};

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Output headers; names are shared `Arc<str>` as in [`ParamVec`](crate::router::ParamVec)
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Value produced by a pipeline run
///
/// HTTP callers read `status` directly; CLI callers use
/// [`exit_code`](Output::exit_code).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
}

impl Default for Output {
    fn default() -> Self {
        Self::new(200, Value::Null)
    }
}

impl Output {
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body,
        }
    }

    /// JSON output with a `content-type` header
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut output = Self::new(status, body);
        output
            .headers
            .push((Arc::from("content-type"), "application/json".to_string()));
        output
    }

    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }

    /// Default `not-matched` output: 404, or 405 with an `allow` header when
    /// the input matched under other methods.
    #[must_use]
    pub fn not_matched(miss: &NoMatch, input: &str) -> Self {
        if miss.method_not_allowed() {
            let allow = miss
                .allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let mut output = Self::json(
                405,
                json!({ "error": "Method Not Allowed", "input": input, "allowed": allow }),
            );
            output.set_header("allow", allow);
            output
        } else {
            Self::json(404, json!({ "error": "Not Found", "input": input }))
        }
    }

    /// Default `throwable-caught` output for a request-time failure
    #[must_use]
    pub fn from_error(error: &DispatchError) -> Self {
        let (status, kind) = match error {
            DispatchError::ParameterCast(_) => (400, "parameter_cast"),
            DispatchError::InvalidInput(_) => (400, "invalid_input"),
            DispatchError::Target { .. } => (500, "target"),
            DispatchError::UnknownMiddleware { .. } => (500, "unknown_middleware"),
            DispatchError::Middleware { .. } => (500, "middleware"),
        };
        Self::json(status, json!({ "error": error.to_string(), "kind": kind }))
    }

    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// Process exit code for CLI callers: `0` on success, `2` for input the
    /// router rejected (400, 404, 405), `1` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.status {
            s if (200..400).contains(&s) => 0,
            400 | 404 | 405 => 2,
            _ => 1,
        }
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive)
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// Mutable state threaded through one pipeline run
#[derive(Debug)]
pub struct Context<D: Routable> {
    pub request_id: RequestId,
    pub input: D::Input,
    /// Set once the router matched the input
    pub matched: Option<MatchResult<D>>,
    /// Set when the router found nothing
    pub no_match: Option<NoMatch>,
    /// Set when the run diverted into `throwable-caught`
    pub error: Option<DispatchError>,
    /// Stage currently executing
    pub stage: Stage,
    /// Every stage entered, in order
    pub trail: Vec<Stage>,
    /// First stage that returned without reaching its core action
    pub short_circuit: Option<Stage>,
    /// Free-form values middleware can hand to each other
    pub attributes: BTreeMap<String, Value>,
}

impl<D: Routable> Context<D> {
    pub fn new(input: D::Input) -> Self {
        Self::with_request_id(input, RequestId::new())
    }

    pub fn with_request_id(input: D::Input, request_id: RequestId) -> Self {
        Self {
            request_id,
            input,
            matched: None,
            no_match: None,
            error: None,
            stage: Stage::Received,
            trail: Vec::with_capacity(4),
            short_circuit: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Name of the matched definition, if any
    #[must_use]
    pub fn matched_name(&self) -> Option<&str> {
        self.matched.as_ref().map(MatchResult::name)
    }

    /// Whether the run entered `stage`
    #[must_use]
    pub fn visited(&self, stage: Stage) -> bool {
        self.trail.contains(&stage)
    }
}
