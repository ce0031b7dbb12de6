use serde_json::json;

use crate::definition::TargetRef;
use crate::dispatcher::{Arguments, Container, Output};
use crate::error::BoxError;

/// Container that answers every target by echoing it back with its arguments
///
/// Lets the CLI `request` and `run` subcommands exercise the full pipeline without real
/// handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoContainer;

impl Container for EchoContainer {
    fn invoke(&self, target: &TargetRef, arguments: &Arguments) -> Result<Output, BoxError> {
        Ok(Output::ok(json!({
            "target": target.as_str(),
            "arguments": arguments,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_returns_target_and_arguments() {
        let args = Arguments::from([("id".to_string(), json!(7))]);
        let out = EchoContainer.invoke(&TargetRef::new("Users::show"), &args).unwrap();
        assert_eq!(out.status, 200);
        assert_eq!(out.body, json!({"target": "Users::show", "arguments": {"id": 7}}));
    }
}
