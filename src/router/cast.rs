use serde_json::Value;

use crate::definition::Parameter;
use crate::error::ParameterCastError;

/// Run one raw capture through the parameter's caster.
pub(crate) fn cast_value(param: &Parameter, raw: &str) -> Result<Value, ParameterCastError> {
    param.caster.cast(raw).ok_or_else(|| ParameterCastError {
        parameter: param.name.clone(),
        value: raw.to_string(),
        caster: param.caster,
    })
}

/// Cast every value of a repeatable capture into a JSON array.
pub(crate) fn cast_values<'a>(
    param: &Parameter,
    raw: impl IntoIterator<Item = &'a str>,
) -> Result<Value, ParameterCastError> {
    raw.into_iter()
        .map(|value| cast_value(param, value))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}
