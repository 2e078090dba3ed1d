//! Parameter introspection and validation.
//!
//! Definitions are fetched from both the `property` and `actions` sections
//! of a job payload (older plugin versions only populate the latter) and
//! deduplicated by name. Validation is pure: it never touches the network
//! and never mutates the supplied map, so it can be called speculatively
//! before a trigger.

use jenky_api::JenkinsClient;
use jenky_types::{
    Error, JobParameter, ParameterKind, ParameterMap, ParameterTypeError, ParameterValue, Result, ValidationReport,
};
use serde_json::Value;
use tracing::debug;

const PARAMETER_TREE: &str = "property[parameterDefinitions[name,type,defaultParameterValue[value],choices]],\
actions[parameterDefinitions[name,type,defaultParameterValue[value],choices]]";

/// Fetch a job's declared parameter definitions.
pub async fn get_parameters(client: &JenkinsClient, job_full_name: &str) -> Result<Vec<JobParameter>> {
    let path = jenky_api::job_path(job_full_name);
    let (status, value) = client.get_json(&format!("{path}/api/json?tree={PARAMETER_TREE}")).await?;
    if status.as_u16() == 404 {
        return Err(Error::job_not_found(job_full_name, client.server_name()));
    }

    let mut parameters: Vec<JobParameter> = Vec::new();
    for section in ["property", "actions"] {
        for container in value.get(section).and_then(Value::as_array).into_iter().flatten() {
            for definition in container
                .get("parameterDefinitions")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let parameter = parse_parameter(definition);
                if !parameters.iter().any(|existing| existing.name == parameter.name) {
                    parameters.push(parameter);
                }
            }
        }
    }

    debug!(job = %job_full_name, count = parameters.len(), "parameters introspected");
    Ok(parameters)
}

/// Validate supplied values against declared parameters.
///
/// A parameter with no default and no supplied value is missing. A `Choice`
/// value must be one of the declared choices; a `Boolean` value must coerce
/// to true/false. All other kinds accept any scalar. Excess supplied keys
/// are tolerated here; the lifecycle layer warns about them.
pub fn validate(parameters: &[JobParameter], supplied: &ParameterMap) -> ValidationReport {
    let mut missing = Vec::new();
    let mut type_errors = Vec::new();

    for parameter in parameters {
        match supplied.get(&parameter.name) {
            None => {
                if parameter.default.is_none() {
                    missing.push(parameter.name.clone());
                }
            }
            Some(value) => match parameter.kind {
                ParameterKind::Choice => {
                    let choices = parameter.choices.as_deref().unwrap_or(&[]);
                    let supplied_value = value.as_form_value();
                    if !choices.iter().any(|choice| *choice == supplied_value) {
                        type_errors.push(ParameterTypeError {
                            name: parameter.name.clone(),
                            reason: format!(
                                "value '{supplied_value}' is not one of the declared choices [{}]",
                                choices.join(", ")
                            ),
                        });
                    }
                }
                ParameterKind::Boolean => {
                    if !value.coerces_to_bool() {
                        type_errors.push(ParameterTypeError {
                            name: parameter.name.clone(),
                            reason: format!("value '{}' is not coercible to a boolean", value.as_form_value()),
                        });
                    }
                }
                ParameterKind::String | ParameterKind::Text | ParameterKind::Password | ParameterKind::Other => {}
            },
        }
    }

    ValidationReport {
        ok: missing.is_empty() && type_errors.is_empty(),
        missing,
        type_errors,
    }
}

fn parse_parameter(definition: &Value) -> JobParameter {
    let raw_type = definition.get("type").and_then(Value::as_str).unwrap_or_default();
    let kind = ParameterKind::from_definition_type(raw_type);
    let choices = definition.get("choices").and_then(Value::as_array).map(|choices| {
        choices
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect::<Vec<String>>()
    });
    let mut default = definition
        .get("defaultParameterValue")
        .and_then(|default| default.get("value"))
        .cloned()
        .and_then(ParameterValue::from_json);

    // A choice parameter with no declared default defaults to its first
    // choice, which is what the server submits when none is supplied.
    if kind == ParameterKind::Choice && default.is_none() {
        default = choices
            .as_ref()
            .and_then(|choices| choices.first())
            .map(|first| ParameterValue::Str(first.clone()));
    }

    JobParameter {
        name: definition
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        kind,
        raw_type: raw_type.to_string(),
        default,
        choices,
    }
}
