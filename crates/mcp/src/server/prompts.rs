//! Scenario and build-analysis prompts.

use jenky_engine::{Engine, scenario};
use rmcp::model::{
    ErrorData, GetPromptResult, ListPromptsResult, Prompt, PromptArgument, PromptMessage, PromptMessageRole,
};
use serde_json::{Map, Value};

/// List the prompts exposed by the server.
pub fn list_prompts() -> ListPromptsResult {
    ListPromptsResult::with_all_items(vec![
        prompt_definition(
            "scenario_selection",
            "Present the configured deployment scenarios for the user to pick from.",
            vec![],
        ),
        prompt_definition(
            "scenario_guidance",
            "Render the operation guidance configured for one scenario.",
            vec![required_argument("scenario", "Scenario name or 1-based index")],
        ),
        prompt_definition(
            "build_result_summary",
            "Ask for a plain-language interpretation of a finished build.",
            vec![
                required_argument("server", "Jenkins server name"),
                required_argument("job", "Full job path"),
                required_argument("build_number", "Build number"),
                required_argument("result", "Build result, e.g. SUCCESS or FAILURE"),
            ],
        ),
        prompt_definition(
            "build_log_analysis",
            "Ask for error analysis of a console log excerpt.",
            vec![
                required_argument("server", "Jenkins server name"),
                required_argument("job", "Full job path"),
                required_argument("build_number", "Build number"),
                required_argument("log_excerpt", "Console log excerpt to analyze"),
            ],
        ),
    ])
}

/// Resolve a prompt by name.
pub fn get_prompt(engine: &Engine, name: &str, arguments: Option<&Map<String, Value>>) -> Result<GetPromptResult, ErrorData> {
    match name {
        "scenario_selection" => scenario_selection(engine),
        "scenario_guidance" => scenario_guidance(engine, arguments),
        "build_result_summary" => build_result_summary(arguments),
        "build_log_analysis" => build_log_analysis(arguments),
        _ => Err(ErrorData::invalid_params(format!("prompt '{name}' was not found"), None)),
    }
}

fn scenario_selection(engine: &Engine) -> Result<GetPromptResult, ErrorData> {
    let scenarios = engine.list_scenarios();
    let listing = scenarios
        .iter()
        .map(|scenario| format!("- {}. {}: {}", scenario.index, scenario.name, scenario.description))
        .collect::<Vec<String>>()
        .join("\n");

    Ok(GetPromptResult {
        description: Some("Scenario selection".to_string()),
        messages: vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Please select your application scenario:\n{listing}\n\nReply with the scenario name or number and I will provide the corresponding Jenkins configuration and operation guidance."
            ),
        )],
    })
}

fn scenario_guidance(engine: &Engine, arguments: Option<&Map<String, Value>>) -> Result<GetPromptResult, ErrorData> {
    let key = require_string_argument(arguments, "scenario")?;
    let (name, matched) = scenario::resolve(engine.config(), &key)
        .map_err(|error| ErrorData::invalid_params(error.to_string(), None))?;
    let guidance = if matched.prompt_template.is_empty() {
        format!("Use job path '{}' on server '{}'.", matched.job_path, matched.server)
    } else {
        scenario::render_prompt(matched)
    };

    Ok(GetPromptResult {
        description: Some(format!("Guidance for scenario '{name}'")),
        messages: vec![PromptMessage::new_text(PromptMessageRole::User, guidance)],
    })
}

fn build_result_summary(arguments: Option<&Map<String, Value>>) -> Result<GetPromptResult, ErrorData> {
    let server = require_string_argument(arguments, "server")?;
    let job = require_string_argument(arguments, "job")?;
    let build_number = require_string_argument(arguments, "build_number")?;
    let result = require_string_argument(arguments, "result")?;

    Ok(GetPromptResult {
        description: Some("Build result interpretation".to_string()),
        messages: vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Interpret the result of build #{build_number} for job `{job}` on Jenkins server `{server}` in plain language: {result}. If it failed, analyze the likely reasons; if it succeeded, briefly describe the key steps."
            ),
        )],
    })
}

fn build_log_analysis(arguments: Option<&Map<String, Value>>) -> Result<GetPromptResult, ErrorData> {
    let server = require_string_argument(arguments, "server")?;
    let job = require_string_argument(arguments, "job")?;
    let build_number = require_string_argument(arguments, "build_number")?;
    let log_excerpt = require_string_argument(arguments, "log_excerpt")?;

    Ok(GetPromptResult {
        description: Some("Build log analysis".to_string()),
        messages: vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Analyze the following log excerpt from build #{build_number} of job `{job}` on Jenkins server `{server}` and identify any errors or exceptions:\n{log_excerpt}"
            ),
        )],
    })
}

fn prompt_definition(name: &str, description: &str, arguments: Vec<PromptArgument>) -> Prompt {
    Prompt {
        name: name.to_string(),
        title: None,
        description: Some(description.to_string()),
        arguments: if arguments.is_empty() { None } else { Some(arguments) },
        icons: None,
        meta: None,
    }
}

fn required_argument(name: &str, description: &str) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        title: None,
        description: Some(description.to_string()),
        required: Some(true),
    }
}

fn require_string_argument(arguments: Option<&Map<String, Value>>, key: &str) -> Result<String, ErrorData> {
    let value = arguments.and_then(|arguments| arguments.get(key));
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        _ => Err(ErrorData::invalid_params(
            format!("prompt argument '{key}' is required"),
            None,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use jenky_engine::config::{EngineConfig, ServerEntry};
    use jenky_types::Scenario;
    use url::Url;

    fn engine() -> Engine {
        let mut scenarios = IndexMap::new();
        scenarios.insert(
            "Deploy Application".to_string(),
            Scenario {
                description: "deploy the main application".to_string(),
                server: "ci".to_string(),
                job_path: "release/deploy".to_string(),
                prompt_template: "Trigger {job_path} on {server} after approval.".to_string(),
            },
        );
        Engine::new(EngineConfig {
            servers: vec![ServerEntry {
                name: "ci".to_string(),
                uri: Url::parse("https://ci.example.com").expect("url"),
                user: "bot".to_string(),
                token: Some("secret".to_string()),
                token_env: None,
            }],
            scenarios,
        })
    }

    #[test]
    fn list_prompts_exposes_expected_names() {
        let names: Vec<String> = list_prompts().prompts.into_iter().map(|prompt| prompt.name).collect();
        assert!(names.contains(&"scenario_selection".to_string()));
        assert!(names.contains(&"scenario_guidance".to_string()));
        assert!(names.contains(&"build_result_summary".to_string()));
        assert!(names.contains(&"build_log_analysis".to_string()));
    }

    #[test]
    fn scenario_selection_lists_indexed_scenarios() {
        let result = scenario_selection(&engine()).expect("prompt");
        let rendered = format!("{:?}", result.messages);
        assert!(rendered.contains("1. Deploy Application"));
    }

    #[test]
    fn scenario_guidance_renders_the_template() {
        let engine = engine();
        let mut arguments = Map::new();
        arguments.insert("scenario".to_string(), Value::String("1".to_string()));

        let result = scenario_guidance(&engine, Some(&arguments)).expect("prompt");
        let rendered = format!("{:?}", result.messages);
        assert!(rendered.contains("Trigger release/deploy on ci after approval."));
    }

    #[test]
    fn missing_prompt_arguments_are_invalid_params() {
        let error = scenario_guidance(&engine(), None).expect_err("scenario argument is required");
        assert_eq!(error.code, rmcp::model::ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn unknown_prompt_names_are_rejected() {
        let error = get_prompt(&engine(), "nope", None).expect_err("unknown prompt");
        assert!(error.message.contains("nope"));
    }
}
