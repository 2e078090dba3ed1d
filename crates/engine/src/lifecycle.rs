//! Build lifecycle operations: trigger, status, stop, console log.
//!
//! A build moves `QUEUED -> BUILDING -> {SUCCESS, FAILURE, ABORTED,
//! UNSTABLE}`; terminal states are absorbing. Nothing here polls: trigger
//! returns as soon as the server accepts the request, and status/queue reads
//! are single snapshots. Polling cadence is a caller concern.

use jenky_api::JenkinsClient;
use jenky_types::{
    BuildInfo, BuildResult, Error, ParameterMap, QueueSnapshot, QueueStatus, Result, StopOutcome, StopStatus,
    TriggerOutcome, TriggerStatus,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::params;

const BUILD_TREE: &str = "number,building,result,url,timestamp,duration";

/// Trigger a build, validating supplied parameters first.
///
/// For a parameterized job the supplied values are validated against the
/// declared contract; when validation fails the trigger is refused without
/// any remote call. For a non-parameterized job any supplied values
/// are ignored with a warning; excess input is tolerated, missing required
/// input is not.
pub async fn trigger_build(
    client: &JenkinsClient,
    job_full_name: &str,
    supplied: Option<ParameterMap>,
) -> Result<TriggerOutcome> {
    let definitions = params::get_parameters(client, job_full_name).await?;
    let path = jenky_api::job_path(job_full_name);

    let response = if definitions.is_empty() {
        if supplied.as_ref().is_some_and(|map| !map.is_empty()) {
            warn!(job = %job_full_name, "job takes no parameters; ignoring supplied values");
        }
        client.post(&format!("{path}/build"), &[], None).await?
    } else {
        let supplied = supplied.unwrap_or_default();
        let report = params::validate(&definitions, &supplied);
        if !report.ok {
            return Err(Error::Validation(report));
        }
        let query: Vec<(String, String)> = supplied
            .iter()
            .map(|(name, value)| (name.clone(), value.as_form_value()))
            .collect();
        client.post(&format!("{path}/buildWithParameters"), &query, None).await?
    };

    match response.status.as_u16() {
        404 => return Err(Error::job_not_found(job_full_name, client.server_name())),
        403 => return Err(Error::permission("trigger build", job_full_name.to_string())),
        status if !response.status.is_success() && !response.status.is_redirection() => {
            return Err(Error::remote(client.server_name(), status, response.body));
        }
        _ => {}
    }

    let queue_url = response.location.clone();
    let queue_id = queue_url.as_deref().and_then(parse_queue_id);
    info!(job = %job_full_name, ?queue_id, "build trigger accepted");

    // One immediate snapshot resolves fast-starting builds; the trigger is
    // already accepted, so a failed snapshot must not fail the call.
    if let Some(queue_id) = queue_id {
        match get_queue_item(client, queue_id).await {
            Ok(snapshot) if snapshot.build_number.is_some() => {
                return Ok(TriggerOutcome {
                    status: TriggerStatus::BuildStarted,
                    build_number: snapshot.build_number,
                    build_url: snapshot.build_url,
                    queue_id: Some(queue_id),
                    queue_url,
                    message: None,
                });
            }
            Ok(_) => {}
            Err(error) => debug!(job = %job_full_name, %error, "queue snapshot after trigger failed"),
        }
    }

    Ok(TriggerOutcome {
        status: TriggerStatus::Queued,
        build_number: None,
        build_url: None,
        queue_id,
        queue_url,
        message: Some("build is queued; poll get_queue_item or get_build_status for progress".to_string()),
    })
}

/// Read one snapshot of a queue item.
///
/// Queue entries expire a few minutes after their build starts, so an
/// absent item is a normal answer, not an error.
pub async fn get_queue_item(client: &JenkinsClient, queue_id: u64) -> Result<QueueSnapshot> {
    let (status, value) = client.get_json(&format!("/queue/item/{queue_id}/api/json")).await?;
    if status.as_u16() == 404 {
        return Ok(QueueSnapshot {
            queue_id,
            blocked: false,
            buildable: false,
            stuck: false,
            why: Some("item not found; queue entries expire shortly after the build starts".to_string()),
            build_number: None,
            build_url: None,
            status: QueueStatus::NotFound,
        });
    }

    let executable = value.get("executable");
    let build_number = executable
        .and_then(|executable| executable.get("number"))
        .and_then(Value::as_u64)
        .map(|number| number as u32);

    Ok(QueueSnapshot {
        queue_id,
        blocked: value.get("blocked").and_then(Value::as_bool).unwrap_or(false),
        buildable: value.get("buildable").and_then(Value::as_bool).unwrap_or(false),
        stuck: value.get("stuck").and_then(Value::as_bool).unwrap_or(false),
        why: value.get("why").and_then(Value::as_str).map(str::to_string),
        build_url: executable
            .and_then(|executable| executable.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string),
        status: if build_number.is_some() {
            QueueStatus::BuildStarted
        } else {
            QueueStatus::Queued
        },
        build_number,
    })
}

/// Read one snapshot of a build's state.
pub async fn get_build_status(client: &JenkinsClient, job_full_name: &str, build_number: u32) -> Result<BuildInfo> {
    let path = jenky_api::job_path(job_full_name);
    let (status, value) = client
        .get_json(&format!("{path}/{build_number}/api/json?tree={BUILD_TREE}"))
        .await?;
    if status.as_u16() == 404 {
        return Err(Error::build_not_found(build_number, job_full_name, client.server_name()));
    }

    Ok(BuildInfo {
        number: value
            .get("number")
            .and_then(Value::as_u64)
            .map(|number| number as u32)
            .unwrap_or(build_number),
        building: value.get("building").and_then(Value::as_bool).unwrap_or(false),
        result: value
            .get("result")
            .and_then(Value::as_str)
            .and_then(BuildResult::from_wire),
        duration_ms: value.get("duration").and_then(Value::as_u64).unwrap_or(0),
        timestamp_ms: value.get("timestamp").and_then(Value::as_u64).unwrap_or(0),
        url: value.get("url").and_then(Value::as_str).unwrap_or_default().to_string(),
    })
}

/// Request that a build be stopped.
///
/// Stopping is idempotent: a build that is already terminal (or gone)
/// reports a successful no-op instead of an error. A 403 from the stop
/// request is re-checked once against the build state (the build may have
/// finished in between) and only then surfaced as a permission error.
pub async fn stop_build(client: &JenkinsClient, job_full_name: &str, build_number: u32) -> Result<StopOutcome> {
    match get_build_status(client, job_full_name, build_number).await {
        Ok(info) if !info.building => {
            debug!(job = %job_full_name, build_number, "build already terminal; stop is a no-op");
            return Ok(StopOutcome {
                status: StopStatus::AlreadyTerminated,
                url: None,
            });
        }
        Ok(_) => {}
        Err(Error::BuildNotFound { .. }) => {
            return Ok(StopOutcome {
                status: StopStatus::NotFound,
                url: None,
            });
        }
        Err(error) => return Err(error),
    }

    let stop_path = format!("{}/{build_number}/stop", jenky_api::job_path(job_full_name));
    let response = client.post(&stop_path, &[], None).await?;
    match response.status.as_u16() {
        404 => Ok(StopOutcome {
            status: StopStatus::NotFound,
            url: None,
        }),
        403 => {
            let terminated = matches!(
                get_build_status(client, job_full_name, build_number).await,
                Ok(info) if !info.building
            );
            if terminated {
                Ok(StopOutcome {
                    status: StopStatus::AlreadyTerminated,
                    url: None,
                })
            } else {
                Err(Error::permission("stop build", format!("{job_full_name}#{build_number}")))
            }
        }
        _ if response.status.is_success() || response.status.is_redirection() => {
            info!(job = %job_full_name, build_number, "stop requested");
            Ok(StopOutcome {
                status: StopStatus::StopRequested,
                url: Some(format!("{}{stop_path}", client.base_url())),
            })
        }
        status => Err(Error::remote(client.server_name(), status, response.body)),
    }
}

/// Fetch the full console text of a build as of the call; no streaming.
pub async fn get_build_log(client: &JenkinsClient, job_full_name: &str, build_number: u32) -> Result<String> {
    let path = format!("{}/{build_number}/consoleText", jenky_api::job_path(job_full_name));
    let response = client.get(&path).await?;
    let status = response.status();
    match status.as_u16() {
        404 => Err(Error::build_not_found(build_number, job_full_name, client.server_name())),
        401 => Err(Error::auth(client.server_name(), "credentials rejected")),
        403 => Err(Error::permission(
            "read build log",
            format!("{job_full_name}#{build_number}"),
        )),
        _ if status.is_success() => response
            .text()
            .await
            .map_err(|error| Error::remote(client.server_name(), status.as_u16(), format!("failed to read body: {error}"))),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(Error::remote(client.server_name(), status.as_u16(), body))
        }
    }
}

/// Extract the queue item id from a trigger `Location` header.
fn parse_queue_id(location: &str) -> Option<u64> {
    let rest = location.split("/queue/item/").nth(1)?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_id_is_parsed_from_location_header() {
        assert_eq!(parse_queue_id("http://ci/queue/item/123/"), Some(123));
        assert_eq!(parse_queue_id("https://ci/jenkins/queue/item/4/"), Some(4));
        assert_eq!(parse_queue_id("http://ci/queue/item/"), None);
        assert_eq!(parse_queue_id("http://ci/job/x/"), None);
    }
}
