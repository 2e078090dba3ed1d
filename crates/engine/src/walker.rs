//! Recursive job discovery.
//!
//! One breadth-limited `tree=` listing fetches several folder levels per
//! request; folders that are still unexpanded at the horizon are re-queried
//! folder-by-folder. Recursion is bounded by an explicit depth counter and a
//! full-path dedup set, so a server that reports a folder as its own
//! descendant produces a partial result instead of a loop.

use std::collections::HashSet;

use jenky_api::JenkinsClient;
use jenky_types::{Error, JobDescriptor, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// Folder levels fetched per listing request.
const LISTING_LEVELS: usize = 4;
/// Hard cap on folder nesting; deeper folders are dropped with a warning.
const MAX_DEPTH: usize = 10;

/// Fields requested for every node in a listing.
const NODE_FIELDS: &str = "_class,name,fullName,url,description,buildable,color,\
lastBuild[number,url],property[parameterDefinitions[name]]";

/// `jobs[...]` expression nesting [`NODE_FIELDS`] `LISTING_LEVELS` deep.
fn listing_tree_query() -> String {
    let mut expr = NODE_FIELDS.to_string();
    for _ in 1..LISTING_LEVELS {
        expr = format!("{NODE_FIELDS},jobs[{expr}]");
    }
    format!("jobs[{expr}]")
}

/// Tree expression for querying a single node together with its subtree.
fn node_tree_query() -> String {
    format!("{NODE_FIELDS},{}", listing_tree_query())
}

/// Working state of one traversal.
#[derive(Default)]
struct Traversal {
    jobs: Vec<JobDescriptor>,
    /// Folders reported past the listing horizon, with their depth.
    unexplored: Vec<(String, usize)>,
    seen: HashSet<String>,
}

/// Enumerate every job on the server.
pub async fn list_jobs(client: &JenkinsClient) -> Result<Vec<JobDescriptor>> {
    let (_, value) = client
        .get_json(&format!("/api/json?tree={}", listing_tree_query()))
        .await?;

    let mut traversal = Traversal::default();
    flatten(children_of(&value), "", 0, &mut traversal);
    expand_pending(client, &mut traversal).await?;

    debug!(server = %client.server_name(), count = traversal.jobs.len(), "jobs enumerated");
    Ok(traversal.jobs)
}

/// Enumerate jobs and apply the keyword policy.
pub async fn search(client: &JenkinsClient, keyword: Option<&str>) -> Result<Vec<JobDescriptor>> {
    let jobs = list_jobs(client).await?;
    Ok(filter_jobs(jobs, keyword))
}

/// Enumerate the jobs below `prefix` (or the single job named by it).
pub async fn collect_under(client: &JenkinsClient, prefix: &str) -> Result<Vec<JobDescriptor>> {
    let prefix = prefix.trim_matches('/');
    let path = jenky_api::job_path(prefix);
    let (status, value) = client
        .get_json(&format!("{path}/api/json?tree={}", node_tree_query()))
        .await?;
    if status.as_u16() == 404 {
        return Err(Error::job_not_found(prefix, client.server_name()));
    }

    if value.get("jobs").is_none_or(|jobs| !jobs.is_array()) {
        // The prefix names a job, not a folder.
        return Ok(vec![descriptor_from_node(&value, prefix.to_string())]);
    }

    let mut traversal = Traversal::default();
    flatten(children_of(&value), prefix, 1, &mut traversal);
    expand_pending(client, &mut traversal).await?;
    Ok(traversal.jobs)
}

/// Re-query folders the horizon-limited listing could not expand.
async fn expand_pending(client: &JenkinsClient, traversal: &mut Traversal) -> Result<()> {
    let query = listing_tree_query();
    while let Some((folder, depth)) = traversal.unexplored.pop() {
        if depth >= MAX_DEPTH {
            warn!(%folder, cap = MAX_DEPTH, "folder depth cap reached; returning partial results");
            continue;
        }
        let path = jenky_api::job_path(&folder);
        let (status, value) = client.get_json(&format!("{path}/api/json?tree={query}")).await?;
        if status.as_u16() == 404 {
            // The folder disappeared between listing and expansion.
            warn!(%folder, "folder vanished during traversal");
            continue;
        }
        flatten(children_of(&value), &folder, depth, traversal);
    }
    Ok(())
}

fn children_of(value: &Value) -> &[Value] {
    value
        .get("jobs")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Apply the keyword filtering policy.
///
/// No keyword returns everything. A keyword that exactly equals a job's
/// full path short-circuits to that single job; otherwise matching is a
/// case-insensitive substring test against the short name and the full path.
/// Folders are never part of the input; only leaf jobs reach this point.
pub fn filter_jobs(jobs: Vec<JobDescriptor>, keyword: Option<&str>) -> Vec<JobDescriptor> {
    let Some(keyword) = keyword.map(str::trim).filter(|keyword| !keyword.is_empty()) else {
        return jobs;
    };

    if let Some(exact) = jobs.iter().find(|job| job.full_path == keyword) {
        return vec![exact.clone()];
    }

    let needle = keyword.to_lowercase();
    jobs.into_iter()
        .filter(|job| job.name.to_lowercase().contains(&needle) || job.full_path.to_lowercase().contains(&needle))
        .collect()
}

/// Walk one level of listing nodes, collecting jobs and unexpanded folders.
///
/// `depth` is the folder depth of the nodes being visited; it is threaded
/// explicitly rather than trusting the server-reported structure.
fn flatten(nodes: &[Value], parent: &str, depth: usize, traversal: &mut Traversal) {
    for node in nodes {
        let Some(full_path) = full_path_of(node, parent) else {
            continue;
        };
        if !traversal.seen.insert(full_path.clone()) {
            continue;
        }

        if is_folder(node) {
            if depth + 1 >= MAX_DEPTH {
                warn!(folder = %full_path, cap = MAX_DEPTH, "folder depth cap reached; returning partial results");
                continue;
            }
            match node.get("jobs").and_then(Value::as_array) {
                Some(children) => flatten(children, &full_path, depth + 1, traversal),
                None => traversal.unexplored.push((full_path, depth + 1)),
            }
        } else {
            traversal.jobs.push(descriptor_from_node(node, full_path));
        }
    }
}

/// A node is a folder when it carries a nested `jobs` array, or when its
/// `_class` says so (the horizon of a tree query omits the `jobs` key).
fn is_folder(node: &Value) -> bool {
    node.get("jobs").is_some_and(Value::is_array)
        || node
            .get("_class")
            .and_then(Value::as_str)
            .is_some_and(|class| class.to_ascii_lowercase().contains("folder"))
}

fn full_path_of(node: &Value, parent: &str) -> Option<String> {
    if let Some(full_name) = node.get("fullName").and_then(Value::as_str) {
        let trimmed = full_name.trim_matches('/');
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    let name = node.get("name").and_then(Value::as_str)?;
    Some(if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    })
}

fn descriptor_from_node(node: &Value, full_path: String) -> JobDescriptor {
    let name = node
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| full_path.rsplit('/').next().unwrap_or_default().to_string());

    JobDescriptor {
        name,
        url: node.get("url").and_then(Value::as_str).unwrap_or_default().to_string(),
        description: node
            .get("description")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
        buildable: node.get("buildable").and_then(Value::as_bool).unwrap_or(false),
        status_color: node
            .get("color")
            .and_then(Value::as_str)
            .unwrap_or("grey")
            .to_string(),
        is_parameterized: has_parameter_definitions(node),
        last_build_number: node
            .get("lastBuild")
            .and_then(|build| build.get("number"))
            .and_then(Value::as_u64)
            .map(|number| number as u32),
        last_build_url: node
            .get("lastBuild")
            .and_then(|build| build.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string),
        full_path,
    }
}

fn has_parameter_definitions(node: &Value) -> bool {
    node.get("property")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .any(|property| {
            property
                .get("parameterDefinitions")
                .and_then(Value::as_array)
                .is_some_and(|definitions| !definitions.is_empty())
        })
}
