//! Idempotent pipeline-job provisioning under the managed namespace.
//!
//! Jobs are provisioned under `MCPS/{username}[/{folder}]`, where the
//! username is the local part of the configured identity when it looks like
//! an email address. The folder chain is created component-by-component;
//! "already exists" answers count as success so two concurrent callers on
//! the same path never fail each other. Any folder failure aborts the whole
//! operation before the job step runs.

use jenky_api::JenkinsClient;
use jenky_types::{Error, ProvisionAction, ProvisionOutcome, Result};
use tracing::{debug, info};

/// Root folder that owns every provisioned job.
pub const MANAGED_ROOT: &str = "MCPS";

const FOLDER_MODE: &str = "com.cloudbees.hudson.plugins.folder.Folder";

/// Folder item configuration posted to `createItem`.
const FOLDER_CONFIG_XML: &str = r#"<?xml version='1.1' encoding='UTF-8'?>
<com.cloudbees.hudson.plugins.folder.Folder plugin="cloudbees-folder">
  <actions/>
  <description></description>
  <properties/>
  <folderViews class="com.cloudbees.hudson.plugins.folder.views.DefaultFolderViewHolder">
    <views>
      <hudson.model.AllView>
        <owner class="com.cloudbees.hudson.plugins.folder.Folder" reference="../../../.."/>
        <name>all</name>
        <filterExecutors>false</filterExecutors>
        <filterQueue>false</filterQueue>
        <properties class="hudson.model.View$PropertyList"/>
      </hudson.model.AllView>
    </views>
    <tabBar class="hudson.views.DefaultViewsTabBar"/>
  </folderViews>
  <healthMetrics/>
  <icon class="com.cloudbees.hudson.plugins.folder.icons.StockFolderIcon"/>
</com.cloudbees.hudson.plugins.folder.Folder>"#;

/// Derive the namespace username from a configured identity.
///
/// An email-shaped identity contributes its local part; anything else is
/// used verbatim. Total: there is no error path.
pub fn username_from_identity(identity: &str) -> &str {
    match identity.split_once('@') {
        Some((local, _)) if !local.is_empty() => local,
        _ => identity,
    }
}

/// Create a pipeline job, or update its definition if it already exists.
///
/// The owning folder chain is ensured first; the job step is not attempted
/// when namespace construction fails, so callers never see a half-built
/// namespace reported as success.
pub async fn create_or_update(
    client: &JenkinsClient,
    job_name: &str,
    pipeline_script: &str,
    description: Option<&str>,
    folder_path: Option<&str>,
) -> Result<ProvisionOutcome> {
    if job_name.trim().is_empty() || job_name.contains('/') {
        return Err(Error::config(format!(
            "invalid job name '{job_name}': must be a single non-empty path component"
        )));
    }

    let username = username_from_identity(client.user());
    let mut namespace = format!("{MANAGED_ROOT}/{username}");
    if let Some(folder) = folder_path.map(|folder| folder.trim_matches('/')).filter(|folder| !folder.is_empty()) {
        namespace = format!("{namespace}/{folder}");
    }

    ensure_folder_chain(client, &namespace).await?;

    let full_path = format!("{namespace}/{job_name}");
    let config_xml = pipeline_job_xml(pipeline_script, description.unwrap_or_default());
    let url = format!("{}{}", client.base_url(), jenky_api::job_path(&full_path));

    let action = if item_exists(client, &full_path).await? {
        update_job(client, &full_path, &config_xml).await?;
        ProvisionAction::Updated
    } else {
        match create_job(client, &namespace, job_name, &config_xml).await? {
            CreateOutcome::Created => ProvisionAction::Created,
            // Lost a create race; the job appeared in between, so update it.
            CreateOutcome::AlreadyExists => {
                update_job(client, &full_path, &config_xml).await?;
                ProvisionAction::Updated
            }
        }
    };

    info!(job = %full_path, ?action, "job provisioned");
    Ok(ProvisionOutcome { action, full_path, url })
}

/// Walk the namespace path, creating each missing folder.
async fn ensure_folder_chain(client: &JenkinsClient, namespace: &str) -> Result<()> {
    let mut current = String::new();
    for component in namespace.split('/').filter(|component| !component.is_empty()) {
        current = if current.is_empty() {
            component.to_string()
        } else {
            format!("{current}/{component}")
        };

        if item_exists(client, &current).await? {
            continue;
        }
        create_folder(client, &current, component).await?;
    }
    Ok(())
}

async fn item_exists(client: &JenkinsClient, full_path: &str) -> Result<bool> {
    let path = jenky_api::job_path(full_path);
    let (status, _) = client.get_json(&format!("{path}/api/json?tree=name")).await?;
    Ok(status.is_success())
}

async fn create_folder(client: &JenkinsClient, full_path: &str, name: &str) -> Result<()> {
    let parent_path = full_path
        .rsplit_once('/')
        .map(|(parent, _)| jenky_api::job_path(parent))
        .unwrap_or_default();
    let query = [
        ("name".to_string(), name.to_string()),
        ("mode".to_string(), FOLDER_MODE.to_string()),
    ];

    let response = client
        .post(&format!("{parent_path}/createItem"), &query, Some(FOLDER_CONFIG_XML))
        .await?;
    match response.status.as_u16() {
        400 => {
            // A concurrent caller may have created it first; re-check
            // instead of failing either caller.
            if item_exists(client, full_path).await? {
                debug!(folder = %full_path, "folder already existed");
                Ok(())
            } else {
                Err(Error::remote(
                    client.server_name(),
                    400,
                    format!("failed to create folder '{name}': {}", response.body),
                ))
            }
        }
        _ if response.status.is_success() || response.status.is_redirection() => {
            debug!(folder = %full_path, "folder created");
            Ok(())
        }
        status => Err(Error::remote(
            client.server_name(),
            status,
            format!("failed to create folder '{name}': {}", response.body),
        )),
    }
}

enum CreateOutcome {
    Created,
    AlreadyExists,
}

async fn create_job(client: &JenkinsClient, namespace: &str, job_name: &str, config_xml: &str) -> Result<CreateOutcome> {
    let parent_path = jenky_api::job_path(namespace);
    let query = [("name".to_string(), job_name.to_string())];

    let response = client
        .post(&format!("{parent_path}/createItem"), &query, Some(config_xml))
        .await?;
    match response.status.as_u16() {
        400 => {
            let full_path = format!("{namespace}/{job_name}");
            if item_exists(client, &full_path).await? {
                Ok(CreateOutcome::AlreadyExists)
            } else {
                Err(Error::remote(
                    client.server_name(),
                    400,
                    format!("failed to create job '{job_name}': {}", response.body),
                ))
            }
        }
        _ if response.status.is_success() || response.status.is_redirection() => Ok(CreateOutcome::Created),
        status => Err(Error::remote(
            client.server_name(),
            status,
            format!("failed to create job '{job_name}': {}", response.body),
        )),
    }
}

async fn update_job(client: &JenkinsClient, full_path: &str, config_xml: &str) -> Result<()> {
    let path = format!("{}/config.xml", jenky_api::job_path(full_path));
    let response = client.post(&path, &[], Some(config_xml)).await?;
    match response.status.as_u16() {
        404 => Err(Error::job_not_found(full_path, client.server_name())),
        _ if response.status.is_success() || response.status.is_redirection() => Ok(()),
        status => Err(Error::remote(
            client.server_name(),
            status,
            format!("failed to update job '{full_path}': {}", response.body),
        )),
    }
}

/// Pipeline job configuration with the script executed in the sandbox.
fn pipeline_job_xml(script: &str, description: &str) -> String {
    format!(
        r#"<?xml version='1.1' encoding='UTF-8'?>
<flow-definition plugin="workflow-job">
  <actions/>
  <description>{}</description>
  <keepDependencies>false</keepDependencies>
  <properties/>
  <definition class="org.jenkinsci.plugins.workflow.cps.CpsFlowDefinition" plugin="workflow-cps">
    <script>{}</script>
    <sandbox>true</sandbox>
  </definition>
  <triggers/>
  <disabled>false</disabled>
</flow-definition>"#,
        xml_escape(description),
        xml_escape(script)
    )
}

/// Escape text for embedding in an XML element.
fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
