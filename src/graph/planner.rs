//! Microsoft Planner: plans, buckets and tasks

use super::GraphClient;
use super::lookup::single_match;
use crate::error::{M365Error, Result};
use crate::util::url::encode_component;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct Plan {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct TaskDetails {
    #[serde(rename = "@odata.etag")]
    etag: String,
}

/// Planner operations on top of the Graph client
pub struct PlannerClient<'a> {
    client: &'a GraphClient,
}

impl<'a> PlannerClient<'a> {
    pub fn new(client: &'a GraphClient) -> Self {
        Self { client }
    }

    /// Resolve a plan of a group from its title
    pub async fn plan_id_by_title(&self, group_id: &str, title: &str) -> Result<String> {
        info!("Retrieving plan id for '{}'", title);
        let plans: Vec<Plan> = self
            .client
            .get_all_pages(&format!("groups/{}/planner/plans", encode_component(group_id)))
            .await?;

        let plan = single_match(
            plans.into_iter().filter(|p| p.title == title).collect(),
            || "The specified plan does not exist".to_string(),
            |found| {
                format!(
                    "Multiple plans with title '{}' found: {}",
                    title,
                    found.iter().map(|p| p.id.as_str()).collect::<Vec<_>>().join(", ")
                )
            },
        )?;
        Ok(plan.id)
    }

    /// Resolve a bucket of a plan from its name
    pub async fn bucket_id_by_name(&self, plan_id: &str, name: &str) -> Result<String> {
        info!("Retrieving bucket id for '{}'", name);
        let buckets: Vec<Bucket> = self
            .client
            .get_all_pages(&format!("planner/plans/{}/buckets", encode_component(plan_id)))
            .await?;

        let bucket = single_match(
            buckets.into_iter().filter(|b| b.name == name).collect(),
            || "The specified bucket does not exist".to_string(),
            |found| {
                format!(
                    "Multiple buckets with name '{}' found: {}",
                    name,
                    found.iter().map(|b| b.id.as_str()).collect::<Vec<_>>().join(", ")
                )
            },
        )?;
        Ok(bucket.id)
    }

    pub async fn create_task(&self, body: &Value) -> Result<Value> {
        self.client.post("planner/tasks", body).await
    }

    /// Update a task's details (description, preview type) and return them.
    ///
    /// Details can only be patched with their current etag, so they are read
    /// first with full OData metadata.
    pub async fn update_task_details(
        &self,
        task_id: &str,
        description: Option<&str>,
        preview_type: Option<&str>,
    ) -> Result<Value> {
        let endpoint = format!("planner/tasks/{}/details", encode_component(task_id));

        let details: TaskDetails = self
            .client
            .get_with_headers(&endpoint, &[("accept", "application/json")])
            .await
            .map_err(|e| {
                debug!("Reading task details failed: {}", e);
                M365Error::NotFound("Error fetching task details".into())
            })?;

        let mut body = serde_json::Map::new();
        if let Some(description) = description {
            body.insert("description".into(), json!(description));
        }
        if let Some(preview_type) = preview_type {
            body.insert("previewType".into(), json!(preview_type));
        }

        self.client
            .patch_with_headers(
                &endpoint,
                &Value::Object(body),
                &[
                    ("If-Match", details.etag.as_str()),
                    ("Prefer", "return=representation"),
                ],
            )
            .await
    }
}

/// Merge the detail properties Graph returns into the task for output
pub fn merge_task_details(mut task: Value, details: &Value) -> Value {
    if let (Some(task_obj), Some(details_obj)) = (task.as_object_mut(), details.as_object()) {
        for key in ["description", "references", "checklist", "previewType"] {
            if let Some(v) = details_obj.get(key) {
                task_obj.insert(key.to_string(), v.clone());
            }
        }
    }
    task
}
