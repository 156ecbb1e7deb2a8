//! Microsoft To Do lists and tasks of the signed-in user

use super::GraphClient;
use super::lookup::single_match;
use crate::error::Result;
use crate::util::url::odata_filter_value;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

#[derive(Debug, Deserialize)]
struct TodoList {
    id: String,
}

pub struct TodoClient<'a> {
    client: &'a GraphClient,
}

impl<'a> TodoClient<'a> {
    pub fn new(client: &'a GraphClient) -> Self {
        Self { client }
    }

    pub async fn list_id_by_name(&self, name: &str) -> Result<String> {
        info!("Retrieving task list id for '{}'", name);
        let lists: Vec<TodoList> = self
            .client
            .get_all_pages(&format!(
                "me/todo/lists?$filter=displayName eq '{}'",
                odata_filter_value(name)
            ))
            .await?;

        let list = single_match(
            lists,
            || "The specified task list does not exist".to_string(),
            |found| {
                format!(
                    "Multiple task lists with name '{}' found: {}",
                    name,
                    found.iter().map(|l| l.id.as_str()).collect::<Vec<_>>().join(", ")
                )
            },
        )?;
        Ok(list.id)
    }

    pub async fn update_task(&self, list_id: &str, task_id: &str, body: &Value) -> Result<Value> {
        self.client
            .patch(
                &format!("me/todo/lists/{}/tasks/{}", list_id, task_id),
                body,
            )
            .await
    }
}
