//! Microsoft To Do commands

use super::Context;
use crate::error::{M365Error, Result};
use crate::graph::GraphClient;
use crate::graph::todo::TodoClient;
use crate::util::validation::{ensure_allowed, ensure_iso_datetime, ensure_one_of};
use clap::Args;
use serde_json::{Map, Value, json};

pub const TASK_STATUSES: [&str; 5] = [
    "notStarted",
    "inProgress",
    "completed",
    "waitingOnOthers",
    "deferred",
];
pub const TASK_IMPORTANCE: [&str; 3] = ["low", "normal", "high"];
pub const BODY_CONTENT_TYPES: [&str; 2] = ["text", "html"];

#[derive(Args, Debug, Default)]
pub struct TaskSetArgs {
    /// ID of the task
    #[arg(short, long)]
    pub id: String,

    /// ID of the task list
    #[arg(long)]
    pub list_id: Option<String>,

    /// Display name of the task list
    #[arg(long)]
    pub list_name: Option<String>,

    /// New title
    #[arg(short, long)]
    pub title: Option<String>,

    /// notStarted, inProgress, completed, waitingOnOthers or deferred
    #[arg(short, long)]
    pub status: Option<String>,

    /// low, normal or high
    #[arg(long)]
    pub importance: Option<String>,

    /// Body of the task
    #[arg(long)]
    pub body_content: Option<String>,

    /// text or html (default text)
    #[arg(long)]
    pub body_content_type: Option<String>,

    /// Due date and time (ISO 8601)
    #[arg(long)]
    pub due_date_time: Option<String>,
}

impl TaskSetArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_one_of(&[
            ("list-id", self.list_id.is_some()),
            ("list-name", self.list_name.is_some()),
        ])?;
        if let Some(status) = &self.status {
            ensure_allowed(status, &TASK_STATUSES)?;
        }
        if let Some(importance) = &self.importance {
            ensure_allowed(importance, &TASK_IMPORTANCE)?;
        }
        if let Some(content_type) = &self.body_content_type {
            ensure_allowed(content_type, &BODY_CONTENT_TYPES)?;
        }
        if let Some(due) = &self.due_date_time {
            ensure_iso_datetime(due, "due-date-time")?;
        }
        Ok(())
    }

    /// Properties to patch, only the options given
    pub fn patch_body(&self) -> Result<Value> {
        let mut body = Map::new();

        if let Some(title) = &self.title {
            body.insert("title".into(), json!(title));
        }
        if let Some(status) = &self.status {
            body.insert("status".into(), json!(ensure_allowed(status, &TASK_STATUSES)?));
        }
        if let Some(importance) = &self.importance {
            body.insert(
                "importance".into(),
                json!(ensure_allowed(importance, &TASK_IMPORTANCE)?),
            );
        }
        if let Some(content) = &self.body_content {
            let content_type = match &self.body_content_type {
                Some(t) => ensure_allowed(t, &BODY_CONTENT_TYPES)?,
                None => "text",
            };
            body.insert(
                "body".into(),
                json!({ "content": content, "contentType": content_type }),
            );
        }
        if let Some(due) = &self.due_date_time {
            body.insert(
                "dueDateTime".into(),
                json!({ "dateTime": due, "timeZone": "Etc/GMT" }),
            );
        }

        Ok(Value::Object(body))
    }
}

pub async fn task_set(args: TaskSetArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let client = ctx.graph()?;
    let task = set_task(&args, &client).await?;
    ctx.print(&task, &["id", "title", "status", "importance"])
}

pub async fn set_task(args: &TaskSetArgs, client: &GraphClient) -> Result<Value> {
    let todo = TodoClient::new(client);
    let list_id = match (&args.list_id, &args.list_name) {
        (Some(id), _) => id.clone(),
        (None, Some(name)) => todo.list_id_by_name(name).await?,
        (None, None) => {
            return Err(M365Error::Validation(
                "Specify one of the following options: list-id, list-name.".into(),
            ));
        }
    };
    todo.update_task(&list_id, &args.id, &args.patch_body()?).await
}
