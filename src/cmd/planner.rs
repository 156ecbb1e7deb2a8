//! Microsoft Planner commands

use super::Context;
use crate::error::{M365Error, Result};
use crate::graph::GraphClient;
use crate::graph::lookup::{group_id_by_name, user_ids_by_upn};
use crate::graph::planner::{PlannerClient, merge_task_details};
use crate::util::access_token::AccessToken;
use crate::util::validation::{
    ensure_allowed, ensure_at_most_one_of, ensure_guid, ensure_iso_datetime, ensure_one_of,
    is_valid_user_principal_name, split_list,
};
use clap::Args;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

pub const PREVIEW_TYPES: [&str; 5] = ["automatic", "noPreview", "checklist", "description", "reference"];

const CATEGORIES: [&str; 6] = [
    "category1",
    "category2",
    "category3",
    "category4",
    "category5",
    "category6",
];

/// Priority labels and the values Planner stores for them
const PRIORITY_LABELS: [(&str, u32); 4] = [("Urgent", 1), ("Important", 3), ("Medium", 5), ("Low", 9)];

#[derive(Args, Debug, Default)]
pub struct TaskAddArgs {
    /// Title of the task
    #[arg(short, long)]
    pub title: String,

    /// ID of the plan
    #[arg(long)]
    pub plan_id: Option<String>,

    /// Title of the plan
    #[arg(long)]
    pub plan_title: Option<String>,

    /// Deprecated, use --plan-title
    #[arg(long, hide = true)]
    pub plan_name: Option<String>,

    /// ID of the group owning the plan (with --plan-title)
    #[arg(long)]
    pub owner_group_id: Option<String>,

    /// Display name of the group owning the plan (with --plan-title)
    #[arg(long)]
    pub owner_group_name: Option<String>,

    /// ID of the bucket
    #[arg(long)]
    pub bucket_id: Option<String>,

    /// Name of the bucket
    #[arg(long)]
    pub bucket_name: Option<String>,

    /// Start date and time (ISO 8601)
    #[arg(long)]
    pub start_date_time: Option<String>,

    /// Due date and time (ISO 8601)
    #[arg(long)]
    pub due_date_time: Option<String>,

    /// Completion percentage, 0 to 100
    #[arg(long)]
    pub percent_complete: Option<u32>,

    /// Comma separated IDs of the users to assign
    #[arg(long)]
    pub assigned_to_user_ids: Option<String>,

    /// Comma separated UPNs of the users to assign
    #[arg(long)]
    pub assigned_to_user_names: Option<String>,

    /// Task description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Categories to apply, category1 to category6, comma or space separated
    #[arg(long)]
    pub applied_categories: Option<String>,

    /// Order hint of the task in the list view
    #[arg(long)]
    pub order_hint: Option<String>,

    /// Order hint of the task in the assignee's view
    #[arg(long)]
    pub assignee_priority: Option<String>,

    /// Priority 0 to 10, or Urgent, Important, Medium, Low
    #[arg(long)]
    pub priority: Option<String>,

    /// What the task card shows: automatic, noPreview, checklist,
    /// description or reference
    #[arg(long)]
    pub preview_type: Option<String>,
}

impl TaskAddArgs {
    /// Plan title, falling back to the deprecated plan name
    fn effective_plan_title(&self) -> Option<&str> {
        self.plan_title.as_deref().or(self.plan_name.as_deref())
    }

    pub fn validate(&self) -> Result<()> {
        ensure_one_of(&[
            ("plan-id", self.plan_id.is_some()),
            ("plan-title", self.plan_title.is_some()),
            ("plan-name", self.plan_name.is_some()),
        ])?;

        if self.effective_plan_title().is_some() {
            ensure_one_of(&[
                ("owner-group-id", self.owner_group_id.is_some()),
                ("owner-group-name", self.owner_group_name.is_some()),
            ])?;
        }
        if let Some(id) = &self.owner_group_id {
            ensure_guid(id, "owner-group-id")?;
        }

        ensure_one_of(&[
            ("bucket-id", self.bucket_id.is_some()),
            ("bucket-name", self.bucket_name.is_some()),
        ])?;

        if let Some(value) = &self.start_date_time {
            ensure_iso_datetime(value, "start-date-time")?;
        }
        if let Some(value) = &self.due_date_time {
            ensure_iso_datetime(value, "due-date-time")?;
        }

        if let Some(percent) = self.percent_complete {
            if percent > 100 {
                return Err(M365Error::Validation(
                    "percent-complete should be between 0 and 100".into(),
                ));
            }
        }

        ensure_at_most_one_of(&[
            ("assigned-to-user-ids", self.assigned_to_user_ids.is_some()),
            ("assigned-to-user-names", self.assigned_to_user_names.is_some()),
        ])?;
        if let Some(ids) = &self.assigned_to_user_ids {
            for id in split_list(ids) {
                ensure_guid(&id, "assigned-to-user-ids")?;
            }
        }
        if let Some(names) = &self.assigned_to_user_names {
            if let Some(invalid) = split_list(names)
                .into_iter()
                .find(|n| !is_valid_user_principal_name(n))
            {
                return Err(M365Error::Validation(format!(
                    "{} is not a valid user principal name for option assigned-to-user-names",
                    invalid
                )));
            }
        }

        if let Some(categories) = &self.applied_categories {
            parse_categories(categories)?;
        }
        if let Some(priority) = &self.priority {
            parse_priority(priority)?;
        }
        if let Some(preview_type) = &self.preview_type {
            ensure_allowed(preview_type, &PREVIEW_TYPES)?;
        }

        Ok(())
    }
}

/// Categories from a comma or space separated list
pub fn parse_categories(value: &str) -> Result<Vec<&'static str>> {
    value
        .split([',', ' '])
        .filter(|c| !c.is_empty())
        .map(|c| {
            CATEGORIES
                .iter()
                .find(|known| known.eq_ignore_ascii_case(c))
                .copied()
                .ok_or_else(|| {
                    M365Error::Validation(format!(
                        "The applied-categories option contains invalid value {}. Allowed values are {}",
                        c,
                        CATEGORIES.join(", ")
                    ))
                })
        })
        .collect()
}

/// Numeric priority (0 to 10) or one of the priority labels
pub fn parse_priority(value: &str) -> Result<u32> {
    if let Some((_, priority)) = PRIORITY_LABELS
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(value))
    {
        return Ok(*priority);
    }

    match value.parse::<u32>() {
        Ok(priority) if priority <= 10 => Ok(priority),
        _ => Err(M365Error::Validation(format!(
            "{} is not a valid priority. Specify an integer between 0 and 10 or one of {}",
            value,
            PRIORITY_LABELS
                .iter()
                .map(|(label, _)| *label)
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

pub async fn task_add(args: TaskAddArgs, ctx: &Context) -> Result<()> {
    args.validate()?;
    let client = ctx.graph()?;
    let task = add_task(&args, &client).await?;
    ctx.print(&task, &["id", "title", "planId", "bucketId"])
}

/// Create the task (and its details) after resolving every name
pub async fn add_task(args: &TaskAddArgs, client: &GraphClient) -> Result<Value> {
    if AccessToken::parse(client.access_token())?.is_app_only() {
        return Err(M365Error::AuthError(
            "This command does not support application permissions.".into(),
        ));
    }

    if args.plan_name.is_some() {
        warn!("Option 'plan-name' is deprecated. Please use 'plan-title' instead");
    }

    let planner = PlannerClient::new(client);

    let plan_id = match (&args.plan_id, args.effective_plan_title()) {
        (Some(id), _) => id.clone(),
        (None, Some(title)) => {
            let group_id = match (&args.owner_group_id, &args.owner_group_name) {
                (Some(id), _) => id.clone(),
                (None, Some(name)) => group_id_by_name(client, name).await?,
                (None, None) => {
                    return Err(M365Error::Validation(
                        "Specify one of the following options: owner-group-id, owner-group-name."
                            .into(),
                    ));
                }
            };
            planner.plan_id_by_title(&group_id, title).await?
        }
        (None, None) => {
            return Err(M365Error::Validation(
                "Specify one of the following options: plan-id, plan-title.".into(),
            ));
        }
    };

    let bucket_id = match (&args.bucket_id, &args.bucket_name) {
        (Some(id), _) => id.clone(),
        (None, Some(name)) => planner.bucket_id_by_name(&plan_id, name).await?,
        (None, None) => {
            return Err(M365Error::Validation(
                "Specify one of the following options: bucket-id, bucket-name.".into(),
            ));
        }
    };

    let user_ids = assigned_user_ids(args, client).await?;
    let body = task_body(args, &plan_id, &bucket_id, &user_ids)?;

    info!("Creating task '{}'", args.title);
    let task = planner.create_task(&body).await?;

    if args.description.is_none() && args.preview_type.is_none() {
        return Ok(task);
    }

    let task_id = task
        .get("id")
        .and_then(|id| id.as_str())
        .ok_or_else(|| M365Error::NotFound("Created task has no id".into()))?
        .to_string();
    let preview_type = args
        .preview_type
        .as_deref()
        .map(|p| ensure_allowed(p, &PREVIEW_TYPES))
        .transpose()?;
    let details = planner
        .update_task_details(&task_id, args.description.as_deref(), preview_type)
        .await?;

    Ok(merge_task_details(task, &details))
}

async fn assigned_user_ids(args: &TaskAddArgs, client: &GraphClient) -> Result<Vec<String>> {
    if let Some(ids) = &args.assigned_to_user_ids {
        return Ok(split_list(ids));
    }
    let Some(names) = &args.assigned_to_user_names else {
        return Ok(Vec::new());
    };

    let lookup = user_ids_by_upn(client, &split_list(names)).await?;
    if !lookup.invalid.is_empty() {
        return Err(M365Error::NotFound(format!(
            "Cannot proceed with planner task creation. The following users provided are invalid : {}",
            lookup.invalid.join(",")
        )));
    }
    Ok(lookup.ids)
}

/// Request body for `POST planner/tasks`
pub fn task_body(
    args: &TaskAddArgs,
    plan_id: &str,
    bucket_id: &str,
    user_ids: &[String],
) -> Result<Value> {
    let assignments: Map<String, Value> = user_ids
        .iter()
        .map(|id| {
            (
                id.clone(),
                json!({
                    "@odata.type": "#microsoft.graph.plannerAssignment",
                    "orderHint": " !"
                }),
            )
        })
        .collect();

    let applied_categories: Map<String, Value> = match &args.applied_categories {
        Some(categories) => parse_categories(categories)?
            .into_iter()
            .map(|c| (c.to_string(), Value::Bool(true)))
            .collect(),
        None => Map::new(),
    };

    let mut body = json!({
        "planId": plan_id,
        "bucketId": bucket_id,
        "title": args.title,
        "assignments": assignments,
        "appliedCategories": applied_categories,
    });

    if let Some(obj) = body.as_object_mut() {
        let optional = [
            ("startDateTime", args.start_date_time.as_ref().map(|v| json!(v))),
            ("dueDateTime", args.due_date_time.as_ref().map(|v| json!(v))),
            ("percentComplete", args.percent_complete.map(|v| json!(v))),
            ("orderHint", args.order_hint.as_ref().map(|v| json!(v))),
            ("assigneePriority", args.assignee_priority.as_ref().map(|v| json!(v))),
            (
                "priority",
                args.priority.as_deref().map(parse_priority).transpose()?.map(|v| json!(v)),
            ),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                obj.insert(key.to_string(), value);
            }
        }
    }

    Ok(body)
}
